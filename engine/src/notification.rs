use stageplan_shared::{EntityId, PlayerId, Position, StageIndex, StageMoveError};

use crate::error::{RotationError, UpgradeError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NotificationKind {
    /// An object was removed above the entity's first stage and has been put back.
    DeletionForbidden,
    RotationForbidden(RotationError),
    MoveRejected(StageMoveError),
    UpgradeRejected(UpgradeError),
    /// The world refused to place the object; a placeholder stands in.
    PlacementFailed,
    /// A lookup had several equally ranked candidates.
    AmbiguousMatch,
}

/// A user-facing message about something the engine refused or could not do,
/// located at the object it concerns.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub entity: EntityId,
    pub stage: StageIndex,
    pub position: Position,
    pub player: Option<PlayerId>,
}

/// Which lookup hit a tie.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AmbiguityContext {
    Compatible,
    UndergroundPair,
}

/// Diagnostic entry recording the choice made for an ambiguous lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AmbiguityRecord {
    pub context: AmbiguityContext,
    pub stage: StageIndex,
    pub position: Position,
    pub chosen: EntityId,
}

use thiserror::Error;

use stageplan_shared::{EntityId, StageError, StageIndex};

/// Why a world rotation was reverted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RotationError {
    #[error("Entities can only be rotated in their first stage ({first_stage}), not stage {stage}")]
    NotFirstStage {
        stage: StageIndex,
        first_stage: StageIndex,
    },

    #[error("Underground pair {pair:?} starts in a different stage and cannot be rotated together")]
    PairInDifferentStage { pair: EntityId },

    #[error("Rotation collides with entity {other:?} at stage {stage}")]
    Occupied { stage: StageIndex, other: EntityId },
}

/// Why an upgrade request was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpgradeError {
    #[error("Prototype {name} is not registered")]
    UnknownPrototype { name: String },

    #[error("Cannot upgrade {from} to {to}: they are not in the same category")]
    IncompatibleCategory { from: String, to: String },

    #[error("Underground pair {pair:?} ({name}) cannot be upgraded to {to}")]
    PairIncompatible {
        pair: EntityId,
        name: String,
        to: String,
    },

    #[error(transparent)]
    Stage(#[from] StageError),
}

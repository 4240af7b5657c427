use thiserror::Error;

use crate::{EntityId, StageIndex};

fn fmt_last_stage(last_stage: &Option<StageIndex>) -> String {
    match last_stage {
        Some(stage) => stage.to_string(),
        None => "end".to_string(),
    }
}

/// A stage lookup fell outside an entity's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StageError {
    #[error("Stage {stage} is out of range for entity spanning stages {first_stage}..={}", fmt_last_stage(.last_stage))]
    OutOfRange {
        stage: StageIndex,
        first_stage: StageIndex,
        last_stage: Option<StageIndex>,
    },
}

/// Reasons a stage bound change is rejected. These are expected and user-facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StageMoveError {
    #[error("Entity {entity:?} does not exist")]
    EntityNotFound { entity: EntityId },

    #[error("World object is not tracked by the project")]
    UntrackedObject,

    #[error("Cannot move a settings remnant; revive it first")]
    SettingsRemnant,

    #[error("Cannot set a last stage on a persistent entity")]
    Persistent,

    #[error("Cannot change the last stage of a movable entity")]
    Movable,

    #[error("Stage {stage} is outside the project (1..={stage_count})")]
    StageOutOfProject {
        stage: StageIndex,
        stage_count: StageIndex,
    },

    #[error("Cannot move first stage to {stage}, past last stage {last_stage}")]
    PastLastStage {
        stage: StageIndex,
        last_stage: StageIndex,
    },

    #[error("Cannot move last stage to {stage}, before first stage {first_stage}")]
    BeforeFirstStage {
        stage: StageIndex,
        first_stage: StageIndex,
    },

    #[error("Stage {stage} is already occupied by entity {other:?}")]
    SpaceConflict { stage: StageIndex, other: EntityId },
}

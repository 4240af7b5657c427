use thiserror::Error;

use crate::{EntityId, StageError, StageIndex};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    #[error("Entity {entity:?} does not exist")]
    EntityNotFound { entity: EntityId },

    #[error("Prototype {name} is not registered in the catalog")]
    UnknownPrototype { name: String },

    #[error("Space at stage {stage} is occupied by entity {other:?}")]
    Occupied { stage: StageIndex, other: EntityId },

    #[error("Stage {stage} is outside the project (1..={stage_count})")]
    StageOutOfProject {
        stage: StageIndex,
        stage_count: StageIndex,
    },

    #[error("Cannot remove the only stage of a project")]
    LastRemainingStage,

    #[error("Cannot change {from} into {to}: they are not in the same category")]
    IncompatibleUpgrade { from: String, to: String },

    #[error("Entity {entity:?} is a settings remnant")]
    SettingsRemnant { entity: EntityId },

    #[error("Entity {entity:?} is not a settings remnant")]
    NotSettingsRemnant { entity: EntityId },

    #[error(transparent)]
    Stage(#[from] StageError),
}

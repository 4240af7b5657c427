use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    value::{name_of, AttributeSet},
    AttributeDiff, AttributeValue, DiffValue, Direction, EntityKind, Position, StageIndex,
    StagedEntity, NAME_KEY,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerializationError {
    #[error("Value of {key} at stage {stage} would be read back as a delete marker")]
    MarkerCollision { stage: StageIndex, key: String },

    #[error("Record base value has no string \"name\" attribute")]
    MissingName,

    #[error("Record first stage {stage} is invalid, stages start at 1")]
    InvalidFirstStage { stage: StageIndex },

    #[error("Record last stage {last_stage} is before first stage {first_stage}")]
    InvertedRange {
        first_stage: StageIndex,
        last_stage: StageIndex,
    },

    #[error("Record stores a diff at stage {stage}, outside the entity's range")]
    DiffOutOfRange { stage: StageIndex },

    #[error("Record stores an empty diff at stage {stage}")]
    EmptyDiff { stage: StageIndex },

    #[error("Record diff at stage {stage} removes the string \"name\" attribute")]
    NameDeleted { stage: StageIndex },

    #[error("Movable record must start and end in the same stage")]
    MovableRange,

    #[error("Malformed record: {message}")]
    Malformed { message: String },
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Structural encoding of a staged entity for import and export.
///
/// Field order and names are part of the exchange format.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecord {
    pub first_stage: StageIndex,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_stage: Option<StageIndex>,
    pub base_value: AttributeSet,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub stage_diffs: BTreeMap<StageIndex, AttributeDiff>,
    pub position: Position,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub kind: EntityKind,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub unstaged_values: BTreeMap<StageIndex, AttributeSet>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_settings_remnant: bool,
}

impl EntityRecord {
    pub fn from_entity(entity: &StagedEntity) -> Result<Self, SerializationError> {
        for (stage, diff) in entity.stage_diffs() {
            if let Some((key, _)) = diff.iter().find(|(_, value)| value.collides_with_marker()) {
                return Err(SerializationError::MarkerCollision {
                    stage: *stage,
                    key: key.clone(),
                });
            }
        }
        Ok(Self {
            first_stage: entity.first_stage(),
            last_stage: entity.last_stage(),
            base_value: entity.base_value().clone(),
            stage_diffs: entity.stage_diffs().clone(),
            position: entity.position(),
            direction: entity.direction(),
            kind: entity.kind(),
            unstaged_values: entity.unstaged_values().clone(),
            is_settings_remnant: entity.is_settings_remnant(),
        })
    }

    /// Rebuilds the entity, rejecting records that break the staged-chain rules.
    pub fn into_entity(self) -> Result<StagedEntity, SerializationError> {
        if self.first_stage < 1 {
            return Err(SerializationError::InvalidFirstStage {
                stage: self.first_stage,
            });
        }
        if name_of(&self.base_value).is_none() {
            return Err(SerializationError::MissingName);
        }
        if let Some(last_stage) = self.last_stage {
            if last_stage < self.first_stage {
                return Err(SerializationError::InvertedRange {
                    first_stage: self.first_stage,
                    last_stage,
                });
            }
        }
        if self.kind.is_movable() && self.last_stage != Some(self.first_stage) {
            return Err(SerializationError::MovableRange);
        }
        for (stage, diff) in &self.stage_diffs {
            let in_range = *stage > self.first_stage
                && self.last_stage.map_or(true, |last| *stage <= last);
            if !in_range {
                return Err(SerializationError::DiffOutOfRange { stage: *stage });
            }
            if diff.is_empty() {
                return Err(SerializationError::EmptyDiff { stage: *stage });
            }
            match diff.get(NAME_KEY) {
                None | Some(DiffValue::Set(AttributeValue::String(_))) => {}
                Some(_) => return Err(SerializationError::NameDeleted { stage: *stage }),
            }
        }
        let in_range = |stage: &StageIndex| {
            *stage >= self.first_stage && self.last_stage.map_or(true, |last| *stage <= last)
        };
        let unstaged = self
            .unstaged_values
            .iter()
            .filter(|(stage, value)| in_range(*stage) && !value.is_empty())
            .map(|(stage, value)| (*stage, value.clone()))
            .collect();

        let entity = StagedEntity::new(
            self.base_value,
            self.position,
            self.direction,
            self.kind,
            self.first_stage,
        );
        let entity = if self.kind.is_movable() {
            entity
        } else {
            entity.with_last_stage(self.last_stage)
        };
        Ok(entity.with_stored_changes(self.stage_diffs, unstaged, self.is_settings_remnant))
    }
}

use serde::{Deserialize, Serialize};

use crate::Direction;

/// Which end of a paired belt connector an entity is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BeltIo {
    Input,
    Output,
}

impl BeltIo {
    pub fn flip(self) -> Self {
        match self {
            BeltIo::Input => BeltIo::Output,
            BeltIo::Output => BeltIo::Input,
        }
    }
}

/// Entity subtypes that carry extra fields or rules.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EntityKind {
    #[default]
    Standard,
    /// One end of an underground connector; pairs with an opposite-io partner along its axis.
    Underground { io: BeltIo },
    Loader { io: BeltIo },
    /// Movable; exists only in the stage it was built in.
    RollingStock,
}

impl EntityKind {
    pub fn io(&self) -> Option<BeltIo> {
        match self {
            EntityKind::Underground { io } | EntityKind::Loader { io } => Some(*io),
            _ => None,
        }
    }

    pub fn with_io(self, new_io: BeltIo) -> Self {
        match self {
            EntityKind::Underground { .. } => EntityKind::Underground { io: new_io },
            EntityKind::Loader { .. } => EntityKind::Loader { io: new_io },
            other => other,
        }
    }

    pub fn is_movable(&self) -> bool {
        matches!(self, EntityKind::RollingStock)
    }

    pub fn is_underground(&self) -> bool {
        matches!(self, EntityKind::Underground { .. })
    }

    /// Direction used for shape comparison: an output end is viewed from its input side,
    /// so flipping io together with reversing the direction keeps the same shape.
    pub fn shape_direction(&self, direction: Direction) -> Direction {
        match self.io() {
            Some(BeltIo::Output) => direction.opposite(),
            _ => direction,
        }
    }

    /// Orientation after a world rotation of this kind. Paired connectors flip io and reverse.
    pub fn rotated(&self, direction: Direction) -> (Direction, EntityKind) {
        match self.io() {
            Some(io) => (direction.opposite(), self.with_io(io.flip())),
            None => (direction, *self),
        }
    }
}

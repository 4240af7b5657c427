use serde::{Deserialize, Serialize};

/// 1-based index of a stage in a project.
pub type StageIndex = u32;

/// Handle for a [`StagedEntity`](crate::StagedEntity) inside a [`ProjectContent`](crate::ProjectContent).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    pub fn from_u64(value: u64) -> Self {
        Self(value)
    }

    pub fn to_u64(&self) -> u64 {
        self.0
    }
}

/// Opaque identity of an object living in the external world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorldObjectRef(u64);

impl WorldObjectRef {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Player or agent that caused a world change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PlayerId(pub u32);

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::EntityId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WireKind {
    Red,
    Green,
    Copper,
}

/// An undirected connection between two entities. Endpoints are stored in ascending order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WireConnection {
    first: EntityId,
    second: EntityId,
    kind: WireKind,
}

impl WireConnection {
    pub fn new(a: EntityId, b: EntityId, kind: WireKind) -> Self {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Self {
            first,
            second,
            kind,
        }
    }

    pub fn kind(&self) -> WireKind {
        self.kind
    }

    pub fn touches(&self, entity: EntityId) -> bool {
        self.first == entity || self.second == entity
    }

    /// The endpoint opposite to `entity`.
    pub fn other(&self, entity: EntityId) -> Option<EntityId> {
        if self.first == entity {
            Some(self.second)
        } else if self.second == entity {
            Some(self.first)
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct WireSet {
    connections: BTreeSet<WireConnection>,
}

impl WireSet {
    pub fn insert(&mut self, connection: WireConnection) -> bool {
        self.connections.insert(connection)
    }

    pub fn remove(&mut self, connection: &WireConnection) -> bool {
        self.connections.remove(connection)
    }

    pub fn of(&self, entity: EntityId) -> Vec<WireConnection> {
        self.connections
            .iter()
            .filter(|connection| connection.touches(entity))
            .copied()
            .collect()
    }

    pub fn has_any(&self, entity: EntityId) -> bool {
        self.connections.iter().any(|connection| connection.touches(entity))
    }

    pub fn remove_entity(&mut self, entity: EntityId) -> Vec<WireConnection> {
        let removed = self.of(entity);
        self.connections.retain(|connection| !connection.touches(entity));
        removed
    }
}

use std::collections::HashMap;

use crate::{EntityId, Position, ShapeCategory};

/// Exact-position lookup of entities by shape category.
#[derive(Clone, Default)]
pub struct SpatialIndex {
    cells: HashMap<(Position, ShapeCategory), Vec<EntityId>>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, position: Position, category: ShapeCategory, entity: EntityId) {
        let cell = self.cells.entry((position, category)).or_default();
        if cell.contains(&entity) {
            panic!("SpatialIndex: entity {:?} is already indexed at {}", entity, position);
        }
        cell.push(entity);
        cell.sort();
    }

    pub fn remove(&mut self, position: Position, category: ShapeCategory, entity: EntityId) {
        let key = (position, category);
        let Some(cell) = self.cells.get_mut(&key) else {
            panic!("SpatialIndex: no entities indexed at {}", position);
        };
        let Some(index) = cell.iter().position(|other| *other == entity) else {
            panic!("SpatialIndex: entity {:?} is not indexed at {}", entity, position);
        };
        cell.remove(index);
        if cell.is_empty() {
            self.cells.remove(&key);
        }
    }

    /// Entities at the cell, in ascending id order.
    pub fn get(&self, position: Position, category: ShapeCategory) -> &[EntityId] {
        self.cells
            .get(&(position, category))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Entities of `category` within `radius` tiles (Chebyshev) of `center`.
    pub fn within(&self, center: Position, category: ShapeCategory, radius: u32) -> Vec<EntityId> {
        let radius = radius as i32;
        let mut found = Vec::new();
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let position = Position::new(center.x + dx, center.y + dy);
                found.extend_from_slice(self.get(position, category));
            }
        }
        found
    }
}

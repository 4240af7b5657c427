//! Prototype catalog: what the host's object types look like to the model.
//!
//! Every prototype name is mapped once, at registration, to an interned
//! [`ShapeCategory`]. Two objects are compatible (one can stand in for, or be
//! upgraded into, the other) exactly when their categories are equal.

use std::collections::{BTreeSet, HashMap};

use log::debug;
use thiserror::Error;

use crate::{AttributeSet, BeltIo, Direction, EntityKind};

/// Interned id of a group of mutually compatible prototypes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShapeCategory(u16);

impl ShapeCategory {
    pub fn index(&self) -> u16 {
        self.0
    }
}

/// Which orientations of a prototype occupy the same footprint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RotationSymmetry {
    /// Every direction is distinct.
    #[default]
    None,
    /// A direction and its opposite look the same (straight rails, pipes).
    Opposite,
    /// Orientation does not matter (chests, poles).
    Any,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PrototypeKind {
    #[default]
    Standard,
    Underground { max_distance: u8 },
    Loader,
    RollingStock,
}

impl PrototypeKind {
    /// Builds the entity kind for an object of this prototype. `io` defaults to input.
    pub fn entity_kind(&self, io: Option<BeltIo>) -> EntityKind {
        let io = io.unwrap_or(BeltIo::Input);
        match self {
            PrototypeKind::Standard => EntityKind::Standard,
            PrototypeKind::Underground { .. } => EntityKind::Underground { io },
            PrototypeKind::Loader => EntityKind::Loader { io },
            PrototypeKind::RollingStock => EntityKind::RollingStock,
        }
    }
}

/// Registration input for one prototype.
#[derive(Clone, Debug)]
pub struct PrototypeDef {
    name: String,
    group: Option<String>,
    kind: PrototypeKind,
    symmetry: RotationSymmetry,
    persistent: bool,
}

impl PrototypeDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: None,
            kind: PrototypeKind::Standard,
            symmetry: RotationSymmetry::None,
            persistent: false,
        }
    }

    /// Places this prototype in a named compatibility group. Without one it forms its own group.
    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn underground(mut self, max_distance: u8) -> Self {
        self.kind = PrototypeKind::Underground { max_distance };
        self
    }

    pub fn loader(mut self) -> Self {
        self.kind = PrototypeKind::Loader;
        self
    }

    pub fn rolling_stock(mut self) -> Self {
        self.kind = PrototypeKind::RollingStock;
        self
    }

    pub fn symmetry(mut self, symmetry: RotationSymmetry) -> Self {
        self.symmetry = symmetry;
        self
    }

    /// Entities of this prototype always persist to the final stage.
    pub fn persistent(mut self) -> Self {
        self.persistent = true;
        self
    }
}

/// Cached facts about a registered prototype.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrototypeInfo {
    pub category: ShapeCategory,
    pub kind: PrototypeKind,
    pub symmetry: RotationSymmetry,
    pub persistent: bool,
}

impl PrototypeInfo {
    pub fn underground_max_distance(&self) -> Option<u8> {
        match self.kind {
            PrototypeKind::Underground { max_distance } => Some(max_distance),
            _ => None,
        }
    }
}

/// Rotation-normalized footprint of an object, compared for compatibility.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShapeSignature {
    pub category: ShapeCategory,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("Prototype {name} is already registered")]
    DuplicatePrototype { name: String },
    #[error("Too many shape categories registered (limit {limit})")]
    TooManyCategories { limit: usize },
}

#[derive(Clone, Debug, Default)]
pub struct Catalog {
    prototypes: HashMap<String, PrototypeInfo>,
    categories: HashMap<String, ShapeCategory>,
    category_names: Vec<String>,
    unstaged_keys: BTreeSet<String>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, def: PrototypeDef) -> Result<ShapeCategory, CatalogError> {
        if self.prototypes.contains_key(&def.name) {
            return Err(CatalogError::DuplicatePrototype { name: def.name });
        }
        let group = def.group.unwrap_or_else(|| def.name.clone());
        let category = self.intern_category(&group)?;
        debug!(
            "Catalog: registering prototype {} in category {} ({:?})",
            def.name,
            group,
            category
        );
        self.prototypes.insert(
            def.name,
            PrototypeInfo {
                category,
                kind: def.kind,
                symmetry: def.symmetry,
                persistent: def.persistent,
            },
        );
        Ok(category)
    }

    fn intern_category(&mut self, group: &str) -> Result<ShapeCategory, CatalogError> {
        if let Some(category) = self.categories.get(group) {
            return Ok(*category);
        }
        let limit = u16::MAX as usize;
        if self.category_names.len() >= limit {
            return Err(CatalogError::TooManyCategories { limit });
        }
        let category = ShapeCategory(self.category_names.len() as u16);
        self.categories.insert(group.to_string(), category);
        self.category_names.push(group.to_string());
        Ok(category)
    }

    pub fn get(&self, name: &str) -> Option<&PrototypeInfo> {
        self.prototypes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.prototypes.contains_key(name)
    }

    pub fn category_of(&self, name: &str) -> Option<ShapeCategory> {
        self.prototypes.get(name).map(|info| info.category)
    }

    pub fn category_name(&self, category: ShapeCategory) -> Option<&str> {
        self.category_names
            .get(category.0 as usize)
            .map(String::as_str)
    }

    /// Whether `from` may be replaced in place by `to`.
    pub fn are_compatible(&self, from: &str, to: &str) -> bool {
        match (self.category_of(from), self.category_of(to)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Shape of an object of prototype `name` facing `direction`, or `None` for unknown prototypes.
    pub fn signature(
        &self,
        name: &str,
        direction: Direction,
        kind: &EntityKind,
    ) -> Option<ShapeSignature> {
        let info = self.prototypes.get(name)?;
        let direction = kind.shape_direction(direction);
        let direction = match info.symmetry {
            RotationSymmetry::None => direction,
            RotationSymmetry::Opposite => Direction::from_index(direction.index() % 4),
            RotationSymmetry::Any => Direction::North,
        };
        Some(ShapeSignature {
            category: info.category,
            direction,
        })
    }

    /// Marks an attribute as tracked per stage but never diffed.
    pub fn add_unstaged_key(&mut self, key: impl Into<String>) {
        self.unstaged_keys.insert(key.into());
    }

    pub fn is_unstaged_key(&self, key: &str) -> bool {
        self.unstaged_keys.contains(key)
    }

    /// Splits a world attribute set into its staged part and its unstaged part.
    pub fn split_unstaged(&self, mut attributes: AttributeSet) -> (AttributeSet, Option<AttributeSet>) {
        if self.unstaged_keys.is_empty() {
            return (attributes, None);
        }
        let mut unstaged = AttributeSet::new();
        for key in &self.unstaged_keys {
            if let Some(value) = attributes.remove(key) {
                unstaged.insert(key.clone(), value);
            }
        }
        let unstaged = if unstaged.is_empty() { None } else { Some(unstaged) };
        (attributes, unstaged)
    }
}

//! # Stageplan Shared
//! Staged entity model shared by the stageplan engine and its hosts: the stage
//! diff codec, staged entities, the project content store and the record format.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

#[macro_use]
extern crate cfg_if;

mod catalog;
mod content;
mod diff;
mod entity;
mod geometry;
mod record;
mod types;
mod value;

cfg_if! {
    if #[cfg(feature = "json")] {
        mod json;
        pub use json::{entities_from_json, entities_to_json, entity_from_json, entity_to_json};
    }
}

pub use catalog::{
    Catalog, CatalogError, PrototypeDef, PrototypeInfo, PrototypeKind, RotationSymmetry,
    ShapeCategory, ShapeSignature,
};
pub use content::{
    error::ContentError,
    project_content::{AddOutcome, CompatibleMatch, ProjectContent, RemovedEntity, StageShiftReport},
    spatial_index::SpatialIndex,
    wires::{WireConnection, WireKind, WireSet},
    world_registry::{WorldRegistry, WorldSlot},
};
pub use diff::{apply, apply_in_place, diff, merge_diff_into, AttributeDiff, DiffValue, DELETED_MARKER_KEY};
pub use entity::{
    entity_kind::{BeltIo, EntityKind},
    error::{StageError, StageMoveError},
    staged_entity::{DiscardOutcome, StagedEntity},
};
pub use geometry::{Direction, Position};
pub use record::{EntityRecord, SerializationError};
pub use types::{EntityId, PlayerId, StageIndex, WorldObjectRef};
pub use value::{name_of, AttributeSet, AttributeValue, NAME_KEY};

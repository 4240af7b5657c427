//! # Stageplan Engine
//! Keeps a live, multi-stage world in sync with a staged plan. World change
//! notifications are reconciled into the plan, plan edits are materialized into
//! the world, and bulk work runs as cooperative tasks.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

#[macro_use]
extern crate cfg_if;

pub mod shared {
    pub use stageplan_shared::{
        apply, attributes, diff, merge_diff_into, name_of, AddOutcome, AttributeDiff, AttributeSet,
        AttributeValue, BeltIo, Catalog, CatalogError, CompatibleMatch, ContentError, DiffValue,
        Direction, EntityId, EntityKind, EntityRecord, PlayerId, Position, ProjectContent,
        PrototypeDef, PrototypeInfo, PrototypeKind, RemovedEntity, RotationSymmetry,
        SerializationError, ShapeCategory, ShapeSignature, StageError, StageIndex,
        StageMoveError, StageShiftReport, StagedEntity, WireConnection, WireKind,
        WorldObjectRef, WorldSlot, DELETED_MARKER_KEY, NAME_KEY,
    };

    cfg_if! {
        if #[cfg(feature = "json")] {
            pub use stageplan_shared::{
                entities_from_json, entities_to_json, entity_from_json, entity_to_json,
            };
        }
    }
}

mod config;
mod error;
mod notification;
mod project;
mod reconcile;
mod sync;
mod task;
mod undo;
mod world_store;

pub use config::{ProjectConfig, SyncConfig};
pub use error::{RotationError, UpgradeError};
pub use notification::{AmbiguityContext, AmbiguityRecord, Notification, NotificationKind};
pub use project::Project;
pub use reconcile::ReconcileOutcome;
pub use sync::sync_state::SyncMode;
pub use task::{
    rebuild_all::RebuildAllStagesTask,
    resync::ResyncProjectTask,
    runner::{TaskError, TaskRunner},
    Task, TaskProgress,
};
pub use undo::undo_log::{UndoHandler, UndoLog, UndoPayload, UndoRecord};
pub use world_store::{ObjectSpec, WorldStore};

pub mod entity_kind;
pub mod error;
pub mod staged_entity;

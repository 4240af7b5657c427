mod checked_map;

pub mod error;
pub mod project_content;
pub mod spatial_index;
pub mod wires;
pub mod world_registry;

pub mod sync_state;
pub mod world_sync;

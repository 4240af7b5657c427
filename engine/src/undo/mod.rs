mod actions;
pub mod undo_log;

pub mod assertions;
pub mod project_builder;

pub use project_builder::*;

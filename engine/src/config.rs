use std::default::Default;

use stageplan_shared::StageIndex;

/// Contains Config properties used by the world sync engine
#[derive(Clone, Debug)]
pub struct SyncConfig {
    /// Show a preview object at stages where an entity is absent (before its first
    /// stage, or anywhere in range while it is a settings remnant).
    pub show_previews: bool,
    /// Number of entities a `ResyncProjectTask` handles per step.
    pub entities_per_step: usize,
    /// Queue a notification whenever an object could not be placed.
    pub notify_placement_failures: bool,
    /// Radius, in tiles, within which a movable object matches an existing entity.
    pub movable_match_radius: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            show_previews: true,
            entities_per_step: 64,
            notify_placement_failures: true,
            movable_match_radius: 1,
        }
    }
}

/// Contains Config properties used by a Project
#[derive(Clone, Debug)]
pub struct ProjectConfig {
    /// Stage count of a freshly created project.
    pub initial_stage_count: StageIndex,
    /// Used to configure world synchronization
    pub sync: SyncConfig,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            initial_stage_count: 3,
            sync: SyncConfig::default(),
        }
    }
}

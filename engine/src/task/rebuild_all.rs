use stageplan_shared::StageIndex;

use super::{Task, TaskProgress};
use crate::{project::Project, world_store::WorldStore};

/// Rebuilds every entity, one stage per step.
pub struct RebuildAllStagesTask {
    next_stage: StageIndex,
    stage_count: StageIndex,
    cancelled: bool,
}

impl RebuildAllStagesTask {
    pub fn new(stage_count: StageIndex) -> Self {
        Self {
            next_stage: 1,
            stage_count,
            cancelled: false,
        }
    }
}

impl<W: WorldStore> Task<W> for RebuildAllStagesTask {
    fn title(&self) -> &str {
        "Rebuild all stages"
    }

    fn is_done(&self) -> bool {
        self.cancelled || self.next_stage > self.stage_count
    }

    fn step(&mut self, project: &mut Project<W>) {
        if Task::<W>::is_done(self) {
            return;
        }
        // the project may have lost stages since the task started
        self.stage_count = self.stage_count.min(project.stage_count());
        if self.next_stage <= self.stage_count {
            project.rebuild_stage(self.next_stage);
        }
        self.next_stage += 1;
    }

    fn progress(&self) -> TaskProgress {
        TaskProgress {
            done: (self.next_stage - 1).min(self.stage_count) as usize,
            total: self.stage_count as usize,
        }
    }

    fn cancel(&mut self, _project: &mut Project<W>) {
        self.cancelled = true;
    }
}

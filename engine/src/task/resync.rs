use std::collections::VecDeque;

use stageplan_shared::EntityId;

use super::{Task, TaskProgress};
use crate::{project::Project, world_store::WorldStore};

/// Refreshes every stage of every entity, a fixed number of entities per step.
pub struct ResyncProjectTask {
    remaining: VecDeque<EntityId>,
    total: usize,
    per_step: usize,
    cancelled: bool,
}

impl ResyncProjectTask {
    pub fn new<W: WorldStore>(project: &Project<W>) -> Self {
        let remaining: VecDeque<EntityId> = project.content().entity_ids().into();
        Self {
            total: remaining.len(),
            remaining,
            per_step: project.config().sync.entities_per_step.max(1),
            cancelled: false,
        }
    }
}

impl<W: WorldStore> Task<W> for ResyncProjectTask {
    fn title(&self) -> &str {
        "Resync project"
    }

    fn is_done(&self) -> bool {
        self.cancelled || self.remaining.is_empty()
    }

    fn step(&mut self, project: &mut Project<W>) {
        if self.cancelled {
            return;
        }
        project.batch(|project| {
            for _ in 0..self.per_step {
                let Some(id) = self.remaining.pop_front() else {
                    break;
                };
                if project.content().contains(id) {
                    project.resync_entity(id);
                }
            }
        });
    }

    fn progress(&self) -> TaskProgress {
        TaskProgress {
            done: self.total - self.remaining.len(),
            total: self.total,
        }
    }

    fn cancel(&mut self, _project: &mut Project<W>) {
        self.cancelled = true;
        self.remaining.clear();
    }
}

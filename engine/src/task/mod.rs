use crate::{project::Project, world_store::WorldStore};

pub mod rebuild_all;
pub mod resync;
pub mod runner;

/// How far a task has come, in its own units of work.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskProgress {
    pub done: usize,
    pub total: usize,
}

impl TaskProgress {
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            return 1.0;
        }
        self.done as f32 / self.total as f32
    }
}

/// A bulk operation split into bounded steps, driven once per tick by a [`TaskRunner`](runner::TaskRunner).
pub trait Task<W: WorldStore> {
    fn title(&self) -> &str;

    fn is_done(&self) -> bool;

    /// Performs one bounded unit of work. Does nothing once done.
    fn step(&mut self, project: &mut Project<W>);

    fn progress(&self) -> TaskProgress;

    /// Stops the task. Work already done stays applied.
    fn cancel(&mut self, project: &mut Project<W>);
}

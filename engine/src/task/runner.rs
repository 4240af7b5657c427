use log::info;
use thiserror::Error;

use super::{Task, TaskProgress};
use crate::{project::Project, world_store::WorldStore};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("Task \"{running}\" is still running")]
    AlreadyRunning { running: String },
}

/// Owns at most one running task and steps it once per tick. World notifications
/// are blocked on the project while a task runs.
pub struct TaskRunner<W: WorldStore> {
    current: Option<Box<dyn Task<W>>>,
}

impl<W: WorldStore> Default for TaskRunner<W> {
    fn default() -> Self {
        Self { current: None }
    }
}

impl<W: WorldStore> TaskRunner<W> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.current.is_some()
    }

    pub fn current_title(&self) -> Option<&str> {
        self.current.as_ref().map(|task| task.title())
    }

    pub fn progress(&self) -> Option<TaskProgress> {
        self.current.as_ref().map(|task| task.progress())
    }

    pub fn submit(
        &mut self,
        project: &mut Project<W>,
        task: Box<dyn Task<W>>,
    ) -> Result<(), TaskError> {
        if let Some(running) = &self.current {
            return Err(TaskError::AlreadyRunning {
                running: running.title().to_string(),
            });
        }
        info!("TaskRunner: starting {}", task.title());
        project.set_world_updates_blocked(true);
        self.current = Some(task);
        Ok(())
    }

    /// Steps the current task once. Returns `true` while a task is still running.
    pub fn tick(&mut self, project: &mut Project<W>) -> bool {
        let Some(task) = self.current.as_mut() else {
            return false;
        };
        task.step(project);
        if !task.is_done() {
            return true;
        }
        info!("TaskRunner: finished {}", task.title());
        self.current = None;
        project.set_world_updates_blocked(false);
        false
    }

    /// Returns `false` if nothing was running.
    pub fn cancel(&mut self, project: &mut Project<W>) -> bool {
        let Some(mut task) = self.current.take() else {
            return false;
        };
        task.cancel(project);
        info!("TaskRunner: cancelled {}", task.title());
        project.set_world_updates_blocked(false);
        true
    }

    /// Ticks until the current task is done.
    pub fn run_to_completion(&mut self, project: &mut Project<W>) {
        while self.tick(project) {}
    }
}

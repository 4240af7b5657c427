use log::info;

use stageplan_shared::{
    Catalog, CompatibleMatch, ContentError, EntityId, PlayerId, Position, ProjectContent,
    StageIndex, WorldObjectRef,
};

use crate::{
    config::ProjectConfig,
    notification::{AmbiguityContext, AmbiguityRecord, Notification, NotificationKind},
    sync::{
        sync_state::{SyncMode, SyncState},
        world_sync::WorldSync,
    },
    task::rebuild_all::RebuildAllStagesTask,
    undo::undo_log::{UndoLog, UndoPayload, UndoRecord},
    world_store::WorldStore,
};

/// A staged plan together with the live world it is materialized into.
///
/// World change notifications come in through the `on_object_*` methods, user
/// actions through the stage and value methods. Everything that mutates runs in a
/// batch, so the world is synchronized once per call.
pub struct Project<W: WorldStore> {
    pub(crate) config: ProjectConfig,
    pub(crate) content: ProjectContent,
    pub(crate) world: W,
    pub(crate) sync_state: SyncState,
    pub(crate) notifications: Vec<Notification>,
    pub(crate) ambiguities: Vec<AmbiguityRecord>,
    pub(crate) undo_log: UndoLog,
}

impl<W: WorldStore> Project<W> {
    pub fn new(catalog: Catalog, world: W, config: ProjectConfig) -> Self {
        let content = ProjectContent::new(catalog, config.initial_stage_count.max(1));
        Self::with_content(content, world, config)
    }

    /// Wraps existing content, for example one rebuilt from imported records.
    /// Call [`Project::rebuild_all_stages`] or resync to materialize it.
    pub fn with_content(content: ProjectContent, world: W, config: ProjectConfig) -> Self {
        info!(
            "Project: created with {} stage(s) and {} entities",
            content.stage_count(),
            content.len()
        );
        Self {
            config,
            content,
            world,
            sync_state: SyncState::new(),
            notifications: Vec::new(),
            ambiguities: Vec::new(),
            undo_log: UndoLog::new(),
        }
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn content(&self) -> &ProjectContent {
        &self.content
    }

    /// Direct content access. Changes made here are not synchronized to the world.
    pub fn content_mut(&mut self) -> &mut ProjectContent {
        &mut self.content
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut W {
        &mut self.world
    }

    pub fn stage_count(&self) -> StageIndex {
        self.content.stage_count()
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    /// Every ambiguous lookup resolved so far and the entity it picked.
    pub fn ambiguities(&self) -> &[AmbiguityRecord] {
        &self.ambiguities
    }

    pub fn take_undo_records(&mut self) -> Vec<UndoRecord> {
        self.undo_log.take_records()
    }

    /// While set, world notifications are ignored.
    pub fn world_updates_blocked(&self) -> bool {
        self.sync_state.updates_blocked()
    }

    pub fn set_world_updates_blocked(&mut self, blocked: bool) {
        self.sync_state.set_updates_blocked(blocked);
    }

    // Batching

    /// Runs `body` with world sync deferred; all requests flush once the outermost batch ends.
    pub fn batch<R>(&mut self, body: impl FnOnce(&mut Self) -> R) -> R {
        self.sync_state.begin_batch();
        let result = body(self);
        if self.sync_state.end_batch() {
            self.flush_pending();
        }
        result
    }

    fn flush_pending(&mut self) {
        while self.sync_state.has_pending() {
            let pending = self.sync_state.take_pending();
            self.world_sync().flush(pending);
        }
    }

    pub(crate) fn world_sync(&mut self) -> WorldSync<'_, W> {
        WorldSync::new(
            &mut self.content,
            &mut self.world,
            &self.config.sync,
            &mut self.notifications,
        )
    }

    pub(crate) fn request(&mut self, id: EntityId, stage: StageIndex, mode: SyncMode) {
        if stage < 1 || stage > self.content.stage_count() {
            return;
        }
        self.sync_state.request(id, stage, mode);
        if !self.sync_state.in_batch() {
            self.flush_pending();
        }
    }

    pub(crate) fn request_range(
        &mut self,
        id: EntityId,
        from: StageIndex,
        to: StageIndex,
        mode: SyncMode,
    ) {
        let to = to.min(self.content.stage_count());
        self.batch(|project| {
            for stage in from.max(1)..=to {
                project.request(id, stage, mode);
            }
        });
    }

    /// Last stage the entity exists in, bounded by the project.
    pub(crate) fn last_stage_of(&self, id: EntityId) -> StageIndex {
        let stage_count = self.content.stage_count();
        self.content
            .entity(id)
            .and_then(|entity| entity.last_stage())
            .map_or(stage_count, |last| last.min(stage_count))
    }

    pub(crate) fn position_of(&self, id: EntityId) -> Position {
        self.content
            .entity(id)
            .map(|entity| entity.position())
            .unwrap_or_default()
    }

    pub(crate) fn notify(
        &mut self,
        kind: NotificationKind,
        entity: EntityId,
        stage: StageIndex,
        player: Option<PlayerId>,
    ) {
        let position = self.position_of(entity);
        self.notifications.push(Notification {
            kind,
            entity,
            stage,
            position,
            player,
        });
    }

    pub(crate) fn note_ambiguity(
        &mut self,
        context: AmbiguityContext,
        found: CompatibleMatch,
        stage: StageIndex,
        player: Option<PlayerId>,
    ) {
        if !found.ambiguous {
            return;
        }
        let position = self.position_of(found.entity);
        self.ambiguities.push(AmbiguityRecord {
            context,
            stage,
            position,
            chosen: found.entity,
        });
        self.notify(NotificationKind::AmbiguousMatch, found.entity, stage, player);
    }

    pub(crate) fn record_undo(&mut self, player: Option<PlayerId>, payload: UndoPayload) {
        if let Some(player) = player {
            let handler = payload.handler();
            self.undo_log.record(player, handler, payload);
        }
    }

    // World sync

    /// Materializes the entity from its first stage through `through` (or its last stage)
    /// and shows previews below it.
    pub fn add(&mut self, id: EntityId, through: Option<StageIndex>) {
        let Some(first) = self.content.entity(id).map(|entity| entity.first_stage()) else {
            return;
        };
        let last = self.last_stage_of(id);
        let through = through.map_or(last, |through| through.min(last));
        self.batch(|project| {
            for stage in 1..first {
                project.request(id, stage, SyncMode::Refresh);
            }
            for stage in first..=through {
                project.request(id, stage, SyncMode::Add);
            }
        });
    }

    /// Brings one stage in line with the model. A `hint` object found at the spot is
    /// adopted instead of building a new one.
    pub fn refresh(&mut self, id: EntityId, stage: StageIndex, hint: Option<WorldObjectRef>) {
        if let Some(hint) = hint {
            let adoptable = self.world.is_valid(hint)
                && self.content.registry().owner_of(hint).is_none()
                && self
                    .content
                    .entity(id)
                    .map_or(false, |entity| !entity.is_settings_remnant() && entity.is_in_stage(stage));
            if adoptable {
                self.world_sync().adopt(id, stage, hint);
            }
        }
        self.request(id, stage, SyncMode::Refresh);
    }

    pub fn refresh_range(&mut self, id: EntityId, from: StageIndex, to: StageIndex) {
        self.request_range(id, from, to, SyncMode::Refresh);
    }

    /// Refreshes every stage of the project for `id`, previews included.
    pub fn resync_entity(&mut self, id: EntityId) {
        let stage_count = self.content.stage_count();
        self.request_range(id, 1, stage_count, SyncMode::Refresh);
    }

    /// Rebuilds presence after the entity stopped being a settings remnant.
    pub fn revive(&mut self, id: EntityId) {
        let Some(first) = self.content.entity(id).map(|entity| entity.first_stage()) else {
            return;
        };
        let last = self.last_stage_of(id);
        let stage_count = self.content.stage_count();
        self.batch(|project| {
            for stage in 1..=stage_count {
                let mode = if (first..=last).contains(&stage) {
                    SyncMode::Add
                } else {
                    SyncMode::Refresh
                };
                project.request(id, stage, mode);
            }
        });
    }

    pub fn delete_all_presence(&mut self, id: EntityId) {
        self.world_sync().delete_all_presence(id);
    }

    /// Tears down and recreates the object at `stage`, ignoring whatever the world shows there.
    pub fn rebuild(&mut self, id: EntityId, stage: StageIndex) {
        self.batch(|project| project.world_sync().rebuild_stage(id, stage));
    }

    /// Rebuilds every entity at one stage.
    pub fn rebuild_stage(&mut self, stage: StageIndex) {
        info!("Project: rebuilding stage {}", stage);
        for id in self.content.entity_ids() {
            self.rebuild(id, stage);
        }
    }

    /// A task that rebuilds every stage, one stage per step.
    pub fn rebuild_all_stages(&self) -> RebuildAllStagesTask {
        RebuildAllStagesTask::new(self.content.stage_count())
    }

    pub fn has_error_at(&self, id: EntityId, stage: StageIndex) -> bool {
        self.content
            .registry()
            .slot(id, stage)
            .map_or(false, |slot| slot.is_errored())
    }

    /// Retries all failed placements. Returns how many now succeed.
    pub fn cleanup_errors(&mut self) -> usize {
        let cleared = self.world_sync().cleanup_errors();
        info!("Project: cleanup cleared {} errored slot(s)", cleared);
        cleared
    }

    // Stage shifts

    pub fn insert_stage(&mut self, at: StageIndex) -> Result<(), ContentError> {
        self.content.insert_stage(at)?;
        self.world.insert_stage(at);
        self.batch(|project| {
            for id in project.content.entity_ids() {
                project.request(id, at, SyncMode::Refresh);
            }
        });
        Ok(())
    }

    /// Removes stage `at` and everything recorded in it. Entities created there are deleted.
    pub fn discard_stage(&mut self, at: StageIndex) -> Result<(), ContentError> {
        let report = self.content.discard_stage(at)?;
        for removed in &report.removed {
            for object in removed.slots.values().filter_map(|slot| slot.object()) {
                if self.world.is_valid(object) {
                    self.world.destroy_object(object);
                }
            }
        }
        self.world.remove_stage(at);
        self.batch(|project| {
            for id in report.affected {
                let last = project.last_stage_of(id);
                project.request_range(id, report.stage, last, SyncMode::Refresh);
            }
        });
        Ok(())
    }

    /// Removes stage `at`, folding its changes into the neighbouring stage.
    pub fn merge_stage(&mut self, at: StageIndex) -> Result<(), ContentError> {
        let report = self.content.merge_stage(at)?;
        self.world.remove_stage(at);
        self.batch(|project| {
            for id in report.affected {
                project.request(id, report.stage, SyncMode::Refresh);
            }
        });
        Ok(())
    }
}

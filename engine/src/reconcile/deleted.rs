use log::{debug, info, warn};

use stageplan_shared::{diff, EntityId, PlayerId, StageIndex, WorldObjectRef, WorldSlot, NAME_KEY};

use super::ReconcileOutcome;
use crate::{
    notification::NotificationKind, project::Project, undo::undo_log::UndoPayload,
    world_store::WorldStore,
};

impl<W: WorldStore> Project<W> {
    /// The world removed `object` from `stage`.
    ///
    /// At the first stage the entity is deleted, or kept as a settings remnant when it
    /// has stage diffs or wires. Above the first stage deletion is forbidden and the
    /// object is put back.
    pub fn on_object_deleted(
        &mut self,
        object: WorldObjectRef,
        stage: StageIndex,
        player: Option<PlayerId>,
    ) -> ReconcileOutcome {
        if self.world_updates_blocked() {
            return ReconcileOutcome::Ignored;
        }
        let Some((id, slot)) = self.tracked_owner(object, stage) else {
            debug!("Project: deletion of untracked object {:?} ignored", object);
            return ReconcileOutcome::Ignored;
        };

        self.batch(|project| match slot {
            WorldSlot::Preview(_) | WorldSlot::Errored { .. } => {
                project.world_sync().destroy_slot(id, stage);
                project.refresh(id, stage, None);
                ReconcileOutcome::PreviewRestored(id)
            }
            WorldSlot::Live(_) => {
                let first_stage = project
                    .content
                    .entity(id)
                    .map_or(stage, |entity| entity.first_stage());
                if stage == first_stage {
                    project.delete_at_first_stage(id, player)
                } else {
                    project.fold_lost_copy(id, object, stage);
                    project.deletion_forbidden(id, stage, player)
                }
            }
        })
    }

    fn delete_at_first_stage(&mut self, id: EntityId, player: Option<PlayerId>) -> ReconcileOutcome {
        let Some(before) = self.content.entity(id).cloned() else {
            return ReconcileOutcome::Ignored;
        };
        let keep_settings = !before.is_movable()
            && (before.has_stage_diffs() || self.content.has_wires(id));
        self.delete_all_presence(id);

        if keep_settings {
            if let Err(err) = self.content.make_settings_remnant(id) {
                warn!("Project: {:?} could not become a settings remnant: {}", id, err);
                return ReconcileOutcome::Ignored;
            }
            self.resync_entity(id);
            self.record_undo(
                player,
                UndoPayload::ReplaceStagedData {
                    entity: id,
                    data: Box::new(before),
                },
            );
            return ReconcileOutcome::MadeSettingsRemnant(id);
        }

        if let Some(removed) = self.content.delete_entity(id) {
            self.record_undo(
                player,
                UndoPayload::RestoreEntity {
                    removed: Box::new(removed),
                },
            );
        }
        ReconcileOutcome::Deleted(id)
    }

    /// Records what a removed higher-stage copy differed by, ignoring name changes.
    fn fold_lost_copy(&mut self, id: EntityId, object: WorldObjectRef, stage: StageIndex) {
        let Some(observed) = self.world.read_object(object) else {
            return;
        };
        let (value, _) = self.observed_values(&observed);
        let Some(expected) = self
            .content
            .entity(id)
            .and_then(|entity| entity.value_at_stage(stage).ok())
        else {
            return;
        };
        let Some(mut changes) = diff(&expected, &value) else {
            return;
        };
        changes.remove(NAME_KEY);
        if changes.is_empty() {
            return;
        }
        match self.content.apply_diff_at_stage(id, stage, &changes) {
            Ok(true) => {
                info!("Project: kept changes of {:?} lost with its stage {} copy", id, stage);
                let last = self.last_stage_of(id);
                self.refresh_range(id, stage + 1, last);
            }
            Ok(false) => {}
            Err(err) => warn!("Project: changes of {:?} at stage {} dropped: {}", id, stage, err),
        }
    }

    /// Puts back the object at `stage` after a forbidden deletion and notifies.
    pub fn deletion_forbidden(
        &mut self,
        id: EntityId,
        stage: StageIndex,
        player: Option<PlayerId>,
    ) -> ReconcileOutcome {
        if !self.content.contains(id) {
            return ReconcileOutcome::Ignored;
        }
        warn!("Project: deletion of {:?} at stage {} is not allowed, restoring", id, stage);
        self.batch(|project| {
            project.world_sync().destroy_slot(id, stage);
            project.refresh(id, stage, None);
        });
        self.notify(NotificationKind::DeletionForbidden, id, stage, player);
        ReconcileOutcome::DeletionForbidden(id)
    }
}

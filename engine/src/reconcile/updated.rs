use log::{debug, warn};

use stageplan_shared::{
    diff, name_of, EntityId, PlayerId, StageIndex, WorldObjectRef, WorldSlot, NAME_KEY,
};

use super::ReconcileOutcome;
use crate::{
    error::UpgradeError,
    notification::NotificationKind,
    project::Project,
    undo::undo_log::UndoPayload,
    world_store::{ObjectSpec, WorldStore},
};

impl<W: WorldStore> Project<W> {
    /// The world changed attributes (or the orientation) of `object` at `stage`.
    ///
    /// The change is recorded as a diff at `stage` and pushed to the later stages.
    /// Objects the project does not know yet are handled as newly created.
    pub fn on_object_updated(
        &mut self,
        object: WorldObjectRef,
        stage: StageIndex,
        player: Option<PlayerId>,
    ) -> ReconcileOutcome {
        if self.world_updates_blocked() || !self.world.is_valid(object) {
            return ReconcileOutcome::Ignored;
        }
        if self.content.registry().owner_of(object).is_none() {
            return self.on_object_created(object, stage, player);
        }
        let Some((id, slot)) = self.tracked_owner(object, stage) else {
            return ReconcileOutcome::Ignored;
        };
        if !matches!(slot, WorldSlot::Live(_)) {
            debug!("Project: update of a stand-in for {:?} ignored", id);
            return ReconcileOutcome::Ignored;
        }
        let Some(observed) = self.world.read_object(object) else {
            return ReconcileOutcome::Ignored;
        };

        self.batch(|project| project.apply_observed(id, stage, observed, player))
    }

    fn apply_observed(
        &mut self,
        id: EntityId,
        stage: StageIndex,
        observed: ObjectSpec,
        player: Option<PlayerId>,
    ) -> ReconcileOutcome {
        let Some(before) = self.content.entity(id).cloned() else {
            return ReconcileOutcome::Ignored;
        };
        let mut rotated = false;
        let mut changed = false;

        if observed.direction != before.direction() || observed.kind != before.kind() {
            match self.rotate_entity(id, stage, observed.direction, observed.kind, player) {
                Ok(done) => rotated = done,
                Err(err) => {
                    self.notify(NotificationKind::RotationForbidden(err), id, stage, player);
                    self.refresh(id, stage, None);
                    return ReconcileOutcome::RotationForbidden(id);
                }
            }
        }

        let (value, unstaged) = self.observed_values(&observed);
        let Ok(expected) = before.value_at_stage(stage) else {
            return ReconcileOutcome::Ignored;
        };
        let mut revert_stage = false;
        if let Some(mut changes) = diff(&expected, &value) {
            if changes.contains_key(NAME_KEY) {
                let from = before.name_at(stage).to_string();
                let to = name_of(&value).unwrap_or_default().to_string();
                if !self.content.catalog().are_compatible(&from, &to) {
                    warn!("Project: {:?} cannot change from {} to {}", id, from, to);
                    changes.remove(NAME_KEY);
                    revert_stage = true;
                    self.notify(
                        NotificationKind::UpgradeRejected(UpgradeError::IncompatibleCategory {
                            from,
                            to,
                        }),
                        id,
                        stage,
                        player,
                    );
                }
            }
            if !changes.is_empty() {
                match self.content.apply_diff_at_stage(id, stage, &changes) {
                    Ok(applied) => changed |= applied,
                    Err(err) => {
                        warn!("Project: update of {:?} at stage {} dropped: {}", id, stage, err);
                        revert_stage = true;
                    }
                }
            }
        }
        if before.unstaged_value(stage) != unstaged.as_ref() {
            match self.content.set_unstaged_value(id, stage, unstaged) {
                Ok(applied) => changed |= applied,
                Err(err) => warn!("Project: unstaged values of {:?} not kept: {}", id, err),
            }
        }

        let last = self.last_stage_of(id);
        if revert_stage {
            self.refresh(id, stage, None);
        }
        if changed {
            self.refresh_range(id, stage + 1, last);
            // rotations record their own undo entry
            self.record_undo(
                player,
                UndoPayload::ReplaceStagedData {
                    entity: id,
                    data: Box::new(before),
                },
            );
        }
        ReconcileOutcome::Updated {
            entity: id,
            changed: changed || rotated,
        }
    }
}

use log::info;

use stageplan_shared::{
    AttributeDiff, ContentError, EntityId, PlayerId, StageError, StageIndex, WorldObjectRef,
    WorldSlot, NAME_KEY,
};

use super::ReconcileOutcome;
use crate::{
    error::UpgradeError,
    notification::{AmbiguityContext, NotificationKind},
    project::Project,
    undo::undo_log::UndoPayload,
    world_store::WorldStore,
};

fn rename_diff(name: &str) -> AttributeDiff {
    let mut diff = AttributeDiff::new();
    diff.set(NAME_KEY, name);
    diff
}

fn upgrade_refused(err: ContentError) -> UpgradeError {
    match err {
        ContentError::IncompatibleUpgrade { from, to } => {
            UpgradeError::IncompatibleCategory { from, to }
        }
        ContentError::Stage(err) => UpgradeError::Stage(err),
        other => panic!("Project: unexpected upgrade failure: {}", other),
    }
}

impl<W: WorldStore> Project<W> {
    /// The world asked for `object` at `stage` to become `target`.
    pub fn on_object_marked_for_upgrade(
        &mut self,
        object: WorldObjectRef,
        stage: StageIndex,
        target: &str,
        player: Option<PlayerId>,
    ) -> ReconcileOutcome {
        if self.world_updates_blocked() || !self.world.is_valid(object) {
            return ReconcileOutcome::Ignored;
        }
        let Some((id, WorldSlot::Live(_))) = self.tracked_owner(object, stage) else {
            return ReconcileOutcome::Ignored;
        };

        self.batch(|project| match project.upgrade_entity(id, stage, target, player) {
            Ok(_) => ReconcileOutcome::Upgraded(id),
            Err(err) => {
                project.notify(NotificationKind::UpgradeRejected(err), id, stage, player);
                project.refresh(id, stage, None);
                ReconcileOutcome::UpgradeRejected(id)
            }
        })
    }

    /// Changes the entity's name from `stage` on. Both ends of an underground pair are
    /// checked before either is changed. Returns `false` if the name already matched.
    pub fn upgrade_entity(
        &mut self,
        id: EntityId,
        stage: StageIndex,
        target: &str,
        player: Option<PlayerId>,
    ) -> Result<bool, UpgradeError> {
        let catalog = self.content.catalog();
        if !catalog.contains(target) {
            return Err(UpgradeError::UnknownPrototype {
                name: target.to_string(),
            });
        }
        let Some(before) = self.content.entity(id).cloned() else {
            return Ok(false);
        };
        if !before.is_in_stage(stage) {
            return Err(UpgradeError::Stage(StageError::OutOfRange {
                stage,
                first_stage: before.first_stage(),
                last_stage: before.last_stage(),
            }));
        }
        let current = before.name_at(stage).to_string();
        if current == target {
            return Ok(false);
        }
        if !catalog.are_compatible(&current, target) {
            return Err(UpgradeError::IncompatibleCategory {
                from: current,
                to: target.to_string(),
            });
        }

        let pair = if before.kind().is_underground() {
            self.content.find_underground_pair(id, stage)
        } else {
            None
        };
        let mut pair_upgrade = None;
        if let Some(found) = pair {
            if let Some(pair_entity) = self.content.entity(found.entity) {
                let pair_stage = stage.max(pair_entity.first_stage());
                let pair_name = pair_entity.name_at(pair_stage).to_string();
                if !catalog.are_compatible(&pair_name, target) {
                    return Err(UpgradeError::PairIncompatible {
                        pair: found.entity,
                        name: pair_name,
                        to: target.to_string(),
                    });
                }
                if pair_entity.is_in_stage(pair_stage) && pair_name != target {
                    pair_upgrade = Some((found.entity, pair_stage, pair_entity.clone()));
                }
            }
            self.note_ambiguity(AmbiguityContext::UndergroundPair, found, stage, player);
        }

        let rename = rename_diff(target);
        self.content
            .apply_diff_at_stage(id, stage, &rename)
            .map_err(upgrade_refused)?;
        info!("Project: {:?} upgraded {} -> {} from stage {}", id, current, target, stage);
        let last = self.last_stage_of(id);
        self.refresh_range(id, stage, last);
        self.record_undo(
            player,
            UndoPayload::ReplaceStagedData {
                entity: id,
                data: Box::new(before),
            },
        );

        if let Some((pair_id, pair_stage, pair_before)) = pair_upgrade {
            self.content
                .apply_diff_at_stage(pair_id, pair_stage, &rename)
                .map_err(upgrade_refused)?;
            let pair_last = self.last_stage_of(pair_id);
            self.refresh_range(pair_id, pair_stage, pair_last);
            self.record_undo(
                player,
                UndoPayload::ReplaceStagedData {
                    entity: pair_id,
                    data: Box::new(pair_before),
                },
            );
        }
        Ok(true)
    }
}

use log::{info, warn};

use stageplan_shared::{
    ContentError, Direction, EntityId, EntityKind, PlayerId, StageIndex, WorldObjectRef, WorldSlot,
};

use super::ReconcileOutcome;
use crate::{
    error::RotationError,
    notification::{AmbiguityContext, NotificationKind},
    project::Project,
    undo::undo_log::UndoPayload,
    world_store::WorldStore,
};

fn rotation_conflict(err: ContentError) -> RotationError {
    match err {
        ContentError::Occupied { stage, other } => RotationError::Occupied { stage, other },
        other => panic!("Project: unexpected rotation failure: {}", other),
    }
}

impl<W: WorldStore> Project<W> {
    /// The world rotated `object` at `stage`. Only first-stage rotations are kept;
    /// anything else is reverted with a notification.
    pub fn on_object_rotated(
        &mut self,
        object: WorldObjectRef,
        stage: StageIndex,
        player: Option<PlayerId>,
    ) -> ReconcileOutcome {
        if self.world_updates_blocked() || !self.world.is_valid(object) {
            return ReconcileOutcome::Ignored;
        }
        let Some((id, WorldSlot::Live(_))) = self.tracked_owner(object, stage) else {
            return ReconcileOutcome::Ignored;
        };
        let Some(observed) = self.world.read_object(object) else {
            return ReconcileOutcome::Ignored;
        };

        self.batch(|project| {
            match project.rotate_entity(id, stage, observed.direction, observed.kind, player) {
                Ok(_) => ReconcileOutcome::Rotated(id),
                Err(err) => {
                    warn!("Project: rotation of {:?} at stage {} reverted: {}", id, stage, err);
                    project.notify(NotificationKind::RotationForbidden(err), id, stage, player);
                    project.refresh(id, stage, None);
                    ReconcileOutcome::RotationForbidden(id)
                }
            }
        })
    }

    /// Sets a new orientation on the entity and, for underground connectors, rotates
    /// the paired end with it. Returns `false` if nothing changed.
    pub(crate) fn rotate_entity(
        &mut self,
        id: EntityId,
        stage: StageIndex,
        direction: Direction,
        kind: EntityKind,
        player: Option<PlayerId>,
    ) -> Result<bool, RotationError> {
        let Some(entity) = self.content.entity(id) else {
            return Ok(false);
        };
        let (old_direction, old_kind) = (entity.direction(), entity.kind());
        if (old_direction, old_kind) == (direction, kind) {
            return Ok(false);
        }
        let first_stage = entity.first_stage();
        if stage != first_stage {
            return Err(RotationError::NotFirstStage { stage, first_stage });
        }

        // the pair is looked up with the old orientation
        let pair = if old_kind.is_underground() {
            self.content.find_underground_pair(id, stage)
        } else {
            None
        };
        if let Some(found) = pair {
            self.note_ambiguity(AmbiguityContext::UndergroundPair, found, stage, player);
            let pair_first = self
                .content
                .entity(found.entity)
                .map(|pair| pair.first_stage());
            if pair_first != Some(first_stage) {
                return Err(RotationError::PairInDifferentStage { pair: found.entity });
            }
        }

        self.content
            .set_orientation(id, direction, kind)
            .map_err(rotation_conflict)?;

        if let Some(found) = pair {
            let pair_id = found.entity;
            let Some(pair_entity) = self.content.entity(pair_id) else {
                return Ok(true);
            };
            let (pair_old_direction, pair_old_kind) = (pair_entity.direction(), pair_entity.kind());
            let (pair_direction, pair_kind) = pair_old_kind.rotated(pair_old_direction);
            if let Err(err) = self.content.set_orientation(pair_id, pair_direction, pair_kind) {
                let rolled_back = self.content.set_orientation(id, old_direction, old_kind);
                assert!(
                    rolled_back.is_ok(),
                    "Project: could not restore orientation of {:?}",
                    id
                );
                return Err(rotation_conflict(err));
            }
            self.resync_entity(pair_id);
            self.record_undo(
                player,
                UndoPayload::Rotate {
                    entity: pair_id,
                    direction: pair_old_direction,
                    kind: pair_old_kind,
                },
            );
        }

        info!(
            "Project: {:?} rotated {:?} -> {:?} ({:?})",
            id, old_direction, direction, kind
        );
        self.resync_entity(id);
        self.record_undo(
            player,
            UndoPayload::Rotate {
                entity: id,
                direction: old_direction,
                kind: old_kind,
            },
        );
        Ok(true)
    }
}

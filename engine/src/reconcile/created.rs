use log::{debug, info, warn};

use stageplan_shared::{
    AddOutcome, AttributeDiff, AttributeSet, EntityId, PlayerId, StageIndex, StagedEntity,
    WorldObjectRef, NAME_KEY,
};

use super::ReconcileOutcome;
use crate::{
    notification::{AmbiguityContext, NotificationKind},
    project::Project,
    undo::undo_log::UndoPayload,
    world_store::{ObjectSpec, WorldStore},
};

impl<W: WorldStore> Project<W> {
    /// The world built `object` at `stage`.
    ///
    /// A compatible entity at the spot is overbuilt (same or lower first stage) or moved
    /// down to `stage` (higher first stage). A settings remnant is revived. Otherwise a
    /// new entity starts at `stage`.
    pub fn on_object_created(
        &mut self,
        object: WorldObjectRef,
        stage: StageIndex,
        player: Option<PlayerId>,
    ) -> ReconcileOutcome {
        if self.world_updates_blocked() {
            return ReconcileOutcome::Ignored;
        }
        if stage < 1 || stage > self.content.stage_count() || !self.world.is_valid(object) {
            return ReconcileOutcome::Ignored;
        }
        if self.content.registry().owner_of(object).is_some() {
            return ReconcileOutcome::Ignored;
        }
        let Some(spec) = self.world.read_object(object) else {
            return ReconcileOutcome::Ignored;
        };
        let Some(name) = spec.name().map(str::to_string) else {
            return ReconcileOutcome::Ignored;
        };
        if !self.content.catalog().contains(&name) {
            debug!("Project: ignoring {} at {}, not a registered prototype", name, spec.position);
            return ReconcileOutcome::Ignored;
        }

        self.batch(|project| project.handle_created(object, stage, &name, spec, player))
    }

    fn handle_created(
        &mut self,
        object: WorldObjectRef,
        stage: StageIndex,
        name: &str,
        spec: ObjectSpec,
        player: Option<PlayerId>,
    ) -> ReconcileOutcome {
        let (value, unstaged) = self.observed_values(&spec);
        let found = if spec.kind.is_movable() {
            let radius = self.config.sync.movable_match_radius;
            self.content
                .find_near(name, spec.position, radius, stage)
                .filter(|found| {
                    self.content
                        .entity(found.entity)
                        .map_or(false, |entity| entity.first_stage() == stage)
                })
        } else {
            self.content
                .find_compatible(name, spec.position, spec.direction, &spec.kind, stage)
        };
        let Some(found) = found else {
            return self.create_entity(object, stage, value, unstaged, &spec, player);
        };
        self.note_ambiguity(AmbiguityContext::Compatible, found, stage, player);

        let id = found.entity;
        let Some(before) = self.content.entity(id).cloned() else {
            return ReconcileOutcome::Ignored;
        };

        if before.is_settings_remnant() {
            if let Err(err) = self.content.revive_settings_remnant(id, stage) {
                warn!("Project: could not revive {:?} at stage {}: {}", id, stage, err);
                return self.create_entity(object, stage, value, unstaged, &spec, player);
            }
            self.world_sync().adopt(id, stage, object);
            self.revive(id);
            self.record_undo(
                player,
                UndoPayload::ReplaceStagedData {
                    entity: id,
                    data: Box::new(before),
                },
            );
            return ReconcileOutcome::Revived(id);
        }

        if before.is_in_stage(stage) {
            return self.overbuild(id, object, stage, name, before, player);
        }

        if before.first_stage() > stage {
            return self.move_down(id, object, stage, (value, unstaged), player);
        }

        // the matched entity ended before this stage
        self.create_entity(object, stage, value, unstaged, &spec, player)
    }

    fn create_entity(
        &mut self,
        object: WorldObjectRef,
        stage: StageIndex,
        value: AttributeSet,
        unstaged: Option<AttributeSet>,
        spec: &ObjectSpec,
        player: Option<PlayerId>,
    ) -> ReconcileOutcome {
        let mut entity = StagedEntity::new(value, spec.position, spec.direction, spec.kind, stage);
        if unstaged.is_some() {
            entity.set_unstaged_value(stage, unstaged);
        }
        match self.content.add_entity(entity) {
            Ok(AddOutcome::Added(id)) => {
                self.world_sync().adopt(id, stage, object);
                self.add(id, None);
                self.record_undo(player, UndoPayload::DeleteEntity { entity: id });
                ReconcileOutcome::Created(id)
            }
            Ok(AddOutcome::RevivedRemnant(id)) => {
                self.world_sync().adopt(id, stage, object);
                self.revive(id);
                ReconcileOutcome::Revived(id)
            }
            Err(err) => {
                warn!(
                    "Project: object at {} in stage {} was not added: {}",
                    spec.position, stage, err
                );
                ReconcileOutcome::Ignored
            }
        }
    }

    fn overbuild(
        &mut self,
        id: EntityId,
        object: WorldObjectRef,
        stage: StageIndex,
        name: &str,
        before: StagedEntity,
        player: Option<PlayerId>,
    ) -> ReconcileOutcome {
        self.world_sync().adopt(id, stage, object);
        let last = self.last_stage_of(id);
        let current = before.name_at(stage);
        if current != name && self.content.catalog().are_compatible(current, name) {
            let mut rename = AttributeDiff::new();
            rename.set(NAME_KEY, name);
            match self.content.apply_diff_at_stage(id, stage, &rename) {
                Ok(_) => {
                    info!("Project: {:?} upgraded to {} by overbuilding at stage {}", id, name, stage);
                    self.refresh_range(id, stage, last);
                    self.record_undo(
                        player,
                        UndoPayload::ReplaceStagedData {
                            entity: id,
                            data: Box::new(before),
                        },
                    );
                    return ReconcileOutcome::Upgraded(id);
                }
                Err(err) => warn!("Project: overbuild upgrade of {:?} failed: {}", id, err),
            }
        }
        self.refresh(id, stage, None);
        ReconcileOutcome::Overbuilt(id)
    }

    fn move_down(
        &mut self,
        id: EntityId,
        object: WorldObjectRef,
        stage: StageIndex,
        (value, unstaged): (AttributeSet, Option<AttributeSet>),
        player: Option<PlayerId>,
    ) -> ReconcileOutcome {
        let Some(before) = self.content.entity(id).cloned() else {
            return ReconcileOutcome::Ignored;
        };
        match self.content.set_first_stage_with_value(id, stage, value) {
            Ok(previous) => {
                if unstaged.is_some() {
                    if let Err(err) = self.content.set_unstaged_value(id, stage, unstaged) {
                        warn!("Project: unstaged values of {:?} not kept: {}", id, err);
                    }
                }
                self.world_sync().adopt(id, stage, object);
                // previews below show the new first-stage value
                self.refresh_range(id, 1, previous);
                self.record_undo(
                    player,
                    UndoPayload::ReplaceStagedData {
                        entity: id,
                        data: Box::new(before),
                    },
                );
                ReconcileOutcome::MovedDown {
                    entity: id,
                    from: previous,
                }
            }
            Err(err) => {
                warn!("Project: move of {:?} down to stage {} rejected: {}", id, stage, err);
                if self.world.is_valid(object) {
                    self.world.destroy_object(object);
                }
                self.notify(NotificationKind::MoveRejected(err), id, stage, player);
                self.refresh(id, stage, None);
                ReconcileOutcome::MoveRejected(id)
            }
        }
    }
}

use std::collections::BTreeMap;

use log::{debug, warn};

use stageplan_shared::{
    EntityId, ProjectContent, StageIndex, StagedEntity, WorldObjectRef, WorldSlot,
};

use crate::{
    config::SyncConfig,
    notification::{Notification, NotificationKind},
    sync::sync_state::SyncMode,
    world_store::{ObjectSpec, WorldStore},
};

/// What one stage of an entity should look like, computed before touching the world.
enum Target {
    Present(ObjectSpec),
    Absent { preview: Option<ObjectSpec> },
}

/// Makes the world match the staged model, one (entity, stage) at a time.
pub struct WorldSync<'a, W: WorldStore> {
    content: &'a mut ProjectContent,
    world: &'a mut W,
    config: &'a SyncConfig,
    notifications: &'a mut Vec<Notification>,
}

impl<'a, W: WorldStore> WorldSync<'a, W> {
    pub fn new(
        content: &'a mut ProjectContent,
        world: &'a mut W,
        config: &'a SyncConfig,
        notifications: &'a mut Vec<Notification>,
    ) -> Self {
        Self {
            content,
            world,
            config,
            notifications,
        }
    }

    fn spec_for(entity: &StagedEntity, stage: StageIndex) -> Option<ObjectSpec> {
        let value = entity.value_at_stage(stage).ok()?;
        Some(ObjectSpec {
            position: entity.position(),
            direction: entity.direction(),
            kind: entity.kind(),
            value,
            unstaged: entity.unstaged_value(stage).cloned(),
        })
    }

    fn target(&self, entity: &StagedEntity, stage: StageIndex) -> Option<Target> {
        if entity.is_in_stage(stage) && !entity.is_settings_remnant() {
            return Self::spec_for(entity, stage).map(Target::Present);
        }
        let wants_preview = self.config.show_previews
            && (stage < entity.first_stage()
                || (entity.is_settings_remnant() && entity.is_in_stage(stage)));
        let preview = if wants_preview {
            Self::spec_for(entity, stage.max(entity.first_stage()))
        } else {
            None
        };
        Some(Target::Absent { preview })
    }

    /// Runs deduplicated requests in (entity, stage) order.
    pub fn flush(&mut self, pending: BTreeMap<(EntityId, StageIndex), SyncMode>) {
        let mut current = None;
        let mut add_failed = false;
        for ((id, stage), mode) in pending {
            if current != Some(id) {
                current = Some(id);
                add_failed = false;
            }
            self.sync_stage(id, stage, mode, &mut add_failed);
        }
    }

    pub fn sync_stage(
        &mut self,
        id: EntityId,
        stage: StageIndex,
        mode: SyncMode,
        add_failed: &mut bool,
    ) {
        if stage < 1 || stage > self.content.stage_count() {
            return;
        }
        let Some(target) = self
            .content
            .entity(id)
            .and_then(|entity| self.target(entity, stage))
        else {
            return;
        };
        let slot = self.content.registry().slot(id, stage);

        match target {
            Target::Absent { preview } => match (slot, preview) {
                (Some(WorldSlot::Preview(object)), Some(spec)) if self.world.is_valid(object) => {
                    self.world.update_object(object, &spec);
                }
                (slot, preview) => {
                    if slot.is_some() {
                        self.destroy_slot(id, stage);
                    }
                    if let Some(spec) = preview {
                        self.show_preview(id, stage, &spec);
                    }
                }
            },
            Target::Present(spec) => {
                match slot {
                    Some(WorldSlot::Live(object)) if self.world.is_valid(object) => {
                        if self.world.update_object(object, &spec) {
                            return;
                        }
                        debug!(
                            "WorldSync: {:?} at stage {} cannot be updated in place, rebuilding",
                            id, stage
                        );
                        self.destroy_slot(id, stage);
                    }
                    Some(WorldSlot::Errored { .. }) if mode < SyncMode::Retry => return,
                    Some(_) => self.destroy_slot(id, stage),
                    None => {}
                }
                self.place(id, stage, &spec, mode, add_failed);
            }
        }
    }

    fn place(
        &mut self,
        id: EntityId,
        stage: StageIndex,
        spec: &ObjectSpec,
        mode: SyncMode,
        add_failed: &mut bool,
    ) {
        if mode == SyncMode::Add && *add_failed {
            self.mark_errored(id, stage, spec, false);
            return;
        }
        if let Some(found) = self.find_untracked(stage, spec) {
            if self.world.update_object(found, spec) {
                debug!("WorldSync: {:?} adopted existing object at stage {}", id, stage);
                self.content
                    .registry_mut()
                    .set_slot(id, stage, WorldSlot::Live(found));
                return;
            }
        }
        match self.world.create_object(stage, spec) {
            Some(object) => {
                self.content
                    .registry_mut()
                    .set_slot(id, stage, WorldSlot::Live(object));
            }
            None => {
                if mode == SyncMode::Add {
                    *add_failed = true;
                }
                self.mark_errored(id, stage, spec, true);
            }
        }
    }

    /// An object of the same shape at the spot that no entity claims.
    fn find_untracked(&self, stage: StageIndex, spec: &ObjectSpec) -> Option<WorldObjectRef> {
        let shape = self
            .content
            .catalog()
            .signature(spec.name()?, spec.direction, &spec.kind)?;
        let found = self.world.find_object_at(stage, spec.position, &shape)?;
        if self.content.registry().owner_of(found).is_some() {
            return None;
        }
        Some(found)
    }

    fn mark_errored(&mut self, id: EntityId, stage: StageIndex, spec: &ObjectSpec, notify: bool) {
        let placeholder = self.world.create_preview(stage, spec);
        self.content
            .registry_mut()
            .set_slot(id, stage, WorldSlot::Errored { placeholder });
        if !notify {
            return;
        }
        warn!(
            "WorldSync: could not place {} at {} in stage {}",
            spec.name().unwrap_or("?"),
            spec.position,
            stage
        );
        if self.config.notify_placement_failures {
            self.notifications.push(Notification {
                kind: NotificationKind::PlacementFailed,
                entity: id,
                stage,
                position: spec.position,
                player: None,
            });
        }
    }

    fn show_preview(&mut self, id: EntityId, stage: StageIndex, spec: &ObjectSpec) {
        if let Some(object) = self.world.create_preview(stage, spec) {
            self.content
                .registry_mut()
                .set_slot(id, stage, WorldSlot::Preview(object));
        }
    }

    /// Takes ownership of a world object at `stage`, replacing whatever the slot held.
    pub fn adopt(&mut self, id: EntityId, stage: StageIndex, object: WorldObjectRef) {
        let previous = self
            .content
            .registry_mut()
            .set_slot(id, stage, WorldSlot::Live(object));
        if let Some(previous) = previous.and_then(|slot| slot.object()) {
            if previous != object && self.world.is_valid(previous) {
                self.world.destroy_object(previous);
            }
        }
    }

    pub fn destroy_slot(&mut self, id: EntityId, stage: StageIndex) {
        let cleared = self.content.registry_mut().clear_slot(id, stage);
        if let Some(object) = cleared.and_then(|slot| slot.object()) {
            if self.world.is_valid(object) {
                self.world.destroy_object(object);
            }
        }
    }

    /// Removes every world object of the entity. The staged entity stays.
    pub fn delete_all_presence(&mut self, id: EntityId) {
        let slots = self.content.registry_mut().remove_entity(id);
        for object in slots.values().filter_map(WorldSlot::object) {
            if self.world.is_valid(object) {
                self.world.destroy_object(object);
            }
        }
    }

    /// Tears the stage down, including untracked objects in the way, and builds it fresh.
    pub fn rebuild_stage(&mut self, id: EntityId, stage: StageIndex) {
        self.destroy_slot(id, stage);
        let spec = self
            .content
            .entity(id)
            .and_then(|entity| Self::spec_for(entity, stage));
        if let Some(spec) = spec {
            if let Some(leftover) = self.find_untracked(stage, &spec) {
                self.world.destroy_object(leftover);
            }
        }
        let mut add_failed = false;
        self.sync_stage(id, stage, SyncMode::Retry, &mut add_failed);
    }

    pub fn has_error_at(&self, id: EntityId, stage: StageIndex) -> bool {
        self.content
            .registry()
            .slot(id, stage)
            .map_or(false, |slot| slot.is_errored())
    }

    /// Retries every errored slot. Returns how many were cleared.
    pub fn cleanup_errors(&mut self) -> usize {
        let mut cleared = 0;
        for (id, stage) in self.content.registry().errored_slots() {
            self.destroy_slot(id, stage);
            let mut add_failed = false;
            self.sync_stage(id, stage, SyncMode::Retry, &mut add_failed);
            if !self.has_error_at(id, stage) {
                cleared += 1;
            }
        }
        cleared
    }
}

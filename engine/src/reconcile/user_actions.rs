use log::info;

use stageplan_shared::{
    ContentError, EntityId, PlayerId, StageIndex, StageMoveError, WorldObjectRef,
};

use crate::{project::Project, undo::undo_log::UndoPayload, world_store::WorldStore};

impl<W: WorldStore> Project<W> {
    /// Moves the entity's first stage. Returns the previous first stage.
    pub fn move_entity_to_stage(
        &mut self,
        id: EntityId,
        stage: StageIndex,
    ) -> Result<StageIndex, StageMoveError> {
        self.batch(|project| {
            let previous = project.content.set_first_stage(id, stage)?;
            project.refresh_range(id, previous.min(stage), previous.max(stage));
            Ok(previous)
        })
    }

    /// Like [`Project::move_entity_to_stage`], for the entity owning a world object.
    pub fn move_object_to_stage(
        &mut self,
        object: WorldObjectRef,
        stage: StageIndex,
    ) -> Result<StageIndex, StageMoveError> {
        let (id, _) = self
            .content
            .registry()
            .owner_of(object)
            .ok_or(StageMoveError::UntrackedObject)?;
        self.move_entity_to_stage(id, stage)
    }

    /// Sets or clears the last stage. Returns the previous one.
    pub fn set_entity_last_stage(
        &mut self,
        id: EntityId,
        stage: Option<StageIndex>,
    ) -> Result<Option<StageIndex>, StageMoveError> {
        self.batch(|project| {
            let previous = project.content.set_last_stage(id, stage)?;
            let stage_count = project.content.stage_count();
            let old_last = previous.unwrap_or(stage_count);
            let new_last = stage.unwrap_or(stage_count);
            project.refresh_range(id, old_last.min(new_last), old_last.max(new_last));
            Ok(previous)
        })
    }

    /// Deletes the entity and all of its world objects, whatever its history.
    pub fn force_delete(&mut self, id: EntityId, player: Option<PlayerId>) -> bool {
        self.delete_all_presence(id);
        let Some(removed) = self.content.delete_entity(id) else {
            return false;
        };
        self.record_undo(
            player,
            UndoPayload::RestoreEntity {
                removed: Box::new(removed),
            },
        );
        true
    }

    /// Drops a settings remnant for good. Returns `false` for live entities.
    pub fn cleanup_settings_remnant(&mut self, id: EntityId) -> bool {
        let is_remnant = self
            .content
            .entity(id)
            .map_or(false, |entity| entity.is_settings_remnant());
        if !is_remnant {
            return false;
        }
        self.delete_all_presence(id);
        self.content.delete_entity(id).is_some()
    }

    /// Drops every settings remnant. Returns how many were removed.
    pub fn cleanup_settings_remnants(&mut self) -> usize {
        let remnants: Vec<EntityId> = self
            .content
            .entities()
            .filter(|(_, entity)| entity.is_settings_remnant())
            .map(|(id, _)| id)
            .collect();
        let removed = remnants
            .into_iter()
            .filter(|id| self.cleanup_settings_remnant(*id))
            .count();
        info!("Project: removed {} settings remnant(s)", removed);
        removed
    }

    /// Brings a settings remnant back from `stage` on.
    pub fn revive_settings_remnant(
        &mut self,
        id: EntityId,
        stage: StageIndex,
        player: Option<PlayerId>,
    ) -> Result<(), ContentError> {
        let before = self
            .content
            .entity(id)
            .cloned()
            .ok_or(ContentError::EntityNotFound { entity: id })?;
        self.content.revive_settings_remnant(id, stage)?;
        self.revive(id);
        self.record_undo(
            player,
            UndoPayload::ReplaceStagedData {
                entity: id,
                data: Box::new(before),
            },
        );
        Ok(())
    }

    /// Removes the changes recorded at `stage`.
    pub fn reset_stage(&mut self, id: EntityId, stage: StageIndex) -> Result<bool, ContentError> {
        let changed = self.content.reset_stage(id, stage)?;
        if changed {
            let last = self.last_stage_of(id);
            self.refresh_range(id, stage, last);
        }
        Ok(changed)
    }

    /// Removes the change to one attribute recorded at `stage`.
    pub fn reset_prop(
        &mut self,
        id: EntityId,
        stage: StageIndex,
        key: &str,
    ) -> Result<bool, ContentError> {
        let changed = self.content.reset_prop(id, stage, key)?;
        if changed {
            let last = self.last_stage_of(id);
            self.refresh_range(id, stage, last);
        }
        Ok(changed)
    }

    /// Moves the changes at `stage` down to the previous stage with changes.
    /// Returns the stage they landed in.
    pub fn move_value_down(
        &mut self,
        id: EntityId,
        stage: StageIndex,
    ) -> Result<Option<StageIndex>, ContentError> {
        let target = self.content.move_value_down(id, stage)?;
        if let Some(target) = target {
            let last = self.last_stage_of(id);
            self.refresh_range(id, target, last);
        }
        Ok(target)
    }

    pub fn move_prop_down(
        &mut self,
        id: EntityId,
        stage: StageIndex,
        key: &str,
    ) -> Result<Option<StageIndex>, ContentError> {
        let target = self.content.move_prop_down(id, stage, key)?;
        if let Some(target) = target {
            let last = self.last_stage_of(id);
            self.refresh_range(id, target, last);
        }
        Ok(target)
    }
}

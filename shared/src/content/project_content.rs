use std::collections::BTreeMap;

use log::{debug, info};

use super::{
    error::ContentError,
    spatial_index::SpatialIndex,
    wires::{WireConnection, WireKind, WireSet},
    world_registry::WorldRegistry,
};
use crate::{
    diff::{AttributeDiff, DiffValue},
    value::{name_of, AttributeSet, AttributeValue, NAME_KEY},
    BeltIo, Catalog, Direction, DiscardOutcome, EntityId, EntityKind, Position, ShapeSignature,
    StageIndex, StageMoveError, StagedEntity, WorldSlot,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddOutcome {
    Added(EntityId),
    /// A settings remnant occupied the slot and was revived in place of the new entity.
    RevivedRemnant(EntityId),
}

impl AddOutcome {
    pub fn entity(&self) -> EntityId {
        match self {
            AddOutcome::Added(entity) | AddOutcome::RevivedRemnant(entity) => *entity,
        }
    }
}

/// Best compatible entity for a lookup. `ambiguous` is set when another candidate
/// ranked equally and the pick fell back to the deterministic order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompatibleMatch {
    pub entity: EntityId,
    pub ambiguous: bool,
}

/// An entity taken out of the store along with everything that referenced it.
#[derive(Clone, Debug)]
pub struct RemovedEntity {
    pub id: EntityId,
    pub entity: StagedEntity,
    pub slots: BTreeMap<StageIndex, WorldSlot>,
    pub wires: Vec<WireConnection>,
}

/// Result of a stage insert, discard or merge.
#[derive(Clone, Debug, Default)]
pub struct StageShiftReport {
    /// First stage whose world contents may no longer match for `affected` entities.
    pub stage: StageIndex,
    pub affected: Vec<EntityId>,
    pub removed: Vec<RemovedEntity>,
}

/// All staged entities of one project, with their spatial index, world slots and wires.
#[derive(Clone)]
pub struct ProjectContent {
    catalog: Catalog,
    stage_count: StageIndex,
    next_id: u64,
    entities: BTreeMap<EntityId, StagedEntity>,
    index: SpatialIndex,
    registry: WorldRegistry,
    wires: WireSet,
}

impl ProjectContent {
    pub fn new(catalog: Catalog, stage_count: StageIndex) -> Self {
        assert!(stage_count >= 1, "ProjectContent: a project has at least one stage");
        Self {
            catalog,
            stage_count,
            next_id: 1,
            entities: BTreeMap::new(),
            index: SpatialIndex::new(),
            registry: WorldRegistry::new(),
            wires: WireSet::default(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn stage_count(&self) -> StageIndex {
        self.stage_count
    }

    pub fn entity(&self, id: EntityId) -> Option<&StagedEntity> {
        self.entities.get(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &StagedEntity)> {
        self.entities.iter().map(|(id, entity)| (*id, entity))
    }

    pub fn entity_ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn registry(&self) -> &WorldRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut WorldRegistry {
        &mut self.registry
    }

    fn get(&self, id: EntityId) -> Result<&StagedEntity, ContentError> {
        self.entities
            .get(&id)
            .ok_or(ContentError::EntityNotFound { entity: id })
    }

    fn get_mut(&mut self, id: EntityId) -> Result<&mut StagedEntity, ContentError> {
        self.entities
            .get_mut(&id)
            .ok_or(ContentError::EntityNotFound { entity: id })
    }

    fn check_stage(&self, stage: StageIndex) -> Result<(), ContentError> {
        if stage >= 1 && stage <= self.stage_count {
            Ok(())
        } else {
            Err(ContentError::StageOutOfProject {
                stage,
                stage_count: self.stage_count,
            })
        }
    }

    fn signature_of(&self, entity: &StagedEntity) -> Option<ShapeSignature> {
        self.catalog
            .signature(entity.name(), entity.direction(), &entity.kind())
    }

    /// Entities sharing the exact shape of a `name` object at `position`.
    fn candidates(
        &self,
        name: &str,
        position: Position,
        direction: Direction,
        kind: &EntityKind,
    ) -> Vec<EntityId> {
        let Some(signature) = self.catalog.signature(name, direction, kind) else {
            return Vec::new();
        };
        self.index
            .get(position, signature.category)
            .iter()
            .copied()
            .filter(|id| {
                self.entities
                    .get(id)
                    .and_then(|entity| self.signature_of(entity))
                    == Some(signature)
            })
            .collect()
    }

    /// Live entity among `candidates` whose range overlaps `[first, last]`.
    fn live_conflict(
        &self,
        candidates: &[EntityId],
        except: Option<EntityId>,
        first: StageIndex,
        last: Option<StageIndex>,
    ) -> Option<(EntityId, StageIndex)> {
        candidates
            .iter()
            .filter(|id| Some(**id) != except)
            .filter_map(|id| self.entities.get(id).map(|entity| (*id, entity)))
            .find(|(_, entity)| !entity.is_settings_remnant() && entity.overlaps(first, last))
            .map(|(id, entity)| (id, first.max(entity.first_stage())))
    }

    fn conflict_for(
        &self,
        id: EntityId,
        direction: Direction,
        kind: EntityKind,
        first: StageIndex,
        last: Option<StageIndex>,
    ) -> Option<(EntityId, StageIndex)> {
        let entity = self.entities.get(&id)?;
        let candidates = self.candidates(entity.name(), entity.position(), direction, &kind);
        self.live_conflict(&candidates, Some(id), first, last)
    }

    // Lifecycle

    pub fn add_entity(&mut self, mut entity: StagedEntity) -> Result<AddOutcome, ContentError> {
        let name = entity.name().to_string();
        let info = self
            .catalog
            .get(&name)
            .ok_or_else(|| ContentError::UnknownPrototype { name: name.clone() })?;
        if info.persistent && !entity.is_persistent() {
            entity = entity.persistent();
        }
        self.check_stage(entity.first_stage())?;

        let candidates =
            self.candidates(&name, entity.position(), entity.direction(), &entity.kind());
        if let Some((other, stage)) =
            self.live_conflict(&candidates, None, entity.first_stage(), entity.last_stage())
        {
            return Err(ContentError::Occupied { stage, other });
        }

        let remnant = candidates.iter().copied().find(|id| {
            self.entities.get(id).map_or(false, |existing| {
                existing.is_settings_remnant()
                    && existing.overlaps(entity.first_stage(), entity.last_stage())
            })
        });
        if let Some(remnant) = remnant {
            self.revive_settings_remnant(remnant, entity.first_stage())?;
            let revived = self.get_mut(remnant)?;
            for (stage, value) in entity.unstaged_values() {
                if revived.unstaged_value(*stage).is_none() {
                    revived.set_unstaged_value(*stage, Some(value.clone()));
                }
            }
            return Ok(AddOutcome::RevivedRemnant(remnant));
        }

        let id = EntityId::from_u64(self.next_id);
        self.next_id += 1;
        if let Some(signature) = self.signature_of(&entity) {
            self.index.insert(entity.position(), signature.category, id);
        }
        info!(
            "ProjectContent: added {} {:?} at {} from stage {}",
            name,
            id,
            entity.position(),
            entity.first_stage()
        );
        self.entities.insert(id, entity);
        Ok(AddOutcome::Added(id))
    }

    /// Removes the entity unconditionally.
    pub fn delete_entity(&mut self, id: EntityId) -> Option<RemovedEntity> {
        let entity = self.entities.remove(&id)?;
        if let Some(signature) = self.signature_of(&entity) {
            self.index.remove(entity.position(), signature.category, id);
        }
        let slots = self.registry.remove_entity(id);
        let wires = self.wires.remove_entity(id);
        info!("ProjectContent: deleted {} {:?}", entity.name(), id);
        Some(RemovedEntity {
            id,
            entity,
            slots,
            wires,
        })
    }

    pub fn make_settings_remnant(&mut self, id: EntityId) -> Result<(), ContentError> {
        let entity = self.get_mut(id)?;
        if entity.is_settings_remnant() {
            return Err(ContentError::SettingsRemnant { entity: id });
        }
        entity.make_settings_remnant();
        info!("ProjectContent: {:?} is now a settings remnant", id);
        Ok(())
    }

    pub fn revive_settings_remnant(
        &mut self,
        id: EntityId,
        stage: StageIndex,
    ) -> Result<(), ContentError> {
        let entity = self.get(id)?;
        if !entity.is_settings_remnant() {
            return Err(ContentError::NotSettingsRemnant { entity: id });
        }
        self.check_stage(stage)?;
        let last = if entity.is_movable() {
            Some(stage)
        } else {
            entity.last_stage().map(|last| last.max(stage))
        };
        if let Some((other, conflict_stage)) =
            self.conflict_for(id, entity.direction(), entity.kind(), stage, last)
        {
            return Err(ContentError::Occupied {
                stage: conflict_stage,
                other,
            });
        }
        self.get_mut(id)?.revive(stage);
        info!("ProjectContent: revived settings remnant {:?} at stage {}", id, stage);
        Ok(())
    }

    /// Puts a previously removed entity back under a fresh id.
    pub fn restore_entity(&mut self, removed: RemovedEntity) -> Result<EntityId, ContentError> {
        let id = match self.add_entity(removed.entity)? {
            AddOutcome::Added(id) => id,
            AddOutcome::RevivedRemnant(id) => id,
        };
        for wire in removed.wires {
            if let Some(other) = wire.other(removed.id) {
                if self.entities.contains_key(&other) {
                    self.wires.insert(WireConnection::new(id, other, wire.kind()));
                }
            }
        }
        Ok(id)
    }

    /// Swaps in new staged data for an existing entity, returning the old data.
    pub fn replace_staged_data(
        &mut self,
        id: EntityId,
        entity: StagedEntity,
    ) -> Result<StagedEntity, ContentError> {
        let old = self.get(id)?.clone();
        let new_name = entity.name().to_string();
        if !self.catalog.are_compatible(old.name(), &new_name) {
            return Err(ContentError::IncompatibleUpgrade {
                from: old.name().to_string(),
                to: new_name,
            });
        }
        if let Some(signature) = self.signature_of(&old) {
            self.index.remove(old.position(), signature.category, id);
        }
        if let Some(signature) = self.signature_of(&entity) {
            self.index.insert(entity.position(), signature.category, id);
        }
        self.entities.insert(id, entity);
        Ok(old)
    }

    // Lookups

    /// Entity matching an object of `name` at `position`, ranked by stage distance to
    /// `stage_hint` then lowest first stage. Equal ranks pick live before remnant,
    /// then lowest id, and set `ambiguous`.
    pub fn find_compatible(
        &self,
        name: &str,
        position: Position,
        direction: Direction,
        kind: &EntityKind,
        stage_hint: StageIndex,
    ) -> Option<CompatibleMatch> {
        let candidates = self.candidates(name, position, direction, kind);
        let found = self.pick_best(candidates, stage_hint, |id, entity| {
            (entity.is_settings_remnant(), 0, id)
        });
        if let Some(found) = found {
            debug!(
                "ProjectContent: {} at {} matched {:?} (ambiguous: {})",
                name, position, found.entity, found.ambiguous
            );
        }
        found
    }

    /// Movable entities of the same category within `radius` tiles.
    pub fn find_near(
        &self,
        name: &str,
        position: Position,
        radius: u32,
        stage_hint: StageIndex,
    ) -> Option<CompatibleMatch> {
        let category = self.catalog.category_of(name)?;
        let candidates = self
            .index
            .within(position, category, radius)
            .into_iter()
            .filter(|id| self.entities.get(id).map_or(false, StagedEntity::is_movable))
            .collect();
        self.pick_best(candidates, stage_hint, |id, entity| {
            (
                entity.is_settings_remnant(),
                entity.position().chebyshev_distance(&position),
                id,
            )
        })
    }

    /// Partner of an underground connector: an opposite-io connector of the same category
    /// and direction along its axis, within the prototype's reach.
    pub fn find_underground_pair(
        &self,
        id: EntityId,
        stage_hint: StageIndex,
    ) -> Option<CompatibleMatch> {
        let entity = self.entities.get(&id)?;
        let EntityKind::Underground { io } = entity.kind() else {
            return None;
        };
        let info = self.catalog.get(entity.name())?;
        let max_distance = info.underground_max_distance()?;
        let direction = entity.direction();
        let search = match io {
            BeltIo::Input => direction,
            BeltIo::Output => direction.opposite(),
        };
        let wanted = EntityKind::Underground { io: io.flip() };

        let mut candidates = Vec::new();
        for distance in 1..=i32::from(max_distance) {
            let position = entity.position().offset(search, distance);
            for other in self.index.get(position, info.category) {
                let matches = self.entities.get(other).map_or(false, |other| {
                    other.kind() == wanted && other.direction() == direction
                });
                if matches {
                    candidates.push(*other);
                }
            }
        }
        let origin = entity.position();
        self.pick_best(candidates, stage_hint, |id, other| {
            (
                other.is_settings_remnant(),
                other.position().chebyshev_distance(&origin),
                id,
            )
        })
    }

    fn pick_best<K: Ord>(
        &self,
        candidates: Vec<EntityId>,
        stage_hint: StageIndex,
        order: impl Fn(EntityId, &StagedEntity) -> K,
    ) -> Option<CompatibleMatch> {
        let ranked: Vec<((StageIndex, StageIndex), EntityId, &StagedEntity)> = candidates
            .into_iter()
            .filter_map(|id| self.entities.get(&id).map(|entity| (id, entity)))
            .map(|(id, entity)| {
                (
                    (entity.stage_distance(stage_hint), entity.first_stage()),
                    id,
                    entity,
                )
            })
            .collect();
        let best_rank = ranked.iter().map(|(rank, _, _)| *rank).min()?;
        let tied: Vec<_> = ranked
            .into_iter()
            .filter(|(rank, _, _)| *rank == best_rank)
            .collect();
        let ambiguous = tied.len() > 1;
        let (_, entity, _) = tied
            .into_iter()
            .min_by_key(|(_, id, entity)| order(*id, *entity))?;
        Some(CompatibleMatch { entity, ambiguous })
    }

    // Stage bounds

    pub fn check_can_set_first_stage(
        &self,
        id: EntityId,
        stage: StageIndex,
    ) -> Result<(), StageMoveError> {
        let entity = self
            .entities
            .get(&id)
            .ok_or(StageMoveError::EntityNotFound { entity: id })?;
        if entity.is_settings_remnant() {
            return Err(StageMoveError::SettingsRemnant);
        }
        if stage < 1 || stage > self.stage_count {
            return Err(StageMoveError::StageOutOfProject {
                stage,
                stage_count: self.stage_count,
            });
        }
        let last = if entity.is_movable() {
            Some(stage)
        } else {
            match entity.last_stage() {
                Some(last) if stage > last => {
                    return Err(StageMoveError::PastLastStage {
                        stage,
                        last_stage: last,
                    })
                }
                last => last,
            }
        };
        if let Some((other, conflict_stage)) =
            self.conflict_for(id, entity.direction(), entity.kind(), stage, last)
        {
            return Err(StageMoveError::SpaceConflict {
                stage: conflict_stage,
                other,
            });
        }
        Ok(())
    }

    pub fn check_can_set_last_stage(
        &self,
        id: EntityId,
        stage: Option<StageIndex>,
    ) -> Result<(), StageMoveError> {
        let entity = self
            .entities
            .get(&id)
            .ok_or(StageMoveError::EntityNotFound { entity: id })?;
        if entity.is_settings_remnant() {
            return Err(StageMoveError::SettingsRemnant);
        }
        if entity.is_movable() {
            return Err(StageMoveError::Movable);
        }
        let Some(stage) = stage else {
            return match self.conflict_for(
                id,
                entity.direction(),
                entity.kind(),
                entity.first_stage(),
                None,
            ) {
                Some((other, conflict_stage)) => Err(StageMoveError::SpaceConflict {
                    stage: conflict_stage,
                    other,
                }),
                None => Ok(()),
            };
        };
        if entity.is_persistent() {
            return Err(StageMoveError::Persistent);
        }
        if stage < 1 || stage > self.stage_count {
            return Err(StageMoveError::StageOutOfProject {
                stage,
                stage_count: self.stage_count,
            });
        }
        if stage < entity.first_stage() {
            return Err(StageMoveError::BeforeFirstStage {
                stage,
                first_stage: entity.first_stage(),
            });
        }
        if let Some((other, conflict_stage)) = self.conflict_for(
            id,
            entity.direction(),
            entity.kind(),
            entity.first_stage(),
            Some(stage),
        ) {
            return Err(StageMoveError::SpaceConflict {
                stage: conflict_stage,
                other,
            });
        }
        Ok(())
    }

    /// Returns the previous first stage.
    pub fn set_first_stage(
        &mut self,
        id: EntityId,
        stage: StageIndex,
    ) -> Result<StageIndex, StageMoveError> {
        self.check_can_set_first_stage(id, stage)?;
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(StageMoveError::EntityNotFound { entity: id })?;
        let previous = entity.set_first_stage(stage);
        info!(
            "ProjectContent: {:?} first stage {} -> {}",
            id, previous, stage
        );
        Ok(previous)
    }

    /// Moves the first stage down to `stage`, where the world showed `value`.
    pub fn set_first_stage_with_value(
        &mut self,
        id: EntityId,
        stage: StageIndex,
        value: AttributeSet,
    ) -> Result<StageIndex, StageMoveError> {
        self.check_can_set_first_stage(id, stage)?;
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(StageMoveError::EntityNotFound { entity: id })?;
        if stage > entity.first_stage() {
            return Err(StageMoveError::PastLastStage {
                stage,
                last_stage: entity.first_stage(),
            });
        }
        let previous = entity.set_first_stage_with_value(stage, value);
        info!(
            "ProjectContent: {:?} moved down from stage {} to {} with a new base value",
            id, previous, stage
        );
        Ok(previous)
    }

    /// Returns the previous last stage.
    pub fn set_last_stage(
        &mut self,
        id: EntityId,
        stage: Option<StageIndex>,
    ) -> Result<Option<StageIndex>, StageMoveError> {
        self.check_can_set_last_stage(id, stage)?;
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(StageMoveError::EntityNotFound { entity: id })?;
        let previous = entity.last_stage();
        let trimmed = entity.set_last_stage(stage);
        info!(
            "ProjectContent: {:?} last stage {:?} -> {:?} ({} diff(s) trimmed)",
            id,
            previous,
            stage,
            trimmed.len()
        );
        Ok(previous)
    }

    // Values

    fn check_name_change(&self, id: EntityId, diff: &AttributeDiff) -> Result<(), ContentError> {
        let entity = self.get(id)?;
        match diff.get(NAME_KEY) {
            Some(DiffValue::Set(AttributeValue::String(new_name))) => {
                if self.catalog.are_compatible(entity.name(), new_name) {
                    Ok(())
                } else {
                    Err(ContentError::IncompatibleUpgrade {
                        from: entity.name().to_string(),
                        to: new_name.clone(),
                    })
                }
            }
            Some(_) => Err(ContentError::IncompatibleUpgrade {
                from: entity.name().to_string(),
                to: String::new(),
            }),
            None => Ok(()),
        }
    }

    pub fn apply_diff_at_stage(
        &mut self,
        id: EntityId,
        stage: StageIndex,
        diff: &AttributeDiff,
    ) -> Result<bool, ContentError> {
        self.check_name_change(id, diff)?;
        Ok(self.get_mut(id)?.apply_diff_at_stage(stage, diff)?)
    }

    pub fn set_value_at_stage(
        &mut self,
        id: EntityId,
        stage: StageIndex,
        value: &AttributeSet,
    ) -> Result<bool, ContentError> {
        let current = self.get(id)?.value_at_stage(stage)?;
        if name_of(value) != name_of(&current) {
            let mut rename = AttributeDiff::new();
            if let Some(name) = name_of(value) {
                rename.set(NAME_KEY, name);
            } else {
                rename.delete(NAME_KEY);
            }
            self.check_name_change(id, &rename)?;
        }
        Ok(self.get_mut(id)?.set_value_at_stage(stage, value)?)
    }

    pub fn set_unstaged_value(
        &mut self,
        id: EntityId,
        stage: StageIndex,
        value: Option<AttributeSet>,
    ) -> Result<bool, ContentError> {
        Ok(self.get_mut(id)?.set_unstaged_value(stage, value))
    }

    pub fn reset_stage(&mut self, id: EntityId, stage: StageIndex) -> Result<bool, ContentError> {
        Ok(self.get_mut(id)?.reset_stage(stage))
    }

    pub fn reset_prop(
        &mut self,
        id: EntityId,
        stage: StageIndex,
        key: &str,
    ) -> Result<bool, ContentError> {
        Ok(self.get_mut(id)?.reset_prop(stage, key))
    }

    pub fn move_value_down(
        &mut self,
        id: EntityId,
        stage: StageIndex,
    ) -> Result<Option<StageIndex>, ContentError> {
        Ok(self.get_mut(id)?.move_value_down(stage))
    }

    pub fn move_prop_down(
        &mut self,
        id: EntityId,
        stage: StageIndex,
        key: &str,
    ) -> Result<Option<StageIndex>, ContentError> {
        Ok(self.get_mut(id)?.move_prop_down(stage, key))
    }

    /// Changes direction and kind, rejecting orientations that collide with another entity.
    pub fn set_orientation(
        &mut self,
        id: EntityId,
        direction: Direction,
        kind: EntityKind,
    ) -> Result<(), ContentError> {
        let entity = self.get(id)?;
        if let Some((other, stage)) =
            self.conflict_for(id, direction, kind, entity.first_stage(), entity.last_stage())
        {
            return Err(ContentError::Occupied { stage, other });
        }
        self.get_mut(id)?.set_orientation(direction, kind);
        Ok(())
    }

    pub fn set_position(&mut self, id: EntityId, position: Position) -> Result<(), ContentError> {
        let entity = self.get(id)?;
        let old_position = entity.position();
        if old_position == position {
            return Ok(());
        }
        let candidates =
            self.candidates(entity.name(), position, entity.direction(), &entity.kind());
        if let Some((other, stage)) =
            self.live_conflict(&candidates, Some(id), entity.first_stage(), entity.last_stage())
        {
            return Err(ContentError::Occupied { stage, other });
        }
        let category = self.signature_of(entity).map(|signature| signature.category);
        if let Some(category) = category {
            self.index.remove(old_position, category, id);
            self.index.insert(position, category, id);
        }
        self.get_mut(id)?.set_position(position);
        Ok(())
    }

    // Wires

    pub fn add_wire(
        &mut self,
        a: EntityId,
        b: EntityId,
        kind: WireKind,
    ) -> Result<bool, ContentError> {
        self.get(a)?;
        self.get(b)?;
        Ok(self.wires.insert(WireConnection::new(a, b, kind)))
    }

    pub fn remove_wire(&mut self, connection: &WireConnection) -> bool {
        self.wires.remove(connection)
    }

    pub fn wires_of(&self, id: EntityId) -> Vec<WireConnection> {
        self.wires.of(id)
    }

    pub fn has_wires(&self, id: EntityId) -> bool {
        self.wires.has_any(id)
    }

    // Stage shifts

    pub fn insert_stage(&mut self, at: StageIndex) -> Result<StageShiftReport, ContentError> {
        if at < 1 || at > self.stage_count + 1 {
            return Err(ContentError::StageOutOfProject {
                stage: at,
                stage_count: self.stage_count,
            });
        }
        let mut entities = self.entities.clone();
        for entity in entities.values_mut() {
            entity.insert_stage(at);
        }
        let mut registry = self.registry.clone();
        registry.insert_stage(at);

        let affected = entities
            .iter()
            .filter(|(_, entity)| !entity.is_settings_remnant() && entity.is_in_stage(at))
            .map(|(id, _)| *id)
            .collect();
        self.entities = entities;
        self.registry = registry;
        self.stage_count += 1;
        info!(
            "ProjectContent: inserted stage {} ({} stages)",
            at, self.stage_count
        );
        Ok(StageShiftReport {
            stage: at,
            affected,
            removed: Vec::new(),
        })
    }

    /// Removes stage `at` and everything recorded in it. Entities created there are deleted.
    pub fn discard_stage(&mut self, at: StageIndex) -> Result<StageShiftReport, ContentError> {
        self.check_removable_stage(at)?;
        let mut shifted = self.clone();
        let mut deleted = Vec::new();
        let mut affected = Vec::new();
        for (id, entity) in shifted.entities.iter_mut() {
            let had_changes = entity.diff_at(at).is_some();
            match entity.discard_stage(at) {
                DiscardOutcome::Deleted => deleted.push(*id),
                DiscardOutcome::Kept => {
                    if had_changes && !entity.is_settings_remnant() {
                        affected.push(*id);
                    }
                }
            }
        }
        let removed = deleted
            .into_iter()
            .filter_map(|id| {
                let original = self.entities.get(&id)?.clone();
                let mut removed = shifted.delete_entity(id)?;
                removed.entity = original;
                Some(removed)
            })
            .collect();
        shifted.registry.remove_stage(at);
        shifted.stage_count -= 1;

        *self = shifted;
        info!(
            "ProjectContent: discarded stage {} ({} stages)",
            at, self.stage_count
        );
        Ok(StageShiftReport {
            stage: at,
            affected,
            removed,
        })
    }

    /// Removes stage `at`, folding its changes into the following stage (or the
    /// preceding one when `at` is the final stage).
    pub fn merge_stage(&mut self, at: StageIndex) -> Result<StageShiftReport, ContentError> {
        self.check_removable_stage(at)?;
        let merging_final = at == self.stage_count;
        let refresh_stage = if merging_final { at - 1 } else { at };
        let mut shifted = self.clone();
        let mut affected = Vec::new();
        for (id, entity) in shifted.entities.iter_mut() {
            let changes_previous =
                merging_final && (entity.diff_at(at).is_some() || entity.first_stage() == at);
            entity.merge_stage(at, self.stage_count);
            if !entity.is_settings_remnant() && changes_previous {
                affected.push(*id);
            }
        }
        shifted.registry.remove_stage(at);
        shifted.stage_count -= 1;
        if !merging_final {
            // entities now present in the merged stage without an object there
            for (id, entity) in shifted.entities.iter() {
                if !entity.is_settings_remnant()
                    && entity.is_in_stage(refresh_stage)
                    && shifted.registry.slot(*id, refresh_stage).is_none()
                {
                    affected.push(*id);
                }
            }
        }

        *self = shifted;
        info!(
            "ProjectContent: merged stage {} ({} stages)",
            at, self.stage_count
        );
        Ok(StageShiftReport {
            stage: refresh_stage,
            affected,
            removed: Vec::new(),
        })
    }

    fn check_removable_stage(&self, at: StageIndex) -> Result<(), ContentError> {
        if self.stage_count < 2 {
            return Err(ContentError::LastRemainingStage);
        }
        self.check_stage(at)
    }
}

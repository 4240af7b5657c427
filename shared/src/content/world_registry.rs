use std::collections::BTreeMap;

use super::checked_map::CheckedMap;
use crate::{EntityId, StageIndex, WorldObjectRef};

/// What the world holds for one entity at one stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorldSlot {
    /// A real object that should match the staged value.
    Live(WorldObjectRef),
    /// Non-functional stand-in shown where the entity is absent.
    Preview(WorldObjectRef),
    /// Placement was refused; a placeholder may stand in until cleanup succeeds.
    Errored { placeholder: Option<WorldObjectRef> },
}

impl WorldSlot {
    pub fn object(&self) -> Option<WorldObjectRef> {
        match self {
            WorldSlot::Live(object) | WorldSlot::Preview(object) => Some(*object),
            WorldSlot::Errored { placeholder } => *placeholder,
        }
    }

    pub fn live_object(&self) -> Option<WorldObjectRef> {
        match self {
            WorldSlot::Live(object) => Some(*object),
            _ => None,
        }
    }

    pub fn is_errored(&self) -> bool {
        matches!(self, WorldSlot::Errored { .. })
    }
}

/// Per-entity per-stage world slots, plus the reverse lookup from world objects.
#[derive(Clone, Default)]
pub struct WorldRegistry {
    slots: BTreeMap<EntityId, BTreeMap<StageIndex, WorldSlot>>,
    owners: CheckedMap<WorldObjectRef, (EntityId, StageIndex)>,
}

impl WorldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot(&self, entity: EntityId, stage: StageIndex) -> Option<WorldSlot> {
        self.slots.get(&entity)?.get(&stage).copied()
    }

    pub fn slots_of(&self, entity: EntityId) -> Option<&BTreeMap<StageIndex, WorldSlot>> {
        self.slots.get(&entity)
    }

    pub fn owner_of(&self, object: WorldObjectRef) -> Option<(EntityId, StageIndex)> {
        self.owners.get(&object).copied()
    }

    /// Replaces the slot, returning the previous one. Its object is unregistered.
    pub fn set_slot(
        &mut self,
        entity: EntityId,
        stage: StageIndex,
        slot: WorldSlot,
    ) -> Option<WorldSlot> {
        let previous = self.clear_slot(entity, stage);
        if let Some(object) = slot.object() {
            self.owners.insert(object, (entity, stage));
        }
        self.slots.entry(entity).or_default().insert(stage, slot);
        previous
    }

    pub fn clear_slot(&mut self, entity: EntityId, stage: StageIndex) -> Option<WorldSlot> {
        let entity_slots = self.slots.get_mut(&entity)?;
        let previous = entity_slots.remove(&stage)?;
        if entity_slots.is_empty() {
            self.slots.remove(&entity);
        }
        if let Some(object) = previous.object() {
            self.owners.remove(&object);
        }
        Some(previous)
    }

    pub fn remove_entity(&mut self, entity: EntityId) -> BTreeMap<StageIndex, WorldSlot> {
        let removed = self.slots.remove(&entity).unwrap_or_default();
        for slot in removed.values() {
            if let Some(object) = slot.object() {
                self.owners.remove(&object);
            }
        }
        removed
    }

    pub fn errored_slots(&self) -> Vec<(EntityId, StageIndex)> {
        self.slots
            .iter()
            .flat_map(|(entity, slots)| {
                slots
                    .iter()
                    .filter(|(_, slot)| slot.is_errored())
                    .map(move |(stage, _)| (*entity, *stage))
            })
            .collect()
    }

    /// Re-keys every slot after a stage was inserted at `at`.
    pub(crate) fn insert_stage(&mut self, at: StageIndex) {
        self.rekey(|stage| Some(if stage >= at { stage + 1 } else { stage }));
    }

    /// Forgets slots at `at` (the world surface is gone) and shifts later ones down.
    pub(crate) fn remove_stage(&mut self, at: StageIndex) {
        self.rekey(|stage| {
            if stage == at {
                None
            } else if stage > at {
                Some(stage - 1)
            } else {
                Some(stage)
            }
        });
    }

    fn rekey(&mut self, shift: impl Fn(StageIndex) -> Option<StageIndex>) {
        let slots = std::mem::take(&mut self.slots);
        self.owners.clear();
        for (entity, entity_slots) in slots {
            for (stage, slot) in entity_slots {
                if let Some(stage) = shift(stage) {
                    self.set_slot(entity, stage, slot);
                }
            }
        }
    }
}

use stageplan_shared::{AttributeSet, EntityId, StageIndex, WorldObjectRef, WorldSlot};

use crate::{
    project::Project,
    world_store::{ObjectSpec, WorldStore},
};

mod created;
mod deleted;
mod rotated;
mod updated;
mod upgrade;
mod user_actions;

/// What a world notification did to the project.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Nothing changed: updates were blocked, the object was stale or untracked,
    /// or it belongs to no registered prototype.
    Ignored,
    Created(EntityId),
    /// A settings remnant at the spot was brought back.
    Revived(EntityId),
    /// The object was built where the entity already exists; it was adopted.
    Overbuilt(EntityId),
    /// Like `Overbuilt`, but the object was a compatible upgrade and the name changed.
    Upgraded(EntityId),
    MovedDown {
        entity: EntityId,
        from: StageIndex,
    },
    MoveRejected(EntityId),
    Deleted(EntityId),
    MadeSettingsRemnant(EntityId),
    DeletionForbidden(EntityId),
    /// A preview or placeholder was removed from the world and has been put back.
    PreviewRestored(EntityId),
    Updated {
        entity: EntityId,
        changed: bool,
    },
    Rotated(EntityId),
    RotationForbidden(EntityId),
    UpgradeRejected(EntityId),
}

impl<W: WorldStore> Project<W> {
    /// The entity whose slot at `stage` holds `object`. Stale notifications yield `None`.
    pub(crate) fn tracked_owner(
        &self,
        object: WorldObjectRef,
        stage: StageIndex,
    ) -> Option<(EntityId, WorldSlot)> {
        let (id, owned_stage) = self.content.registry().owner_of(object)?;
        if owned_stage != stage {
            return None;
        }
        let slot = self.content.registry().slot(id, stage)?;
        Some((id, slot))
    }

    /// Staged and unstaged attributes of an object as the world reports it.
    pub(crate) fn observed_values(&self, spec: &ObjectSpec) -> (AttributeSet, Option<AttributeSet>) {
        let (value, split) = self.content.catalog().split_unstaged(spec.value.clone());
        (value, spec.unstaged.clone().or(split))
    }
}

use log::{info, warn};

use super::undo_log::{UndoPayload, UndoRecord};
use crate::{project::Project, world_store::WorldStore};

impl<W: WorldStore> Project<W> {
    /// Performs a record taken from the host's undo stack. `Some` is the inverse
    /// record to push for redo.
    pub fn undo(&mut self, record: UndoRecord) -> Option<UndoRecord> {
        info!("Project: undo {}", record.handler.name());
        self.replay(record)
    }

    /// Performs a record taken from the host's redo stack. `Some` is the inverse
    /// record to push back for undo.
    pub fn redo(&mut self, record: UndoRecord) -> Option<UndoRecord> {
        info!("Project: redo {}", record.handler.name());
        self.replay(record)
    }

    fn replay(&mut self, record: UndoRecord) -> Option<UndoRecord> {
        let UndoRecord { player, payload, .. } = record;
        let inverse = self.batch(|project| project.perform(payload))?;
        Some(UndoRecord {
            player,
            handler: inverse.handler(),
            payload: inverse,
        })
    }

    fn perform(&mut self, payload: UndoPayload) -> Option<UndoPayload> {
        match payload {
            UndoPayload::DeleteEntity { entity } => {
                if !self.content.contains(entity) {
                    return None;
                }
                self.delete_all_presence(entity);
                let removed = self.content.delete_entity(entity)?;
                Some(UndoPayload::RestoreEntity {
                    removed: Box::new(removed),
                })
            }
            UndoPayload::RestoreEntity { removed } => {
                match self.content.restore_entity(*removed) {
                    Ok(entity) => {
                        self.resync_entity(entity);
                        Some(UndoPayload::DeleteEntity { entity })
                    }
                    Err(err) => {
                        warn!("Project: entity could not be restored: {}", err);
                        None
                    }
                }
            }
            UndoPayload::ReplaceStagedData { entity, data } => {
                match self.content.replace_staged_data(entity, *data) {
                    Ok(old) => {
                        self.resync_entity(entity);
                        Some(UndoPayload::ReplaceStagedData {
                            entity,
                            data: Box::new(old),
                        })
                    }
                    Err(err) => {
                        warn!("Project: staged data of {:?} not restored: {}", entity, err);
                        None
                    }
                }
            }
            UndoPayload::Rotate {
                entity,
                direction,
                kind,
            } => {
                let current = self.content.entity(entity)?;
                let (old_direction, old_kind) = (current.direction(), current.kind());
                if let Err(err) = self.content.set_orientation(entity, direction, kind) {
                    warn!("Project: rotation of {:?} not restored: {}", entity, err);
                    return None;
                }
                self.resync_entity(entity);
                Some(UndoPayload::Rotate {
                    entity,
                    direction: old_direction,
                    kind: old_kind,
                })
            }
        }
    }
}

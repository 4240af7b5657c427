use std::collections::BTreeMap;

use stageplan_shared::{EntityId, StageIndex};

/// How a pending (entity, stage) sync is carried out. Later variants take precedence
/// when the same pair is requested twice in a batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum SyncMode {
    /// Correct or create the object; errored slots are left alone.
    Refresh,
    /// Like `Refresh`, but the first refused placement marks the rest of the entity's
    /// pending `Add` stages as errored without trying them.
    Add,
    /// Retry errored slots.
    Retry,
}

/// Batch depth, pending sync requests and the bulk-task guard.
#[derive(Default)]
pub struct SyncState {
    depth: u32,
    pending: BTreeMap<(EntityId, StageIndex), SyncMode>,
    updates_blocked: bool,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_batch(&mut self) {
        self.depth += 1;
    }

    /// Returns `true` when the outermost batch just ended and pending requests should flush.
    pub fn end_batch(&mut self) -> bool {
        if self.depth == 0 {
            panic!("SyncState: end_batch called without a matching begin_batch");
        }
        self.depth -= 1;
        self.depth == 0
    }

    pub fn in_batch(&self) -> bool {
        self.depth > 0
    }

    pub fn request(&mut self, entity: EntityId, stage: StageIndex, mode: SyncMode) {
        let entry = self.pending.entry((entity, stage)).or_insert(mode);
        if mode > *entry {
            *entry = mode;
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn take_pending(&mut self) -> BTreeMap<(EntityId, StageIndex), SyncMode> {
        std::mem::take(&mut self.pending)
    }

    pub fn updates_blocked(&self) -> bool {
        self.updates_blocked
    }

    pub fn set_updates_blocked(&mut self, blocked: bool) {
        self.updates_blocked = blocked;
    }
}

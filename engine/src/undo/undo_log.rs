use stageplan_shared::{Direction, EntityId, EntityKind, PlayerId, RemovedEntity, StagedEntity};

/// Identifies which inverse action a record performs. Names are stable across sessions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UndoHandler {
    DeleteEntity,
    RestoreEntity,
    RestoreStagedData,
    RotateEntity,
}

impl UndoHandler {
    pub const ALL: [UndoHandler; 4] = [
        UndoHandler::DeleteEntity,
        UndoHandler::RestoreEntity,
        UndoHandler::RestoreStagedData,
        UndoHandler::RotateEntity,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            UndoHandler::DeleteEntity => "delete-entity",
            UndoHandler::RestoreEntity => "restore-entity",
            UndoHandler::RestoreStagedData => "restore-staged-data",
            UndoHandler::RotateEntity => "rotate-entity",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|handler| handler.name() == name)
    }
}

/// The action to perform when the record is replayed.
#[derive(Clone, Debug)]
pub enum UndoPayload {
    DeleteEntity {
        entity: EntityId,
    },
    RestoreEntity {
        removed: Box<RemovedEntity>,
    },
    ReplaceStagedData {
        entity: EntityId,
        data: Box<StagedEntity>,
    },
    Rotate {
        entity: EntityId,
        direction: Direction,
        kind: EntityKind,
    },
}

impl UndoPayload {
    pub fn handler(&self) -> UndoHandler {
        match self {
            UndoPayload::DeleteEntity { .. } => UndoHandler::DeleteEntity,
            UndoPayload::RestoreEntity { .. } => UndoHandler::RestoreEntity,
            UndoPayload::ReplaceStagedData { .. } => UndoHandler::RestoreStagedData,
            UndoPayload::Rotate { .. } => UndoHandler::RotateEntity,
        }
    }
}

#[derive(Clone, Debug)]
pub struct UndoRecord {
    pub player: PlayerId,
    pub handler: UndoHandler,
    pub payload: UndoPayload,
}

/// Player-attributed actions waiting to be pushed onto the host's undo stack.
#[derive(Default)]
pub struct UndoLog {
    records: Vec<UndoRecord>,
}

impl UndoLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// # Panics
    ///
    /// Panics if `payload` does not belong to `handler`.
    pub fn record(&mut self, player: PlayerId, handler: UndoHandler, payload: UndoPayload) {
        assert_eq!(
            payload.handler(),
            handler,
            "UndoLog: payload does not belong to handler {}",
            handler.name()
        );
        self.records.push(UndoRecord {
            player,
            handler,
            payload,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn take_records(&mut self) -> Vec<UndoRecord> {
        std::mem::take(&mut self.records)
    }
}

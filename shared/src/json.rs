//! JSON text for [`EntityRecord`]s, the format used for blueprint-style transfer.

use crate::{EntityRecord, SerializationError, StagedEntity};

impl From<serde_json::Error> for SerializationError {
    fn from(error: serde_json::Error) -> Self {
        SerializationError::Malformed {
            message: error.to_string(),
        }
    }
}

pub fn entity_to_json(entity: &StagedEntity) -> Result<String, SerializationError> {
    let record = EntityRecord::from_entity(entity)?;
    Ok(serde_json::to_string(&record)?)
}

pub fn entity_from_json(text: &str) -> Result<StagedEntity, SerializationError> {
    let record: EntityRecord = serde_json::from_str(text)?;
    record.into_entity()
}

pub fn entities_to_json<'a>(
    entities: impl IntoIterator<Item = &'a StagedEntity>,
) -> Result<String, SerializationError> {
    let records = entities
        .into_iter()
        .map(EntityRecord::from_entity)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(serde_json::to_string(&records)?)
}

pub fn entities_from_json(text: &str) -> Result<Vec<StagedEntity>, SerializationError> {
    let records: Vec<EntityRecord> = serde_json::from_str(text)?;
    records.into_iter().map(EntityRecord::into_entity).collect()
}

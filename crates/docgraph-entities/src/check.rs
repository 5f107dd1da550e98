//! Request payload validation.

use std::collections::HashSet;

use docgraph_store::{Entity, EntityId, ID_FIELD};
use serde_json::{Map, Value};

use crate::error::{EntityError, EntityResult};

/// The body must be present and a JSON object.
pub fn payload(data: Value) -> EntityResult<Map<String, Value>> {
    match data {
        Value::Null => Err(EntityError::bad_request("Request body cannot be empty.")),
        Value::Object(map) => Ok(map),
        _ => Err(EntityError::bad_request("Document must be a JSON object.")),
    }
}

/// The document must carry a string or numeric id.
pub fn id(document: &Map<String, Value>) -> EntityResult<EntityId> {
    let raw = document
        .get(ID_FIELD)
        .ok_or_else(|| EntityError::bad_request("Document needs to contain the 'id' attribute."))?;
    EntityId::from_value(raw)
        .ok_or_else(|| EntityError::bad_request("Document id must be a string or a number."))
}

/// The body must be a JSON array.
pub fn array(data: Value) -> EntityResult<Vec<Value>> {
    match data {
        Value::Array(items) => Ok(items),
        _ => Err(EntityError::bad_request("Request must contain an array.")),
    }
}

/// A complete document with a valid id.
pub fn document(data: Value) -> EntityResult<Entity> {
    let map = payload(data)?;
    id(&map)?;
    Ok(Entity::from_map(map)?)
}

/// No two documents may share an id.
pub fn unique_ids(entities: &[Entity]) -> EntityResult<()> {
    let mut seen = HashSet::new();
    for entity in entities {
        if !seen.insert(entity.id()) {
            return Err(EntityError::bad_request(format!("Duplicate document id: {}", entity.id())));
        }
    }
    Ok(())
}

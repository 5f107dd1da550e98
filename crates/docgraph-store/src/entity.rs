//! Typed entities and the structural link inference done at the store boundary.
//!
//! Raw documents are duck-typed JSON. This is the only place that looks at a
//! field's shape to decide whether it can act as a reference; everything
//! downstream works with [`EntityId`] and [`LinkShape`].

use std::fmt;

use serde_json::{Map, Value};

use crate::{StoreError, StoreResult};

/// Name of the mandatory identity field.
pub const ID_FIELD: &str = "id";

/// Fields starting with this prefix are store bookkeeping and never leave the store.
pub const INTERNAL_FIELD_PREFIX: char = '_';

/// Returns true if the field is store-internal bookkeeping.
pub fn is_internal_field(name: &str) -> bool {
    name.starts_with(INTERNAL_FIELD_PREFIX)
}

/// Canonical string form of a scalar value.
///
/// Strings map to themselves and numbers to their JSON rendering. Every id
/// comparison in the engine goes through this form.
pub fn scalar_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Canonical (string) identifier of an entity within its collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(String);

impl EntityId {
    /// Wraps an already-canonical id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Canonicalizes a JSON scalar into an id. Only strings and numbers qualify.
    pub fn from_value(value: &Value) -> Option<Self> {
        scalar_key(value).map(Self)
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// JSON representation of the id.
    pub fn to_value(&self) -> Value {
        Value::String(self.0.clone())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// How a field named after a target collection links to that collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkShape {
    /// No field with the target's name.
    Absent,
    /// A scalar id.
    Single(EntityId),
    /// An array of scalar ids.
    Many(Vec<EntityId>),
    /// A field exists but cannot be read as a reference.
    Invalid,
}

/// One document of a collection, with a canonical string `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    id: EntityId,
    fields: Map<String, Value>,
}

impl Entity {
    /// Validates a client-supplied document.
    ///
    /// The document must be an object with an `id` that is a string or a
    /// number. The id is rewritten to its string form in place.
    pub fn from_value(value: Value) -> StoreResult<Self> {
        match value {
            Value::Object(map) => Self::from_map(map),
            other => Err(StoreError::InvalidDocument(format!(
                "document must be an object, got {}",
                json_type(&other)
            ))),
        }
    }

    /// Validates a document given as a field map.
    pub fn from_map(mut fields: Map<String, Value>) -> StoreResult<Self> {
        let raw_id = fields.get(ID_FIELD).ok_or_else(|| {
            StoreError::InvalidDocument("Document needs to contain the 'id' attribute.".to_string())
        })?;
        let id = EntityId::from_value(raw_id).ok_or_else(|| {
            StoreError::InvalidDocument(format!(
                "document id must be a string or number, got {}",
                json_type(raw_id)
            ))
        })?;
        fields.insert(ID_FIELD.to_string(), id.to_value());
        Ok(Self { id, fields })
    }

    /// Loads a document as persisted by a store, dropping bookkeeping fields.
    pub fn from_stored(mut fields: Map<String, Value>) -> StoreResult<Self> {
        fields.retain(|name, _| !is_internal_field(name));
        Self::from_map(fields)
    }

    /// The canonical id.
    pub fn id(&self) -> &EntityId {
        &self.id
    }

    /// Value of a field, if present.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// All fields, `id` included, in document order.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Infers the link shape of the field named `target`.
    pub fn link(&self, target: &str) -> LinkShape {
        match self.fields.get(target) {
            None => LinkShape::Absent,
            Some(Value::Array(items)) => items
                .iter()
                .map(EntityId::from_value)
                .collect::<Option<Vec<_>>>()
                .map_or(LinkShape::Invalid, LinkShape::Many),
            Some(value) => {
                EntityId::from_value(value).map_or(LinkShape::Invalid, LinkShape::Single)
            }
        }
    }

    /// JSON object form of the entity.
    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    /// Consumes the entity into its JSON object form.
    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    /// Consumes the entity into its field map.
    pub fn into_map(self) -> Map<String, Value> {
        self.fields
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

//! `orderBy` parsing and the multi-key comparator.

use std::cmp::Ordering;
use std::sync::Arc;

use docgraph_store::Entity;
use serde_json::Value;

use crate::{QueryError, QueryResult};

/// One sort key. A leading `-` in the request means descending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

impl SortKey {
    fn parse(raw: &str) -> QueryResult<Self> {
        let raw = raw.trim();
        let (field, descending) = match raw.strip_prefix('-') {
            Some(rest) => (rest, true),
            None => (raw, false),
        };
        if field.is_empty() {
            return Err(QueryError::bad_selector(raw, "empty orderBy field"));
        }
        Ok(Self {
            field: field.to_string(),
            descending,
        })
    }
}

/// Ordered list of sort keys. The first key that differs decides.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrderBy(Vec<SortKey>);

impl OrderBy {
    /// Parses a string or an array of strings.
    pub fn from_value(value: &Value) -> QueryResult<Self> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::String(raw) => Ok(Self(vec![SortKey::parse(raw)?])),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(raw) => SortKey::parse(raw),
                    other => Err(QueryError::bad_selector(
                        other.to_string(),
                        "orderBy entries must be strings",
                    )),
                })
                .collect::<QueryResult<Vec<_>>>()
                .map(Self),
            other => Err(QueryError::bad_selector(
                other.to_string(),
                "orderBy must be a string or a list of strings",
            )),
        }
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Names of the fields the comparator reads.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|key| key.field.as_str())
    }

    pub fn compare(&self, a: &Entity, b: &Entity) -> Ordering {
        for key in &self.0 {
            let ordering = compare_values(a.get(&key.field), b.get(&key.field));
            let ordering = if key.descending {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// Stable sort; entities equal on every key keep their storage order.
    pub fn sort(&self, entities: &mut [Arc<Entity>]) {
        if self.0.is_empty() {
            return;
        }
        entities.sort_by(|a, b| self.compare(a, b));
    }
}

/// Type rank: absent and null first, then numbers, strings, objects, arrays, booleans.
fn rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        // Bytewise: uppercase sorts before lowercase.
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x @ Value::Object(_)), Some(y @ Value::Object(_)))
        | (Some(x @ Value::Array(_)), Some(y @ Value::Array(_))) => {
            x.to_string().cmp(&y.to_string())
        }
        _ => rank(a).cmp(&rank(b)),
    }
}

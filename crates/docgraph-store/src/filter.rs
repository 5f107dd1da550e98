//! Equality, membership and glob filters evaluated against entities.

use serde_json::Value;

use crate::entity::{scalar_key, Entity};
use crate::glob::GlobPattern;

/// Test applied to one field's value.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// The field equals the value.
    Eq(Value),
    /// The field equals any of the values.
    In(Vec<Value>),
    /// The field's string form fully matches the pattern.
    Glob(GlobPattern),
}

impl Predicate {
    /// Evaluates the predicate against a field value. An absent field is `null`.
    ///
    /// When the field holds an array and the predicate does not compare
    /// against an array, the predicate matches if any element matches.
    pub fn matches(&self, value: Option<&Value>) -> bool {
        let value = value.unwrap_or(&Value::Null);
        if self.matches_value(value) {
            return true;
        }
        match value {
            Value::Array(items) if !self.targets_array() => {
                items.iter().any(|item| self.matches_value(item))
            }
            _ => false,
        }
    }

    fn matches_value(&self, value: &Value) -> bool {
        match self {
            Self::Eq(expected) => values_equal(expected, value),
            Self::In(candidates) => candidates.iter().any(|c| values_equal(c, value)),
            Self::Glob(pattern) => scalar_key(value).is_some_and(|s| pattern.is_match(&s)),
        }
    }

    fn targets_array(&self) -> bool {
        matches!(self, Self::Eq(Value::Array(_)))
    }
}

/// Scalars compare by canonical string form so `1` and `"1"` are equal.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (scalar_key(a), scalar_key(b)) {
        (Some(a), Some(b)) => a == b,
        _ => a == b,
    }
}

/// One field test.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub predicate: Predicate,
}

/// A conjunction of conditions. The empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    /// The filter that matches every entity.
    pub fn all() -> Self {
        Self::default()
    }

    /// Adds an equality condition.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(field, Predicate::Eq(value.into()));
        self
    }

    /// Adds a membership condition.
    pub fn is_in<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.push(field, Predicate::In(values.into_iter().map(Into::into).collect()));
        self
    }

    /// Adds a glob condition.
    pub fn glob(mut self, field: impl Into<String>, pattern: GlobPattern) -> Self {
        self.push(field, Predicate::Glob(pattern));
        self
    }

    /// Appends a condition in place.
    pub fn push(&mut self, field: impl Into<String>, predicate: Predicate) {
        self.conditions.push(Condition {
            field: field.into(),
            predicate,
        });
    }

    /// Conditions in insertion order.
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Removes and returns every condition on `field`.
    pub fn take_field(&mut self, field: &str) -> Vec<Predicate> {
        let (taken, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.conditions)
            .into_iter()
            .partition(|c| c.field == field);
        self.conditions = kept;
        taken.into_iter().map(|c| c.predicate).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Whether the entity satisfies every condition.
    pub fn matches(&self, entity: &Entity) -> bool {
        self.conditions
            .iter()
            .all(|c| c.predicate.matches(entity.get(&c.field)))
    }
}

//! Store-side field projection.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::entity::ID_FIELD;

/// Which fields a store call must return.
///
/// `id` is always kept: the resolver needs it to key its caches even when
/// the caller did not select it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Projection {
    #[default]
    All,
    Fields(BTreeSet<String>),
}

impl Projection {
    /// Projection limited to the given fields (plus `id`).
    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Fields(fields.into_iter().map(Into::into).collect())
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Whether the projection keeps `field`.
    pub fn includes(&self, field: &str) -> bool {
        match self {
            Self::All => true,
            Self::Fields(fields) => field == ID_FIELD || fields.contains(field),
        }
    }

    /// Drops every field the projection excludes.
    pub fn apply(&self, fields: &Map<String, Value>) -> Map<String, Value> {
        fields
            .iter()
            .filter(|(name, _)| self.includes(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

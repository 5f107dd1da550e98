//! Per-caller permission context.

use std::collections::HashMap;

use docgraph_store::EntityId;
use serde_json::Value;

use crate::{QueryError, QueryResult};

/// Access granted on one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
    /// Every document.
    All,
    /// Only the listed ids, in the order they were granted.
    Ids(Vec<EntityId>),
}

/// Read-only capability passed down to every plan node of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    /// Internal callers. Nothing is restricted.
    Unrestricted,
    /// A caller's permission map.
    Scoped {
        admin: bool,
        grants: HashMap<String, Grant>,
    },
}

impl Permission {
    /// Scoped context with no grants at all.
    pub fn scoped() -> Self {
        Self::Scoped {
            admin: false,
            grants: HashMap::new(),
        }
    }

    /// Scoped context of a global admin.
    pub fn admin() -> Self {
        Self::Scoped {
            admin: true,
            grants: HashMap::new(),
        }
    }

    /// Grants access to a whole collection.
    pub fn grant_all(self, collection: impl Into<String>) -> Self {
        self.with_grant(collection.into(), Grant::All)
    }

    /// Grants access to specific ids of a collection.
    pub fn grant_ids<I, S>(self, collection: impl Into<String>, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<EntityId>,
    {
        self.with_grant(
            collection.into(),
            Grant::Ids(ids.into_iter().map(Into::into).collect()),
        )
    }

    fn with_grant(self, collection: String, grant: Grant) -> Self {
        match self {
            Self::Unrestricted => Self::Unrestricted,
            Self::Scoped { admin, mut grants } => {
                grants.insert(collection, grant);
                Self::Scoped { admin, grants }
            }
        }
    }

    /// Builds a context from a session's permission value.
    ///
    /// `"*"` is a global admin, an object maps collections to `"*"` or an
    /// id list. A missing or unreadable value fails with `Forbidden`.
    pub fn from_grants(value: Option<&Value>) -> QueryResult<Self> {
        match value {
            Some(Value::String(s)) if s == "*" => Ok(Self::admin()),
            Some(Value::Object(map)) => {
                let grants = map
                    .iter()
                    .filter_map(|(collection, grant)| {
                        let grant = match grant {
                            Value::String(s) if s == "*" => Grant::All,
                            Value::Array(ids) => {
                                Grant::Ids(ids.iter().filter_map(EntityId::from_value).collect())
                            }
                            _ => return None,
                        };
                        Some((collection.clone(), grant))
                    })
                    .collect();
                Ok(Self::Scoped {
                    admin: false,
                    grants,
                })
            }
            _ => Err(QueryError::forbidden("*", "*")),
        }
    }

    /// Whether the caller may see document `id` of `collection`.
    pub fn check(&self, collection: &str, id: &EntityId) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::Scoped { admin: true, .. } => true,
            Self::Scoped { grants, .. } => match grants.get(collection) {
                Some(Grant::All) => true,
                Some(Grant::Ids(ids)) => ids.contains(id),
                None => false,
            },
        }
    }

    /// Whether collection reads must be narrowed to [`Permission::whitelist`].
    pub fn restricts(&self, collection: &str) -> bool {
        match self {
            Self::Unrestricted => false,
            Self::Scoped { admin, grants } => {
                !admin && !matches!(grants.get(collection), Some(Grant::All))
            }
        }
    }

    /// Ids the caller may see in a restricted collection.
    pub fn whitelist(&self, collection: &str) -> &[EntityId] {
        match self {
            Self::Scoped { grants, .. } => match grants.get(collection) {
                Some(Grant::Ids(ids)) => ids.as_slice(),
                _ => &[],
            },
            Self::Unrestricted => &[],
        }
    }
}

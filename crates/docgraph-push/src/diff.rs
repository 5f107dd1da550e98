//! Exact change detection between two versions of a document or collection.
//!
//! A field counts as a link when its name is a known collection and one of
//! its versions has link shape (a scalar id or an array of scalar ids).
//! Plain fields are compared for the keys of the new version only, so a
//! field that disappears is not reported. Links are compared over the union
//! of both versions, so added and removed links both show up.

use std::collections::{BTreeSet, HashMap};

use docgraph_store::{is_internal_field, scalar_key, Entity, EntityId, ID_FIELD};
use serde_json::{Map, Value};

/// Changed names of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectDiff {
    /// Plain fields, in the order of the new version.
    pub fields: Vec<String>,
    /// Link fields, sorted.
    pub links: Vec<String>,
}

impl ObjectDiff {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.links.is_empty()
    }

    /// Notification names: plain fields, then links as `@name`.
    pub fn changed_names(&self) -> Vec<String> {
        self.fields
            .iter()
            .cloned()
            .chain(self.links.iter().map(|link| format!("@{link}")))
            .collect()
    }
}

/// One changed member of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatedEntity {
    pub id: EntityId,
    pub diff: ObjectDiff,
}

/// Difference between two versions of a collection, keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionDiff {
    /// Ids only in the new version, in new order.
    pub created: Vec<EntityId>,
    /// Ids in both versions with a non-empty diff, in new order.
    pub updated: Vec<UpdatedEntity>,
    /// Ids only in the old version, in old order.
    pub deleted: Vec<EntityId>,
}

impl CollectionDiff {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    /// Number of notifications this diff produces.
    pub fn len(&self) -> usize {
        self.created.len() + self.updated.len() + self.deleted.len()
    }
}

fn has_link_shape(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.iter().all(|item| scalar_key(item).is_some()),
        other => scalar_key(other).is_some(),
    }
}

fn is_link(
    name: &str,
    old: Option<&Value>,
    new: Option<&Value>,
    link_names: &BTreeSet<String>,
) -> bool {
    link_names.contains(name)
        && (old.is_some_and(has_link_shape) || new.is_some_and(has_link_shape))
}

/// Reports what changed from `old` to `new`.
///
/// `link_names` are the collections known to the store.
pub fn object_diff(
    old: &Map<String, Value>,
    new: &Map<String, Value>,
    link_names: &BTreeSet<String>,
) -> ObjectDiff {
    let mut diff = ObjectDiff::default();
    let mut links = BTreeSet::new();

    for (name, value) in new {
        if is_internal_field(name) {
            continue;
        }
        let before = old.get(name);
        if is_link(name, before, Some(value), link_names) {
            if before != Some(value) {
                links.insert(name.clone());
            }
        } else if before != Some(value) {
            diff.fields.push(name.clone());
        }
    }

    for (name, value) in old {
        if new.contains_key(name) || is_internal_field(name) {
            continue;
        }
        if is_link(name, Some(value), None, link_names) {
            links.insert(name.clone());
        }
    }

    diff.links = links.into_iter().collect();
    diff
}

/// Diffs two versions of a collection.
pub fn collection_diff(
    old: &[Entity],
    new: &[Entity],
    link_names: &BTreeSet<String>,
) -> CollectionDiff {
    let previous: HashMap<&EntityId, &Entity> =
        old.iter().map(|entity| (entity.id(), entity)).collect();
    let mut diff = CollectionDiff::default();

    for entity in new {
        match previous.get(entity.id()) {
            Some(before) => {
                let changes = object_diff(before.fields(), entity.fields(), link_names);
                if !changes.is_empty() {
                    diff.updated.push(UpdatedEntity {
                        id: entity.id().clone(),
                        diff: changes,
                    });
                }
            }
            None => diff.created.push(entity.id().clone()),
        }
    }

    let current: BTreeSet<&EntityId> = new.iter().map(Entity::id).collect();
    diff.deleted = old
        .iter()
        .map(Entity::id)
        .filter(|id| !current.contains(id))
        .cloned()
        .collect();
    diff
}

/// Names of the fields of `patch` that would change `existing`.
///
/// `null` in a patch unsets a field; it only counts as a change if the
/// field is currently set.
pub fn patch_diff(
    existing: &Map<String, Value>,
    patch: &Map<String, Value>,
    link_names: &BTreeSet<String>,
) -> ObjectDiff {
    let effective: Map<String, Value> = patch
        .iter()
        .filter(|(name, value)| {
            name.as_str() != ID_FIELD && !(value.is_null() && !existing.contains_key(*name))
        })
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    object_diff(existing, &effective, link_names)
}

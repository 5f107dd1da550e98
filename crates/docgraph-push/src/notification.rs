//! Change notifications: one topic and payload per affected document.

use std::fmt;

use docgraph_store::EntityId;

use crate::diff::ObjectDiff;

/// What happened to a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangePayload {
    Created,
    Deleted,
    /// Changed names, links rendered as `@name`. Never empty.
    Updated(Vec<String>),
}

impl fmt::Display for ChangePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => f.write_str("+"),
            Self::Deleted => f.write_str("-"),
            Self::Updated(names) => f.write_str(&names.join(",")),
        }
    }
}

/// A message for the `<collection>/<id>` topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub collection: String,
    pub id: EntityId,
    pub payload: ChangePayload,
}

impl Notification {
    pub fn created(collection: impl Into<String>, id: EntityId) -> Self {
        Self {
            collection: collection.into(),
            id,
            payload: ChangePayload::Created,
        }
    }

    pub fn deleted(collection: impl Into<String>, id: EntityId) -> Self {
        Self {
            collection: collection.into(),
            id,
            payload: ChangePayload::Deleted,
        }
    }

    /// `None` when the diff is empty; an unchanged document is never announced.
    pub fn updated(collection: impl Into<String>, id: EntityId, diff: &ObjectDiff) -> Option<Self> {
        if diff.is_empty() {
            return None;
        }
        Some(Self {
            collection: collection.into(),
            id,
            payload: ChangePayload::Updated(diff.changed_names()),
        })
    }

    pub fn topic(&self) -> String {
        format!("{}/{}", self.collection, self.id)
    }

    pub fn payload(&self) -> String {
        self.payload.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_and_payloads() {
        let created = Notification::created("vm", EntityId::from("1"));
        assert_eq!(created.topic(), "vm/1");
        assert_eq!(created.payload(), "+");
        assert_eq!(Notification::deleted("vm", EntityId::from("1")).payload(), "-");
    }

    #[test]
    fn updated_renders_fields_then_links() {
        let diff = ObjectDiff {
            fields: vec!["data".to_string(), "new_field".to_string()],
            links: vec!["cluster".to_string()],
        };
        let notification = Notification::updated("vm", EntityId::from("42"), &diff).unwrap();
        assert_eq!(notification.topic(), "vm/42");
        assert_eq!(notification.payload(), "data,new_field,@cluster");
    }

    #[test]
    fn empty_diff_is_not_a_notification() {
        assert!(Notification::updated("vm", EntityId::from("1"), &ObjectDiff::default()).is_none());
    }
}

//! Query plans built directly from a selector tree.
//!
//! Each node owns a target collection, the fields the selector needs from it,
//! and one child plan per referenced collection. Sibling selectors that point
//! at the same target share a child, which is what lets the resolver fetch a
//! referenced document once no matter how many entities point at it.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use docgraph_store::Projection;

use crate::permission::Permission;
use crate::request::CollectionScope;
use crate::selector::Selector;
use crate::{QueryError, QueryResult};

/// Index of a plan node within its tree. Keys the per-pass caches.
pub(crate) type PlanId = usize;

/// One node of a query plan.
#[derive(Debug)]
pub struct QueryPlan {
    pub(crate) id: PlanId,
    pub(crate) collection: String,
    pub(crate) permission: Arc<Permission>,
    pub(crate) fields: BTreeSet<String>,
    pub(crate) full_data: bool,
    /// Filtering and pagination of this node's collection fetches.
    pub(crate) scope: CollectionScope,
    pub(crate) refs: BTreeMap<String, QueryPlan>,
    pub(crate) many_refs: BTreeMap<String, QueryPlan>,
}

impl QueryPlan {
    /// Builds the plan tree for `selector` rooted at `collection`.
    ///
    /// A missing selector means full data. `scope` applies to the root when
    /// it is resolved as a collection.
    pub fn build(
        collection: &str,
        selector: Option<&Selector>,
        permission: Arc<Permission>,
        scope: CollectionScope,
    ) -> QueryResult<Self> {
        let mut next_id = 0;
        let mut root = Self::node(collection, permission, scope, &mut next_id);
        root.load_sub(selector, &mut next_id)?;
        Ok(root)
    }

    fn node(
        collection: &str,
        permission: Arc<Permission>,
        scope: CollectionScope,
        next_id: &mut PlanId,
    ) -> Self {
        let id = *next_id;
        *next_id += 1;
        Self {
            id,
            collection: collection.to_string(),
            permission,
            fields: BTreeSet::new(),
            full_data: false,
            scope,
            refs: BTreeMap::new(),
            many_refs: BTreeMap::new(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn is_full_data(&self) -> bool {
        self.full_data
    }

    /// Plain fields requested from this node.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    pub fn child(&self, target: &str) -> Option<&QueryPlan> {
        self.refs.get(target)
    }

    pub fn many_child(&self, target: &str) -> Option<&QueryPlan> {
        self.many_refs.get(target)
    }

    /// Number of nodes in the tree rooted here.
    pub fn node_count(&self) -> usize {
        1 + self
            .refs
            .values()
            .chain(self.many_refs.values())
            .map(QueryPlan::node_count)
            .sum::<usize>()
    }

    pub(crate) fn has_children(&self) -> bool {
        !self.refs.is_empty() || !self.many_refs.is_empty()
    }

    /// Fields the store must return for this node.
    ///
    /// Besides the selected fields this includes every reference field, so
    /// links can be followed, and every sort key.
    pub fn store_projection(&self) -> Projection {
        if self.full_data {
            return Projection::All;
        }
        Projection::fields(
            self.fields
                .iter()
                .chain(self.refs.keys())
                .chain(self.many_refs.keys())
                .map(String::as_str)
                .chain(self.scope.order_by.fields()),
        )
    }

    fn load_sub(&mut self, sub: Option<&Selector>, next_id: &mut PlanId) -> QueryResult<()> {
        match sub {
            None | Some(Selector::Wildcard) => {
                self.full_data = true;
                Ok(())
            }
            Some(selector) => self.load(selector, next_id),
        }
    }

    fn load(&mut self, selector: &Selector, next_id: &mut PlanId) -> QueryResult<()> {
        match selector {
            Selector::Wildcard => self.full_data = true,
            Selector::Field(name) => {
                self.fields.insert(name.clone());
            }
            Selector::List(items) => {
                for item in items {
                    self.load(item, next_id)?;
                }
            }
            Selector::Ref { target, sub } => {
                let permission = Arc::clone(&self.permission);
                let child = self.refs.entry(target.clone()).or_insert_with(|| {
                    Self::node(target, permission, CollectionScope::default(), next_id)
                });
                child.load_sub(sub.as_deref(), next_id)?;
            }
            Selector::ManyRef { target, sub, scope } => {
                let child = match self.many_refs.entry(target.clone()) {
                    Entry::Vacant(slot) => slot.insert(Self::node(
                        target,
                        Arc::clone(&self.permission),
                        scope.clone(),
                        next_id,
                    )),
                    Entry::Occupied(slot) => {
                        let existing = slot.into_mut();
                        if existing.scope != *scope {
                            return Err(QueryError::bad_selector(
                                selector.to_string(),
                                format!("conflicting where/orderBy/limit/skip for @[{target}]"),
                            ));
                        }
                        existing
                    }
                };
                child.load_sub(sub.as_deref(), next_id)?;
            }
        }
        Ok(())
    }
}

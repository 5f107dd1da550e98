//! Plan execution against the document store.
//!
//! A [`QueryContext`] lives for exactly one resolution pass. It owns the
//! per-plan caches, the fetch limiter and the pass statistics. Reference
//! children of an entity, and sibling entities of a collection, resolve
//! concurrently as boxed futures joined with `try_join_all`; dropping the
//! top-level future drops every outstanding fetch with it.
//!
//! Each cache slot is a `OnceCell`. The first task to reach an id reserves
//! the slot and fetches; concurrent tasks asking for the same id await that
//! fetch instead of issuing their own.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use docgraph_store::{DocumentStore, Entity, EntityId, Filter, LinkShape, Predicate, ID_FIELD};
use futures_util::future::{try_join_all, BoxFuture, FutureExt};
use tokio::sync::{OnceCell, Semaphore};
use tracing::{debug, trace};

use crate::permission::Permission;
use crate::plan::{PlanId, QueryPlan};
use crate::{QueryError, QueryResult};

type EntitySlot = Arc<OnceCell<Option<Arc<Entity>>>>;
type CollectionSlot = Arc<OnceCell<Arc<Vec<Arc<Entity>>>>>;

/// Counters for one resolution pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryStats {
    pub store_gets: usize,
    pub store_finds: usize,
    pub cache_hits: usize,
}

#[derive(Default)]
struct PassCounters {
    gets: AtomicUsize,
    finds: AtomicUsize,
    hits: AtomicUsize,
}

/// Result cache of one plan node.
#[derive(Default)]
struct PlanCache {
    entities: Mutex<HashMap<EntityId, EntitySlot>>,
    /// Keyed by parent id; `None` is the root collection fetch.
    collections: Mutex<HashMap<Option<EntityId>, CollectionSlot>>,
    expanded: Mutex<HashMap<EntityId, Arc<OnceCell<()>>>>,
}

impl PlanCache {
    fn entity_slot(&self, id: &EntityId) -> EntitySlot {
        let mut entities = self.entities.lock().expect("lock poisoned");
        Arc::clone(entities.entry(id.clone()).or_default())
    }

    fn collection_slot(&self, parent: &Option<EntityId>) -> CollectionSlot {
        let mut collections = self.collections.lock().expect("lock poisoned");
        Arc::clone(collections.entry(parent.clone()).or_default())
    }

    fn expansion_slot(&self, id: &EntityId) -> Arc<OnceCell<()>> {
        let mut expanded = self.expanded.lock().expect("lock poisoned");
        Arc::clone(expanded.entry(id.clone()).or_default())
    }

    fn entity(&self, id: &EntityId) -> Option<Arc<Entity>> {
        let entities = self.entities.lock().expect("lock poisoned");
        entities.get(id)?.get()?.clone()
    }

    fn collection(&self, parent: &Option<EntityId>) -> Option<Arc<Vec<Arc<Entity>>>> {
        let collections = self.collections.lock().expect("lock poisoned");
        collections.get(parent)?.get().cloned()
    }
}

/// State of one resolution pass.
pub struct QueryContext<'s> {
    store: &'s dyn DocumentStore,
    fetch_limit: Semaphore,
    caches: Vec<PlanCache>,
    counters: PassCounters,
}

impl<'s> QueryContext<'s> {
    /// Creates a context sized for `plan`, allowing at most
    /// `max_concurrent_fetches` store calls in flight.
    pub fn new(
        store: &'s dyn DocumentStore,
        plan: &QueryPlan,
        max_concurrent_fetches: usize,
    ) -> Self {
        Self {
            store,
            fetch_limit: Semaphore::new(max_concurrent_fetches.max(1)),
            caches: (0..plan.node_count()).map(|_| PlanCache::default()).collect(),
            counters: PassCounters::default(),
        }
    }

    pub fn stats(&self) -> QueryStats {
        QueryStats {
            store_gets: self.counters.gets.load(Ordering::Relaxed),
            store_finds: self.counters.finds.load(Ordering::Relaxed),
            cache_hits: self.counters.hits.load(Ordering::Relaxed),
        }
    }

    fn cache(&self, id: PlanId) -> &PlanCache {
        &self.caches[id]
    }

    /// Already resolved entity of a plan node.
    pub(crate) fn resolved_entity(&self, plan: &QueryPlan, id: &EntityId) -> Option<Arc<Entity>> {
        self.cache(plan.id).entity(id)
    }

    /// Already resolved collection of a plan node for one parent.
    pub(crate) fn resolved_collection(
        &self,
        plan: &QueryPlan,
        parent: &Option<EntityId>,
    ) -> Option<Arc<Vec<Arc<Entity>>>> {
        self.cache(plan.id).collection(parent)
    }

    /// Resolves one entity and everything its plan references.
    ///
    /// Fails with `Forbidden` before touching the store if the caller may
    /// not see the id. A missing document resolves to `None`.
    pub fn resolve_one<'c>(
        &'c self,
        plan: &'c QueryPlan,
        id: EntityId,
    ) -> BoxFuture<'c, QueryResult<Option<Arc<Entity>>>> {
        async move {
            if !plan.permission.check(&plan.collection, &id) {
                return Err(QueryError::forbidden(plan.collection.as_str(), id.as_str()));
            }

            let slot = self.cache(plan.id).entity_slot(&id);
            if slot.initialized() {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
            }
            let entity = slot
                .get_or_try_init(|| self.fetch_one(plan, &id))
                .await?
                .clone();

            if let Some(entity) = &entity {
                self.expand(plan, Arc::clone(entity)).await?;
            }
            Ok(entity)
        }
        .boxed()
    }

    /// Resolves a collection fetch of `plan` for `parent`.
    ///
    /// `filter` carries the link constraint; the plan's own scope, the
    /// caller's permission, ordering and pagination are applied here.
    pub fn resolve_many<'c>(
        &'c self,
        plan: &'c QueryPlan,
        parent: Option<EntityId>,
        filter: Filter,
    ) -> BoxFuture<'c, QueryResult<Arc<Vec<Arc<Entity>>>>> {
        async move {
            let slot = self.cache(plan.id).collection_slot(&parent);
            if slot.initialized() {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
            }
            let entities = slot
                .get_or_try_init(|| self.fetch_many(plan, filter))
                .await?;
            Ok(Arc::clone(entities))
        }
        .boxed()
    }

    async fn fetch_one(
        &self,
        plan: &QueryPlan,
        id: &EntityId,
    ) -> QueryResult<Option<Arc<Entity>>> {
        let _permit = self
            .fetch_limit
            .acquire()
            .await
            .map_err(|_| QueryError::StoreUnavailable("fetch limiter closed".to_string()))?;
        self.counters.gets.fetch_add(1, Ordering::Relaxed);
        trace!(collection = %plan.collection, id = %id, "fetching entity");
        let entity = self
            .store
            .get(&plan.collection, id, &plan.store_projection())
            .await?;
        Ok(entity.map(Arc::new))
    }

    async fn fetch_many(
        &self,
        plan: &QueryPlan,
        link: Filter,
    ) -> QueryResult<Arc<Vec<Arc<Entity>>>> {
        let mut filter = link;
        for condition in plan.scope.filter.conditions() {
            filter.push(condition.field.clone(), condition.predicate.clone());
        }
        let filter = scope_to_permission(&plan.permission, &plan.collection, filter)?;

        let found = {
            let _permit = self
                .fetch_limit
                .acquire()
                .await
                .map_err(|_| QueryError::StoreUnavailable("fetch limiter closed".to_string()))?;
            self.counters.finds.fetch_add(1, Ordering::Relaxed);
            trace!(
                collection = %plan.collection,
                conditions = filter.conditions().len(),
                "fetching collection"
            );
            self.store
                .find(&plan.collection, &filter, &plan.store_projection())
                .await?
        };

        let mut entities: Vec<Arc<Entity>> = found.into_iter().map(Arc::new).collect();
        plan.scope.order_by.sort(&mut entities);
        let page = plan.scope.window(entities);

        try_join_all(page.iter().map(|entity| self.expand(plan, Arc::clone(entity)))).await?;
        Ok(Arc::new(page))
    }

    /// Resolves every reference child of one entity, once per (plan, id).
    fn expand<'c>(
        &'c self,
        plan: &'c QueryPlan,
        entity: Arc<Entity>,
    ) -> BoxFuture<'c, QueryResult<()>> {
        async move {
            if !plan.has_children() {
                return Ok(());
            }
            let slot = self.cache(plan.id).expansion_slot(entity.id());
            slot.get_or_try_init(|| self.expand_children(plan, &entity))
                .await?;
            Ok(())
        }
        .boxed()
    }

    async fn expand_children(&self, plan: &QueryPlan, entity: &Entity) -> QueryResult<()> {
        let mut tasks: Vec<BoxFuture<'_, QueryResult<()>>> = Vec::new();

        for (target, child) in &plan.refs {
            if let LinkShape::Single(id) = entity.link(target) {
                tasks.push(self.resolve_one(child, id).map(|r| r.map(drop)).boxed());
            }
        }

        for (target, child) in &plan.many_refs {
            let link = match entity.link(target) {
                LinkShape::Many(ids) => {
                    Filter::all().is_in(ID_FIELD, ids.iter().map(EntityId::to_value))
                }
                LinkShape::Single(id) => Filter::all().is_in(ID_FIELD, [id.to_value()]),
                LinkShape::Absent => {
                    Filter::all().eq(plan.collection.clone(), entity.id().to_value())
                }
                LinkShape::Invalid => continue,
            };
            let parent = Some(entity.id().clone());
            tasks.push(self.resolve_many(child, parent, link).map(|r| r.map(drop)).boxed());
        }

        debug!(
            collection = %plan.collection,
            id = %entity.id(),
            children = tasks.len(),
            "resolving references"
        );
        try_join_all(tasks).await?;
        Ok(())
    }
}

/// Narrows a collection filter to the caller's whitelist.
///
/// Explicit id constraints must stay inside the whitelist; without one the
/// whitelist itself becomes the id constraint.
fn scope_to_permission(
    permission: &Permission,
    collection: &str,
    mut filter: Filter,
) -> QueryResult<Filter> {
    if !permission.restricts(collection) {
        return Ok(filter);
    }
    let whitelist = permission.whitelist(collection);

    let id_predicates = filter.take_field(ID_FIELD);
    let mut constrained = false;
    for predicate in &id_predicates {
        let requested: &[serde_json::Value] = match predicate {
            Predicate::Eq(value) => std::slice::from_ref(value),
            Predicate::In(values) => values.as_slice(),
            Predicate::Glob(_) => continue,
        };
        for value in requested {
            let allowed = EntityId::from_value(value).is_some_and(|id| whitelist.contains(&id));
            if !allowed {
                let id = EntityId::from_value(value)
                    .map_or_else(|| value.to_string(), |id| id.to_string());
                return Err(QueryError::forbidden(collection, id));
            }
        }
        constrained = true;
    }

    for predicate in id_predicates {
        filter.push(ID_FIELD, predicate);
    }
    if !constrained {
        filter.push(ID_FIELD, Predicate::In(whitelist.iter().map(EntityId::to_value).collect()));
    }
    Ok(filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn whitelisted() -> Permission {
        Permission::scoped().grant_ids("vm", ["1", "2"])
    }

    #[test]
    fn unrestricted_filter_is_untouched() {
        let filter = Filter::all().eq("status", "up");
        let scoped =
            scope_to_permission(&Permission::Unrestricted, "vm", filter.clone()).unwrap();
        assert_eq!(scoped, filter);
    }

    #[test]
    fn whitelist_becomes_id_constraint() {
        let filter = Filter::all().eq("status", "up");
        let scoped = scope_to_permission(&whitelisted(), "vm", filter).unwrap();
        assert_eq!(
            scoped,
            Filter::all()
                .eq("status", "up")
                .is_in(ID_FIELD, [json!("1"), json!("2")])
        );
    }

    #[test]
    fn explicit_ids_outside_whitelist_are_forbidden() {
        let filter = Filter::all().is_in(ID_FIELD, ["1", "3"]);
        let err = scope_to_permission(&whitelisted(), "vm", filter).unwrap_err();
        assert_eq!(err, QueryError::forbidden("vm", "3"));

        let filter = Filter::all().eq(ID_FIELD, 7);
        let err = scope_to_permission(&whitelisted(), "vm", filter).unwrap_err();
        assert_eq!(err, QueryError::forbidden("vm", "7"));
    }

    #[test]
    fn explicit_ids_inside_whitelist_are_kept() {
        let filter = Filter::all().is_in(ID_FIELD, [2]);
        let scoped = scope_to_permission(&whitelisted(), "vm", filter).unwrap();
        assert_eq!(scoped, Filter::all().is_in(ID_FIELD, [2]));
    }

    #[test]
    fn unlisted_collection_sees_nothing() {
        let scoped = scope_to_permission(&whitelisted(), "disk", Filter::all()).unwrap();
        assert_eq!(scoped, Filter::all().is_in(ID_FIELD, Vec::<serde_json::Value>::new()));
    }
}

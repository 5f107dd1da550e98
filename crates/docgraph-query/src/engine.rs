//! Query engine facade: parse, plan, resolve, project.

use std::sync::Arc;

use docgraph_config_and_utils::{
    Config, DEFAULT_MAX_CONCURRENT_FETCHES, DEFAULT_SELECTOR_CACHE_CAPACITY,
};
use docgraph_store::{DocumentStore, Entity, EntityId, Filter};
use serde_json::Value;
use tracing::debug;

use crate::cache::SelectorCache;
use crate::permission::Permission;
use crate::plan::QueryPlan;
use crate::project::project;
use crate::request::{CollectionScope, QueryRequest};
use crate::resolver::{QueryContext, QueryStats};
use crate::QueryResult;

/// Tuning of the query engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryConfig {
    /// Upper bound on store calls in flight within one pass.
    pub max_concurrent_fetches: usize,
    /// Parsed selector strings kept across requests. Zero disables the cache.
    pub selector_cache_capacity: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            selector_cache_capacity: DEFAULT_SELECTOR_CACHE_CAPACITY,
        }
    }
}

impl From<&Config> for QueryConfig {
    fn from(config: &Config) -> Self {
        Self {
            max_concurrent_fetches: config.max_concurrent_fetches,
            selector_cache_capacity: config.selector_cache_capacity,
        }
    }
}

/// Read side of the engine.
///
/// Every call builds a fresh plan and a fresh [`QueryContext`]; nothing but
/// the selector cache outlives a request.
pub struct QueryEngine {
    store: Arc<dyn DocumentStore>,
    config: QueryConfig,
    selectors: SelectorCache,
}

impl QueryEngine {
    pub fn new(store: Arc<dyn DocumentStore>, config: QueryConfig) -> Self {
        let selectors = SelectorCache::new(config.selector_cache_capacity);
        Self {
            store,
            config,
            selectors,
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Parses a JSON request, memoizing selector strings.
    pub fn parse_request(&self, value: &Value) -> QueryResult<QueryRequest> {
        self.selectors.request_from_value(value)
    }

    /// Resolves one entity. `Ok(None)` if it does not exist.
    pub async fn one(
        &self,
        collection: &str,
        id: &EntityId,
        request: &QueryRequest,
        permission: Arc<Permission>,
    ) -> QueryResult<Option<Value>> {
        let select = request.select.as_ref();
        let plan = QueryPlan::build(collection, select, permission, CollectionScope::default())?;
        let ctx = QueryContext::new(self.store.as_ref(), &plan, self.config.max_concurrent_fetches);

        let entity = ctx.resolve_one(&plan, id.clone()).await?;
        log_pass(collection, ctx.stats());
        Ok(entity.map(|entity| project(&ctx, &plan, select, &entity)))
    }

    /// Resolves a whole collection with the request's filter, order and window.
    pub async fn many(
        &self,
        collection: &str,
        request: &QueryRequest,
        permission: Arc<Permission>,
    ) -> QueryResult<Vec<Value>> {
        let select = request.select.as_ref();
        let plan = QueryPlan::build(collection, select, permission, request.scope.clone())?;
        let ctx = QueryContext::new(self.store.as_ref(), &plan, self.config.max_concurrent_fetches);

        let entities = ctx.resolve_many(&plan, None, Filter::all()).await?;
        log_pass(collection, ctx.stats());
        Ok(entities
            .iter()
            .map(|entity| project(&ctx, &plan, select, entity))
            .collect())
    }

    /// Loads the full current version of one entity, bypassing permissions.
    pub async fn load_full(&self, collection: &str, id: &EntityId) -> QueryResult<Option<Entity>> {
        let plan = QueryPlan::build(
            collection,
            None,
            Arc::new(Permission::Unrestricted),
            CollectionScope::default(),
        )?;
        let ctx = QueryContext::new(self.store.as_ref(), &plan, self.config.max_concurrent_fetches);
        let entity = ctx.resolve_one(&plan, id.clone()).await?;
        Ok(entity.map(Arc::unwrap_or_clone))
    }

    /// Loads the full current version of a collection, bypassing permissions.
    pub async fn load_collection(&self, collection: &str) -> QueryResult<Vec<Entity>> {
        let plan = QueryPlan::build(
            collection,
            None,
            Arc::new(Permission::Unrestricted),
            CollectionScope::default(),
        )?;
        let ctx = QueryContext::new(self.store.as_ref(), &plan, self.config.max_concurrent_fetches);
        let entities = ctx.resolve_many(&plan, None, Filter::all()).await?;
        Ok(entities.iter().map(|entity| entity.as_ref().clone()).collect())
    }
}

fn log_pass(collection: &str, stats: QueryStats) {
    debug!(
        collection,
        store_gets = stats.store_gets,
        store_finds = stats.store_finds,
        cache_hits = stats.cache_hits,
        "query pass complete"
    );
}

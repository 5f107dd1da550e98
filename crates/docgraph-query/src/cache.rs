//! Memoization of parsed selector strings.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use serde_json::Value;

use crate::request::QueryRequest;
use crate::selector::Selector;
use crate::QueryResult;

/// Bounded LRU of parsed selector strings, shared across requests.
///
/// A capacity of zero disables caching. Parse failures are never cached.
pub struct SelectorCache {
    entries: Option<Mutex<LruCache<String, Selector>>>,
}

impl SelectorCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity)
                .map(|capacity| Mutex::new(LruCache::new(capacity))),
        }
    }

    /// Parses a selector string, reusing an earlier parse of the same string.
    pub fn parse(&self, raw: &str) -> QueryResult<Selector> {
        let Some(entries) = &self.entries else {
            return Selector::parse(raw);
        };
        if let Some(hit) = entries.lock().expect("cache lock poisoned").get(raw) {
            return Ok(hit.clone());
        }
        let parsed = Selector::parse(raw)?;
        entries
            .lock()
            .expect("cache lock poisoned")
            .put(raw.to_string(), parsed.clone());
        Ok(parsed)
    }

    /// Parses any selector form, caching every string fragment.
    pub fn selector_from_value(&self, value: &Value) -> QueryResult<Selector> {
        Selector::from_value_with(value, &|raw: &str| self.parse(raw))
    }

    /// Parses a request, caching every selector string inside it.
    pub fn request_from_value(&self, value: &Value) -> QueryResult<QueryRequest> {
        QueryRequest::from_value_with(value, &|raw: &str| self.parse(raw))
    }

    pub fn len(&self) -> usize {
        self.entries
            .as_ref()
            .map_or(0, |entries| entries.lock().expect("cache lock poisoned").len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

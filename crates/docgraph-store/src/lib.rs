//! # Docgraph Store
//!
//! The boundary between the query engine and raw schemaless storage.
//!
//! Raw documents enter as JSON and leave as typed [`Entity`] values with a
//! canonical string id. Reference shapes are inferred here and nowhere else.
//!
//! ## Crate Structure
//!
//! - [`entity`] - Entities, ids and link shapes
//! - [`filter`] - Equality, membership and glob filters
//! - [`glob`] - Glob pattern compilation
//! - [`projection`] - Store-side field projection
//! - [`memory`] - In-memory store used by tests and embedders

mod error;

pub mod entity;
pub mod filter;
pub mod glob;
pub mod memory;
pub mod projection;
mod store;

pub use entity::{is_internal_field, scalar_key, Entity, EntityId, LinkShape, ID_FIELD};
pub use error::{StoreError, StoreResult};
pub use filter::{Condition, Filter, Predicate};
pub use glob::{is_glob, GlobPattern};
pub use memory::{FetchStats, MemoryStore};
pub use projection::Projection;
pub use store::{DocumentStore, EntityUpdate};

//! # Docgraph Entities
//!
//! Document reads and writes for the docgraph engine. Reads go through the
//! query engine; writes are validated, diffed against the prior version,
//! applied to the store and announced through the change publisher.
//!
//! | operation            | result                                      |
//! |----------------------|---------------------------------------------|
//! | `create`             | `+`, or an update if the id already exists  |
//! | `replace`            | changed names, `+` if the id was missing    |
//! | `patch`              | changed names; missing document is `404`    |
//! | `replace_collection` | `+` / changed names / `-` per document      |
//! | `remove`             | `-`; missing document is `404`              |
//! | `remove_collection`  | `-` per document                            |

mod check;
mod error;
mod manager;

#[cfg(test)]
mod tests;

pub use error::{EntityError, EntityResult};
pub use manager::EntityManager;

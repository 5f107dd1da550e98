//! Core configuration, errors, and logging for the docgraph engine.

mod config;
mod error;
mod logging;

pub use config::{
    Config, LogFormat, DEFAULT_LOG_LEVEL, DEFAULT_MAX_CONCURRENT_FETCHES,
    DEFAULT_PUBLISH_QUEUE_CAPACITY, DEFAULT_SELECTOR_CACHE_CAPACITY,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};

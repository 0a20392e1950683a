//! Runtime configuration: where the management API lives and how to log.

mod loader;
mod types;

pub use loader::ConfigError;
pub use types::{Config, LoggingConfig, ServerConfig};

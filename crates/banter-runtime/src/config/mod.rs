//! Configuration loading and schema.
//!
//! See [`ConfigLoader`] for the source layering and [`BanterConfig`] for
//! the schema.

pub mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use schema::{
    BanterConfig, BotConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, StorageConfig,
};

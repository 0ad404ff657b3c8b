//! Banter Runtime - orchestration layer for the Banter chat bot.
//!
//! This crate provides:
//!
//! - Figment-based configuration loading ([`ConfigLoader`], [`BanterConfig`])
//! - Logging setup ([`LoggingBuilder`], [`logging::init_from_config`])
//! - The transport seam ([`EventSource`], [`ChannelEventSource`])
//! - Runtime orchestration and the event loop ([`BanterRuntime`])
//!
//! ```rust,ignore
//! use banter_runtime::{BanterRuntime, ChannelEventSource, ConfigLoader};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::new().load()?;
//!     let runtime = BanterRuntime::new(config, responder);
//!
//!     let (events, source) = ChannelEventSource::new(64);
//!     transport::spawn(events);
//!     runtime.run(source).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod source;

pub use config::{BanterConfig, ConfigError, ConfigLoader, ConfigResult, LoggingConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::LoggingBuilder;
pub use runtime::BanterRuntime;
pub use source::{ChannelEventSource, EventSource};

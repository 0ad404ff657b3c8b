//! # Banter
//!
//! A chat-room automation bot built around a filtered event-routing and
//! plugin command-dispatch engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐     ┌────────────┐     ┌─────────────────────────────┐
//! │ Transport │────▶│ Dispatcher │────▶│ Built-in Action Manager     │
//! │ (events)  │     │            │────▶│ Plugin Manager              │
//! └───────────┘     └────────────┘     │   event filters (indexed)   │
//!                                      │   message handlers          │
//!                                      │   mapped command endpoints  │
//!                                      └─────────────────────────────┘
//! ```
//!
//! - **banter-core**: value types (events, rooms, commands) and the
//!   storage/responder collaborator contracts.
//! - **banter-framework**: the filter DSL (parser + compiler), the plugin
//!   registry with per-room enable/disable and command mapping, built-ins,
//!   and the dispatcher.
//! - **banter-runtime**: configuration, logging, and the event loop.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use banter::prelude::*;
//!
//! struct Echo;
//!
//! #[async_trait::async_trait]
//! impl Plugin for Echo {
//!     fn name(&self) -> &str {
//!         "echo"
//!     }
//!
//!     fn command_endpoints(&self) -> Vec<CommandEndpoint> {
//!         vec![
//!             CommandEndpoint::new("say", command_handler(|cmd: Command| async move {
//!                 println!("{}", cmd.parameters().join(" "));
//!                 Ok(())
//!             }))
//!             .with_default_command("echo"),
//!         ]
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::new().load()?;
//!     let runtime = BanterRuntime::new(config, responder);
//!     runtime.register_plugin(std::sync::Arc::new(Echo))?;
//!
//!     let (events, source) = ChannelEventSource::new(64);
//!     // hand `events` to the transport task, then:
//!     runtime.run(source).await?;
//!     Ok(())
//! }
//! ```

pub use banter_core as core;
pub use banter_framework as framework;
pub use banter_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use banter::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use banter_runtime::{BanterRuntime, ChannelEventSource, ConfigLoader, EventSource};

    // Plugin system - primary unit of bot behaviour
    pub use banter_framework::{
        CommandEndpoint, MappingError, Plugin, PluginManager, RegistrationError,
    };

    // Handler adapters
    pub use banter_framework::handler::{command_handler, event_handler, message_handler};

    // Built-ins
    pub use banter_framework::{BuiltInActionManager, BuiltInCommand, BuiltInEventHandler};

    // Core value types and collaborator seams
    pub use banter_core::{
        BanStore, BoxError, Command, Event, PluginStore, Responder, RoomId,
    };
}

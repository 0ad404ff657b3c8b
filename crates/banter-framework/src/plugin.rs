//! The plugin contract.
//!
//! A plugin is an installable unit providing any combination of command
//! endpoints, event filters, and a free-text message handler. Plugins are
//! registered once with the [`PluginManager`](crate::manager::PluginManager)
//! and then enabled or disabled per room.
//!
//! # Example
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use banter_framework::handler::{command_handler, event_handler, EventHandler};
//! use banter_framework::plugin::{CommandEndpoint, Plugin};
//!
//! struct Jokes;
//!
//! #[async_trait]
//! impl Plugin for Jokes {
//!     fn name(&self) -> &str {
//!         "jokes"
//!     }
//!
//!     fn command_endpoints(&self) -> Vec<CommandEndpoint> {
//!         vec![
//!             CommandEndpoint::new("random", command_handler(|cmd| async move { Ok(()) }))
//!                 .with_default_command("joke")
//!                 .with_description("Posts a random joke"),
//!         ]
//!     }
//!
//!     fn event_handlers(&self) -> Vec<(String, EventHandler)> {
//!         vec![("type=3".into(), event_handler(|event| async move { Ok(()) }))]
//!     }
//! }
//! ```

use std::fmt;

use async_trait::async_trait;

use banter_core::{BoxError, Command, RoomId};

use crate::handler::{CommandHandler, EventHandler, MessageHandler};

// ─── CommandEndpoint ─────────────────────────────────────────────────────────

/// One named entry point of a plugin that a chat command can be mapped to.
pub struct CommandEndpoint {
    name: String,
    handler: CommandHandler,
    default_command: Option<String>,
    description: Option<String>,
}

impl CommandEndpoint {
    /// Creates an endpoint with the given name and callback.
    pub fn new(name: impl Into<String>, handler: CommandHandler) -> CommandEndpoint {
        CommandEndpoint {
            name: name.into(),
            handler,
            default_command: None,
            description: None,
        }
    }

    /// Sets the command auto-mapped when a room first enables the plugin.
    #[must_use]
    pub fn with_default_command(mut self, command: impl Into<String>) -> CommandEndpoint {
        self.default_command = Some(command.into());
        self
    }

    /// Sets a human-readable description for listings.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> CommandEndpoint {
        self.description = Some(description.into());
        self
    }

    /// The endpoint name, unique within its plugin.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The command installed on first enable, if any.
    pub fn default_command(&self) -> Option<&str> {
        self.default_command.as_deref()
    }

    /// Description for listings, if any.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Invokes the endpoint callback.
    pub(crate) async fn invoke(&self, command: Command) -> Result<(), BoxError> {
        (self.handler)(command).await
    }
}

impl fmt::Debug for CommandEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandEndpoint")
            .field("name", &self.name)
            .field("default_command", &self.default_command)
            .finish()
    }
}

// ─── Plugin trait ────────────────────────────────────────────────────────────

/// An installable unit of bot behaviour.
///
/// The accessor methods are called once, during registration; the returned
/// tables are compiled and indexed by the manager. The enable/disable hooks
/// run on every room transition and may fail — hook failures are logged by
/// the manager and never abort the transition.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// The plugin name. Folded to lower case and used as the registry key.
    fn name(&self) -> &str;

    /// One-line description shown by administrative listings.
    fn description(&self) -> &str {
        ""
    }

    /// The command endpoints this plugin exposes. Names must be unique
    /// within the plugin.
    fn command_endpoints(&self) -> Vec<CommandEndpoint> {
        Vec::new()
    }

    /// `filter text → handler` pairs, compiled at registration time.
    fn event_handlers(&self) -> Vec<(String, EventHandler)> {
        Vec::new()
    }

    /// Free-text handler invoked for every message event in rooms where the
    /// plugin is enabled.
    fn message_handler(&self) -> Option<MessageHandler> {
        None
    }

    /// Called when the plugin is enabled for a room, before any command
    /// mappings are reconciled.
    async fn enable_for_room(&self, _room: &RoomId, _persist: bool) -> Result<(), BoxError> {
        Ok(())
    }

    /// Called when the plugin is disabled for a room, after its command
    /// mappings have been removed.
    async fn disable_for_room(&self, _room: &RoomId, _persist: bool) -> Result<(), BoxError> {
        Ok(())
    }
}

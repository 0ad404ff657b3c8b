//! Built-in commands and event handlers.
//!
//! Built-ins are part of the core: their command names are unconditional
//! (no filter DSL), reserved against plugin mapping, and active in every
//! room — they cannot be disabled. The registry is populated at startup and
//! then frozen behind an `Arc`; the runtime feeds its command names into
//! [`PluginManager::reserve_command_names`] before dispatch starts.
//!
//! [`PluginManager::reserve_command_names`]: crate::manager::PluginManager::reserve_command_names

pub mod command_admin;
pub mod plugin_admin;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future;
use tracing::{debug, error, warn};

use banter_core::{BanStore, BoxError, Command, Event};

// ─── Contracts ───────────────────────────────────────────────────────────────

/// A fixed command that is always available.
#[async_trait]
pub trait BuiltInCommand: Send + Sync {
    /// The command names (including aliases) this built-in answers to.
    fn command_names(&self) -> Vec<String>;

    /// One-line description for listings.
    fn description(&self) -> &str {
        ""
    }

    /// Handles one invocation.
    async fn handle_command(&self, command: &Command) -> Result<(), BoxError>;
}

/// A fixed handler invoked for every event of its declared types.
#[async_trait]
pub trait BuiltInEventHandler: Send + Sync {
    /// The event-type ids this handler wants.
    fn event_types(&self) -> Vec<u32>;

    /// Handles one event.
    async fn handle_event(&self, event: &Event) -> Result<(), BoxError>;
}

// ─── Registry ────────────────────────────────────────────────────────────────

/// Registry of built-in commands and event handlers.
pub struct BuiltInActionManager {
    bans: Arc<dyn BanStore>,
    commands: HashMap<String, Arc<dyn BuiltInCommand>>,
    event_handlers: HashMap<u32, Vec<Arc<dyn BuiltInEventHandler>>>,
}

impl BuiltInActionManager {
    /// Creates an empty registry consulting the given ban store.
    pub fn new(bans: Arc<dyn BanStore>) -> BuiltInActionManager {
        BuiltInActionManager {
            bans,
            commands: HashMap::new(),
            event_handlers: HashMap::new(),
        }
    }

    /// Registers a built-in command under all of its names.
    pub fn register_command(&mut self, command: Arc<dyn BuiltInCommand>) {
        for name in command.command_names() {
            if self
                .commands
                .insert(name.clone(), Arc::clone(&command))
                .is_some()
            {
                warn!(command = %name, "Duplicate built-in command name — last registration wins");
            }
        }
    }

    /// Registers a built-in event handler under all of its event types.
    pub fn register_event_handler(&mut self, handler: Arc<dyn BuiltInEventHandler>) {
        for type_id in handler.event_types() {
            self.event_handlers
                .entry(type_id)
                .or_default()
                .push(Arc::clone(&handler));
        }
    }

    /// Whether `name` is a registered built-in command.
    pub fn has_command(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// All registered command names, sorted.
    pub fn command_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.commands.keys().cloned().collect();
        names.sort();
        names
    }

    /// Invokes the built-in registered for the command's name.
    ///
    /// Banned users are silently ignored; handler failures are logged and
    /// never propagate.
    pub async fn handle_command(&self, command: &Command) {
        let Some(handler) = self.commands.get(command.name()) else {
            return;
        };

        match self.bans.is_banned(command.room(), command.user_id()).await {
            Ok(true) => {
                debug!(
                    user_id = command.user_id(),
                    room = %command.room(),
                    "Ignoring built-in command from banned user"
                );
                return;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(error = %e, "Ban check failed; allowing built-in command");
            }
        }

        if let Err(e) = handler.handle_command(command).await {
            error!(
                event_id = command.event().id(),
                command = %command.name(),
                error = %e,
                "Built-in command failed"
            );
        }
    }

    /// Invokes every built-in event handler registered for the event's type.
    pub async fn handle_event(&self, event: &Event) {
        let Some(handlers) = self.event_handlers.get(&event.type_id()) else {
            return;
        };
        let results = future::join_all(handlers.iter().map(|h| h.handle_event(event))).await;
        for (handler, result) in handlers.iter().zip(results) {
            if let Err(e) = result {
                error!(
                    event_id = event.id(),
                    event_types = ?handler.event_types(),
                    error = %e,
                    "Built-in event handler failed"
                );
            }
        }
    }
}

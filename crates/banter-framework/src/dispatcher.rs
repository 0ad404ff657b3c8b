//! Event routing.
//!
//! The [`EventDispatcher`] receives events one at a time, in transport
//! delivery order, and routes each through the built-in registry and the
//! plugin manager:
//!
//! ```text
//! received ─► built-in event handlers
//!              │
//!              ├─ global event ───► plugin event filters (terminal)
//!              │
//!              └─ room event
//!                   ├─ self-authored message ─► stop
//!                   ├─ built-in command ──────► built-in handler (terminal)
//!                   └─ otherwise ─────────────► plugin filters
//!                                               + message handlers
//!                                               + mapped command endpoint
//! ```
//!
//! There are no retries at this layer and no failure propagates out of a
//! dispatch call; handler errors are logged by the managers that invoked
//! them.

use std::sync::Arc;

use tracing::{Instrument, Level, debug, span};

use banter_core::{Command, Event};

use crate::builtin::BuiltInActionManager;
use crate::manager::PluginManager;

/// Routes each incoming event to built-ins and plugins.
pub struct EventDispatcher {
    builtins: Arc<BuiltInActionManager>,
    plugins: Arc<PluginManager>,
    /// The bot's own account id, for self-message suppression.
    self_user_id: u64,
}

impl EventDispatcher {
    /// Creates a dispatcher over the two handler registries.
    pub fn new(
        builtins: Arc<BuiltInActionManager>,
        plugins: Arc<PluginManager>,
        self_user_id: u64,
    ) -> EventDispatcher {
        EventDispatcher {
            builtins,
            plugins,
            self_user_id,
        }
    }

    /// Routes one event.
    ///
    /// Matching handlers triggered by the same event run concurrently; this
    /// call resolves once all of them have completed or failed.
    pub async fn dispatch(&self, event: Arc<Event>) {
        let span = span!(
            Level::DEBUG,
            "dispatch",
            event_id = event.id(),
            type_id = event.type_id()
        );
        self.route(event).instrument(span).await
    }

    async fn route(&self, event: Arc<Event>) {
        // Built-in event handlers are always active, for every event.
        self.builtins.handle_event(&event).await;

        if event.room().is_none() {
            self.plugins.invoke_handlers_for_event(&event).await;
            return;
        }

        // Messages authored by the bot's own account get no command
        // classification and no plugin routing.
        if event.message().is_some()
            && event.user().is_some_and(|user| user.id == self.self_user_id)
        {
            debug!(event_id = event.id(), "Skipping self-authored message");
            return;
        }

        let command = Command::from_event(&event);
        if let Some(cmd) = &command
            && self.builtins.has_command(cmd.name())
        {
            self.builtins.handle_command(cmd).await;
            return;
        }

        futures::join!(
            self.plugins.invoke_handlers_for_event(&event),
            self.plugins.invoke_message_handlers(&event),
            async {
                if let Some(cmd) = &command {
                    self.plugins.invoke_handler_for_command(cmd).await;
                }
            }
        );
    }
}

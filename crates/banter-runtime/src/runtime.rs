//! Runtime orchestration.
//!
//! [`BanterRuntime`] wires the engine together: it owns the
//! [`PluginManager`] and [`BuiltInActionManager`], installs the
//! administrative built-ins, restores persisted per-room plugin state, and
//! drives the event loop.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use banter_runtime::{BanterRuntime, ChannelEventSource, ConfigLoader};
//!
//! let config = ConfigLoader::new().load()?;
//! let mut runtime = BanterRuntime::new(config, responder);
//! runtime.register_plugin(Arc::new(JokesPlugin::new()))?;
//!
//! let (events, source) = ChannelEventSource::new(64);
//! // hand `events` to the transport, then:
//! runtime.run(source).await?;
//! ```
//!
//! The run loop starts routing each event as soon as it arrives; handler
//! I/O from consecutive events is free to interleave. Shutdown is
//! triggered by Ctrl+C/SIGTERM, by the [`CancellationToken`] from
//! [`shutdown_token`](BanterRuntime::shutdown_token), or by the event
//! source ending.

use std::sync::Arc;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use banter_core::{BanStore, MemoryBanStore, MemoryPluginStore, PluginStore, Responder};
use banter_framework::builtin::command_admin::CommandAdmin;
use banter_framework::builtin::plugin_admin::PluginAdmin;
use banter_framework::{
    BuiltInActionManager, BuiltInCommand, BuiltInEventHandler, EventDispatcher, Plugin,
    PluginManager, RegistrationError,
};

use crate::config::BanterConfig;
use crate::error::RuntimeResult;
use crate::logging;
use crate::source::EventSource;

/// The main runtime: engine wiring plus the event loop.
pub struct BanterRuntime {
    config: BanterConfig,
    store: Arc<dyn PluginStore>,
    plugins: Arc<PluginManager>,
    builtins: BuiltInActionManager,
    shutdown: CancellationToken,
}

impl BanterRuntime {
    /// Creates a runtime with in-memory storage backends.
    ///
    /// State will not survive a restart; production deployments pass their
    /// storage collaborators through [`with_stores`](Self::with_stores).
    pub fn new(config: BanterConfig, responder: Arc<dyn Responder>) -> BanterRuntime {
        Self::with_stores(
            config,
            Arc::new(MemoryPluginStore::new()),
            Arc::new(MemoryBanStore::new()),
            responder,
        )
    }

    /// Creates a runtime over the given storage collaborators.
    ///
    /// Initializes logging from the configuration and installs the
    /// `command` and `plugin` administrative built-ins.
    pub fn with_stores(
        config: BanterConfig,
        store: Arc<dyn PluginStore>,
        bans: Arc<dyn BanStore>,
        responder: Arc<dyn Responder>,
    ) -> BanterRuntime {
        logging::init_from_config(&config.logging);

        let plugins = Arc::new(PluginManager::new(Arc::clone(&store), Arc::clone(&bans)));
        let mut builtins = BuiltInActionManager::new(bans);
        builtins.register_command(Arc::new(CommandAdmin::new(
            Arc::clone(&plugins),
            Arc::clone(&responder),
        )));
        builtins.register_command(Arc::new(PluginAdmin::new(Arc::clone(&plugins), responder)));

        BanterRuntime {
            config,
            store,
            plugins,
            builtins,
            shutdown: CancellationToken::new(),
        }
    }

    /// The loaded configuration.
    pub fn config(&self) -> &BanterConfig {
        &self.config
    }

    /// The plugin manager, for administrative access outside chat.
    pub fn plugins(&self) -> &Arc<PluginManager> {
        &self.plugins
    }

    /// Registers a plugin.
    pub fn register_plugin(&self, plugin: Arc<dyn Plugin>) -> Result<(), RegistrationError> {
        self.plugins.register_plugin(plugin)
    }

    /// Registers an additional built-in command.
    ///
    /// Must happen before [`run`](Self::run); the built-in name set is
    /// sealed when the loop starts.
    pub fn register_built_in_command(&mut self, command: Arc<dyn BuiltInCommand>) {
        self.builtins.register_command(command);
    }

    /// Registers an additional built-in event handler.
    pub fn register_built_in_event_handler(&mut self, handler: Arc<dyn BuiltInEventHandler>) {
        self.builtins.register_event_handler(handler);
    }

    /// A token that stops the run loop when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Runs the event loop until shutdown.
    ///
    /// Seals the built-in command names into the plugin manager, restores
    /// persisted per-room plugin state for the configured rooms, then
    /// dispatches every event from `source` on its own task.
    pub async fn run<S: EventSource>(self, mut source: S) -> RuntimeResult<()> {
        let BanterRuntime {
            config,
            store,
            plugins,
            builtins,
            shutdown,
        } = self;

        plugins.reserve_command_names(builtins.command_names());
        let dispatcher = Arc::new(EventDispatcher::new(
            Arc::new(builtins),
            Arc::clone(&plugins),
            config.bot.account_id,
        ));

        for room in &config.rooms {
            for name in plugins.plugin_names() {
                match store.is_plugin_enabled(room, &name).await {
                    Ok(true) => {
                        if let Err(e) = plugins.enable_plugin_for_room(room, &name, false).await {
                            warn!(room = %room, plugin = %name, error = %e,
                                "Failed to restore enabled plugin");
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!(room = %room, plugin = %name, error = %e,
                            "Failed to read persisted plugin state");
                    }
                }
            }
        }

        info!(account = %config.bot.account_name, "Banter runtime is running");

        let signal = shutdown_signal();
        tokio::pin!(signal);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
                _ = &mut signal => {
                    shutdown.cancel();
                    break;
                }
                event = source.next_event() => match event {
                    Some(event) => {
                        let dispatcher = Arc::clone(&dispatcher);
                        tokio::spawn(async move { dispatcher.dispatch(event).await });
                    }
                    None => {
                        info!("Event source closed");
                        break;
                    }
                },
            }
        }

        info!("Banter runtime stopped");
        Ok(())
    }
}

/// Resolves when a shutdown signal (Ctrl+C or SIGTERM) is received.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to register SIGTERM handler");

        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
        info!("Received Ctrl+C, shutting down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use banter_core::event::types;
    use banter_core::{BoxError, Command, Event, RoomId};
    use banter_framework::handler::command_handler;
    use banter_framework::{CommandEndpoint, MappingError};

    use crate::source::ChannelEventSource;

    struct NullResponder;

    #[async_trait]
    impl Responder for NullResponder {
        async fn post_message(&self, _room: &RoomId, _text: &str) -> Result<(), BoxError> {
            Ok(())
        }
    }

    /// Plugin whose single endpoint reports invocations over a channel.
    struct NotifyPlugin {
        tx: mpsc::Sender<String>,
    }

    #[async_trait]
    impl Plugin for NotifyPlugin {
        fn name(&self) -> &str {
            "notify"
        }

        fn command_endpoints(&self) -> Vec<CommandEndpoint> {
            let tx = self.tx.clone();
            vec![
                CommandEndpoint::new(
                    "report",
                    command_handler(move |command: Command| {
                        let tx = tx.clone();
                        async move {
                            tx.send(command.name().to_string()).await.ok();
                            Ok(())
                        }
                    }),
                )
                .with_default_command("go"),
            ]
        }
    }

    fn room() -> RoomId {
        RoomId::new("chat.example.com", 11)
    }

    fn message(content: &str) -> Arc<Event> {
        Event::builder(types::MESSAGE_POSTED, 1)
            .room(room())
            .user(5, "alice")
            .message(100, content)
            .build_shared()
    }

    #[tokio::test]
    async fn run_dispatches_events_until_cancelled() {
        let runtime = BanterRuntime::new(BanterConfig::default(), Arc::new(NullResponder));
        let (tx, mut rx) = mpsc::channel(4);
        runtime
            .register_plugin(Arc::new(NotifyPlugin { tx }))
            .unwrap();
        runtime
            .plugins()
            .enable_plugin_for_room(&room(), "notify", false)
            .await
            .unwrap();

        let plugins = Arc::clone(runtime.plugins());
        let token = runtime.shutdown_token();
        let (events, source) = ChannelEventSource::new(8);
        let handle = tokio::spawn(runtime.run(source));

        events.send(message("!!go now")).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), "go");

        // The administrative built-in names are sealed once running.
        let err = plugins
            .map_command_for_room(&room(), "notify", "report", "command")
            .await
            .unwrap_err();
        assert_eq!(err, MappingError::BuiltIn("command".into()));

        token.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn run_stops_when_the_source_ends() {
        let runtime = BanterRuntime::new(BanterConfig::default(), Arc::new(NullResponder));
        let (events, source) = ChannelEventSource::new(1);
        drop(events);
        runtime.run(source).await.unwrap();
    }
}

//! Plugin registration, per-room state, and dispatch lookups.
//!
//! [`PluginManager`] is the single owner of all plugin-related state:
//!
//! - the table of registered plugins and their command endpoints,
//! - three indexes of compiled filters — by event type, by room, and the
//!   unindexed rest — so dispatch touches only plausible candidates instead
//!   of scanning every filter,
//! - the per-room `command → (plugin, endpoint)` map, and
//! - the per-room set of enabled plugins.
//!
//! It is constructed once at startup and shared behind an `Arc`; no other
//! component mutates its indexes.
//!
//! # Consistency model
//!
//! All mutating operations update the in-memory state synchronously, under
//! a short-lived write lock that is released before any storage call is
//! awaited. Two interleaved operations on the same room therefore always
//! observe each other's in-memory effect immediately; persistence may lag
//! behind, which is acceptable because state is rebuilt from storage on the
//! next enable. Persistence failures are logged, never returned.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use futures::future;
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use banter_core::{BanStore, Command, Event, PluginStore, RoomId};

use crate::error::{MappingError, RegistrationError, RegistrationErrorKind};
use crate::filter::Filter;
use crate::handler::MessageHandler;
use crate::plugin::{CommandEndpoint, Plugin};

// ─── State ───────────────────────────────────────────────────────────────────

/// Where a mapped command points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedCommand {
    /// Lower-cased plugin name.
    pub plugin: String,
    /// Endpoint name within the plugin.
    pub endpoint: String,
}

struct RegisteredPlugin {
    plugin: Arc<dyn Plugin>,
    endpoints: Vec<Arc<CommandEndpoint>>,
    message_handler: Option<MessageHandler>,
}

impl RegisteredPlugin {
    fn endpoint(&self, name: &str) -> Option<&Arc<CommandEndpoint>> {
        self.endpoints.iter().find(|e| e.name() == name)
    }
}

#[derive(Default)]
struct ManagerState {
    /// Registered plugins, keyed by lower-cased name.
    plugins: HashMap<String, RegisteredPlugin>,
    /// Filters keyed by the event-type ids they can match.
    type_index: HashMap<u32, Vec<Arc<Filter>>>,
    /// Filters keyed by the canonical rooms they can match. A filter with
    /// both room and type keys lives here; its type condition is re-checked
    /// by its own predicates at evaluation time.
    room_index: HashMap<String, Vec<Arc<Filter>>>,
    /// Filters with no index keys, evaluated for every event.
    global_filters: Vec<Arc<Filter>>,
    /// Per-room command map: room key → command name → target.
    commands: HashMap<String, HashMap<String, MappedCommand>>,
    /// Per-room enabled-plugin set: room key → lower-cased plugin names.
    enabled: HashMap<String, HashSet<String>>,
    /// Built-in command names; these can never be mapped to a plugin.
    reserved: HashSet<String>,
}

// ─── PluginManager ───────────────────────────────────────────────────────────

/// Central registry and router for plugins.
pub struct PluginManager {
    store: Arc<dyn PluginStore>,
    bans: Arc<dyn BanStore>,
    state: RwLock<ManagerState>,
}

impl PluginManager {
    /// Creates a manager backed by the given storage collaborators.
    pub fn new(store: Arc<dyn PluginStore>, bans: Arc<dyn BanStore>) -> PluginManager {
        PluginManager {
            store,
            bans,
            state: RwLock::new(ManagerState::default()),
        }
    }

    /// Reserves built-in command names so they can never be mapped.
    ///
    /// Called by the runtime once the built-in registry is sealed, before
    /// dispatch starts.
    pub fn reserve_command_names<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.state.write();
        state.reserved.extend(names.into_iter().map(Into::into));
    }

    // ─── Registration ────────────────────────────────────────────────────────

    /// Registers a plugin.
    ///
    /// The endpoint table is built and every declared filter is parsed and
    /// compiled before any shared state is touched, so a failure installs
    /// nothing; a corrected registration under the same name may follow.
    pub fn register_plugin(&self, plugin: Arc<dyn Plugin>) -> Result<(), RegistrationError> {
        let name = plugin.name().to_lowercase();

        let mut endpoints: Vec<Arc<CommandEndpoint>> = Vec::new();
        for endpoint in plugin.command_endpoints() {
            if endpoints.iter().any(|e| e.name() == endpoint.name()) {
                return Err(RegistrationError::new(
                    &name,
                    RegistrationErrorKind::DuplicateEndpoint(endpoint.name().to_string()),
                ));
            }
            endpoints.push(Arc::new(endpoint));
        }

        let mut filters: Vec<Arc<Filter>> = Vec::new();
        for (text, handler) in plugin.event_handlers() {
            match Filter::build(&name, &text, handler) {
                Ok(filter) => filters.push(Arc::new(filter)),
                Err(source) => {
                    return Err(RegistrationError::new(
                        &name,
                        RegistrationErrorKind::InvalidFilter { text, source },
                    ));
                }
            }
        }

        let message_handler = plugin.message_handler();

        let mut state = self.state.write();
        if state.plugins.contains_key(&name) {
            return Err(RegistrationError::new(
                &name,
                RegistrationErrorKind::AlreadyRegistered,
            ));
        }

        for filter in filters {
            if !filter.room_keys().is_empty() {
                // Room is the more selective key; filters constrained on
                // both axes are indexed by room only.
                for key in filter.room_keys() {
                    state
                        .room_index
                        .entry(key.clone())
                        .or_default()
                        .push(Arc::clone(&filter));
                }
            } else if !filter.type_keys().is_empty() {
                for key in filter.type_keys() {
                    state
                        .type_index
                        .entry(*key)
                        .or_default()
                        .push(Arc::clone(&filter));
                }
            } else {
                state.global_filters.push(Arc::clone(&filter));
            }
        }

        state.plugins.insert(
            name.clone(),
            RegisteredPlugin {
                plugin,
                endpoints,
                message_handler,
            },
        );
        info!(plugin = %name, "Plugin registered");
        Ok(())
    }

    // ─── Enable / disable ────────────────────────────────────────────────────

    /// Enables a plugin for a room and reconciles its command mappings.
    ///
    /// With no persisted mapping set, every endpoint's default command is
    /// installed and persisted; otherwise the persisted pairs are restored,
    /// silently dropping any that name endpoints the plugin no longer
    /// declares. When `persist` is set, the enabled flag is written to
    /// storage as well.
    pub async fn enable_plugin_for_room(
        &self,
        room: &RoomId,
        plugin_name: &str,
        persist: bool,
    ) -> Result<(), MappingError> {
        let name = plugin_name.to_lowercase();
        let plugin = {
            let state = self.state.read();
            let entry = state
                .plugins
                .get(&name)
                .ok_or_else(|| MappingError::UnknownPlugin(plugin_name.to_string()))?;
            Arc::clone(&entry.plugin)
        };

        if let Err(e) = plugin.enable_for_room(room, persist).await {
            warn!(plugin = %name, room = %room, error = %e, "enable_for_room hook failed");
        }

        self.state
            .write()
            .enabled
            .entry(room.to_string())
            .or_default()
            .insert(name.clone());
        info!(plugin = %name, room = %room, "Plugin enabled");

        match self.store.mapped_commands(room, &name).await {
            Ok(Some(persisted)) => self.restore_mappings(room, &name, persisted),
            Ok(None) => self.install_default_mappings(room, &name).await,
            Err(e) => {
                warn!(plugin = %name, room = %room, error = %e, "Failed to load persisted command mappings");
            }
        }

        if persist {
            if let Err(e) = self.store.set_plugin_enabled(room, &name, true).await {
                warn!(plugin = %name, room = %room, error = %e, "Failed to persist enabled flag");
            }
        }
        Ok(())
    }

    /// Restores a persisted `command → endpoint` set into memory.
    fn restore_mappings(&self, room: &RoomId, name: &str, persisted: HashMap<String, String>) {
        let state = &mut *self.state.write();
        let known: HashSet<&str> = state
            .plugins
            .get(name)
            .map(|entry| entry.endpoints.iter().map(|e| e.name()).collect())
            .unwrap_or_default();
        let reserved = &state.reserved;
        let room_map = state.commands.entry(room.to_string()).or_default();

        for (command, endpoint) in persisted {
            if !known.contains(endpoint.as_str()) {
                debug!(plugin = %name, command = %command, endpoint = %endpoint,
                    "Dropping persisted mapping to endpoint the plugin no longer declares");
                continue;
            }
            if reserved.contains(&command) || room_map.contains_key(&command) {
                warn!(plugin = %name, command = %command,
                    "Skipping persisted mapping that conflicts with an existing command");
                continue;
            }
            room_map.insert(
                command,
                MappedCommand {
                    plugin: name.to_string(),
                    endpoint,
                },
            );
        }
    }

    /// Installs and persists every endpoint's default command.
    async fn install_default_mappings(&self, room: &RoomId, name: &str) {
        let defaults: Vec<(String, String)> = {
            let state = self.state.read();
            state
                .plugins
                .get(name)
                .map(|entry| {
                    entry
                        .endpoints
                        .iter()
                        .filter_map(|e| {
                            e.default_command()
                                .map(|cmd| (cmd.to_string(), e.name().to_string()))
                        })
                        .collect()
                })
                .unwrap_or_default()
        };

        for (command, endpoint) in defaults {
            match self.try_map(room, name, &endpoint, &command) {
                Ok(()) => {
                    if let Err(e) = self
                        .store
                        .add_command_mapping(room, name, &command, &endpoint)
                        .await
                    {
                        warn!(plugin = %name, command = %command, error = %e,
                            "Failed to persist default command mapping");
                    }
                }
                Err(e) => {
                    warn!(plugin = %name, command = %command, error = %e,
                        "Skipping default command mapping");
                }
            }
        }
    }

    /// Disables a plugin for a room, removing all of its command mappings.
    ///
    /// Persisted mappings are kept so a later enable restores them.
    pub async fn disable_plugin_for_room(
        &self,
        room: &RoomId,
        plugin_name: &str,
        persist: bool,
    ) -> Result<(), MappingError> {
        let name = plugin_name.to_lowercase();
        let plugin = {
            let state = self.state.read();
            let entry = state
                .plugins
                .get(&name)
                .ok_or_else(|| MappingError::UnknownPlugin(plugin_name.to_string()))?;
            Arc::clone(&entry.plugin)
        };

        {
            let state = &mut *self.state.write();
            let key = room.to_string();
            if let Some(set) = state.enabled.get_mut(&key) {
                set.remove(&name);
            }
            if let Some(map) = state.commands.get_mut(&key) {
                map.retain(|_, target| target.plugin != name);
            }
        }

        if let Err(e) = plugin.disable_for_room(room, persist).await {
            warn!(plugin = %name, room = %room, error = %e, "disable_for_room hook failed");
        }

        if persist {
            if let Err(e) = self.store.set_plugin_enabled(room, &name, false).await {
                warn!(plugin = %name, room = %room, error = %e, "Failed to persist disabled flag");
            }
        }
        info!(plugin = %name, room = %room, "Plugin disabled");
        Ok(())
    }

    // ─── Command mapping ─────────────────────────────────────────────────────

    /// Checks precedence and inserts the mapping into memory.
    fn try_map(
        &self,
        room: &RoomId,
        plugin: &str,
        endpoint: &str,
        command: &str,
    ) -> Result<(), MappingError> {
        let state = &mut *self.state.write();
        if state.reserved.contains(command) {
            return Err(MappingError::BuiltIn(command.to_string()));
        }
        let entry = state
            .plugins
            .get(plugin)
            .ok_or_else(|| MappingError::UnknownPlugin(plugin.to_string()))?;
        let room_key = room.to_string();
        if !state
            .enabled
            .get(&room_key)
            .is_some_and(|set| set.contains(plugin))
        {
            return Err(MappingError::PluginNotEnabled {
                room: room.clone(),
                plugin: plugin.to_string(),
            });
        }
        if entry.endpoint(endpoint).is_none() {
            return Err(MappingError::UnknownEndpoint {
                plugin: plugin.to_string(),
                endpoint: endpoint.to_string(),
            });
        }
        let room_map = state.commands.entry(room_key).or_default();
        if room_map.contains_key(command) {
            return Err(MappingError::AlreadyMapped {
                room: room.clone(),
                command: command.to_string(),
            });
        }
        room_map.insert(
            command.to_string(),
            MappedCommand {
                plugin: plugin.to_string(),
                endpoint: endpoint.to_string(),
            },
        );
        Ok(())
    }

    /// Maps a chat command to a plugin endpoint in a room.
    pub async fn map_command_for_room(
        &self,
        room: &RoomId,
        plugin_name: &str,
        endpoint: &str,
        command: &str,
    ) -> Result<(), MappingError> {
        let name = plugin_name.to_lowercase();
        self.try_map(room, &name, endpoint, command)?;
        info!(room = %room, command = %command, plugin = %name, endpoint = %endpoint, "Command mapped");
        if let Err(e) = self
            .store
            .add_command_mapping(room, &name, command, endpoint)
            .await
        {
            warn!(room = %room, command = %command, error = %e, "Failed to persist command mapping");
        }
        Ok(())
    }

    /// Removes a command mapping from a room.
    pub async fn unmap_command_for_room(
        &self,
        room: &RoomId,
        command: &str,
    ) -> Result<MappedCommand, MappingError> {
        let removed = {
            let state = &mut *self.state.write();
            if state.reserved.contains(command) {
                return Err(MappingError::BuiltIn(command.to_string()));
            }
            state
                .commands
                .get_mut(&room.to_string())
                .and_then(|map| map.remove(command))
                .ok_or_else(|| MappingError::NotMapped {
                    room: room.clone(),
                    command: command.to_string(),
                })?
        };
        info!(room = %room, command = %command, plugin = %removed.plugin, "Command unmapped");
        if let Err(e) = self
            .store
            .remove_command_mapping(room, &removed.plugin, command)
            .await
        {
            warn!(room = %room, command = %command, error = %e, "Failed to persist command unmapping");
        }
        Ok(removed)
    }

    // ─── Queries ─────────────────────────────────────────────────────────────

    /// Whether the plugin is currently enabled in the room.
    pub fn is_plugin_enabled_for_room(&self, room: &RoomId, plugin: &str) -> bool {
        let name = plugin.to_lowercase();
        self.state
            .read()
            .enabled
            .get(&room.to_string())
            .is_some_and(|set| set.contains(&name))
    }

    /// Whether the command is mapped in the room.
    pub fn is_command_mapped_for_room(&self, room: &RoomId, command: &str) -> bool {
        self.mapped_command(room, command).is_some()
    }

    /// The target of a mapped command, if any.
    pub fn mapped_command(&self, room: &RoomId, command: &str) -> Option<MappedCommand> {
        self.state
            .read()
            .commands
            .get(&room.to_string())
            .and_then(|map| map.get(command))
            .cloned()
    }

    /// All mapped commands in a room, sorted by command name.
    pub fn mapped_commands_for_room(&self, room: &RoomId) -> BTreeMap<String, MappedCommand> {
        self.state
            .read()
            .commands
            .get(&room.to_string())
            .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }

    /// Names of all registered plugins, sorted.
    pub fn plugin_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.read().plugins.keys().cloned().collect();
        names.sort();
        names
    }

    /// Whether a plugin with this name is registered.
    pub fn is_plugin_registered(&self, plugin: &str) -> bool {
        self.state
            .read()
            .plugins
            .contains_key(&plugin.to_lowercase())
    }

    /// Description of a registered plugin.
    pub fn plugin_description(&self, plugin: &str) -> Option<String> {
        self.state
            .read()
            .plugins
            .get(&plugin.to_lowercase())
            .map(|entry| entry.plugin.description().to_string())
    }

    // ─── Dispatch lookups ────────────────────────────────────────────────────

    /// Invokes every enabled filter whose predicates match `event`.
    ///
    /// Candidates come from the type index, the room index (room-sourced
    /// events), and the unindexed list; each candidate's full predicate
    /// conjunction is re-verified before its handler runs. Handlers run
    /// concurrently; failures are logged and never propagate.
    pub async fn invoke_handlers_for_event(&self, event: &Arc<Event>) {
        let room_key = event.room().map(RoomId::to_string);
        let candidates: Vec<Arc<Filter>> = {
            let state = self.state.read();
            let mut candidates: Vec<Arc<Filter>> = Vec::new();
            if let Some(filters) = state.type_index.get(&event.type_id()) {
                candidates.extend(filters.iter().cloned());
            }
            if let Some(key) = &room_key
                && let Some(filters) = state.room_index.get(key)
            {
                candidates.extend(filters.iter().cloned());
            }
            candidates.extend(state.global_filters.iter().cloned());

            // Room-sourced events only fire filters of plugins enabled in
            // that room; global events bypass this gate.
            if let Some(key) = &room_key {
                let enabled = state.enabled.get(key);
                candidates.retain(|f| enabled.is_some_and(|set| set.contains(f.plugin())));
            }
            candidates
        };

        let matching: Vec<Arc<Filter>> = candidates
            .into_iter()
            .filter(|f| f.matches(event))
            .collect();
        if matching.is_empty() {
            return;
        }

        let results =
            future::join_all(matching.iter().map(|f| f.invoke(Arc::clone(event)))).await;
        for (filter, result) in matching.iter().zip(results) {
            if let Err(e) = result {
                error!(
                    event_id = event.id(),
                    plugin = %filter.plugin(),
                    filter = %filter.text(),
                    error = %e,
                    "Event handler failed"
                );
            }
        }
    }

    /// Invokes the message handlers of every plugin enabled in the event's
    /// room. No-op for events without message content.
    pub async fn invoke_message_handlers(&self, event: &Arc<Event>) {
        if event.message().is_none() {
            return;
        }
        let Some(room) = event.room() else {
            return;
        };
        let key = room.to_string();

        let handlers: Vec<(String, MessageHandler)> = {
            let state = self.state.read();
            match state.enabled.get(&key) {
                Some(enabled) => state
                    .plugins
                    .iter()
                    .filter(|(name, _)| enabled.contains(name.as_str()))
                    .filter_map(|(name, entry)| {
                        entry.message_handler.clone().map(|h| (name.clone(), h))
                    })
                    .collect(),
                None => Vec::new(),
            }
        };
        if handlers.is_empty() {
            return;
        }

        let results =
            future::join_all(handlers.iter().map(|(_, h)| h(Arc::clone(event)))).await;
        for ((plugin, _), result) in handlers.iter().zip(results) {
            if let Err(e) = result {
                error!(
                    event_id = event.id(),
                    plugin = %plugin,
                    error = %e,
                    "Message handler failed"
                );
            }
        }
    }

    /// Invokes the endpoint a command is mapped to, if any.
    ///
    /// Absent mappings are a no-op. Banned users are silently ignored.
    pub async fn invoke_handler_for_command(&self, command: &Command) {
        let lookup = {
            let state = self.state.read();
            state
                .commands
                .get(&command.room().to_string())
                .and_then(|map| map.get(command.name()))
                .and_then(|target| {
                    state
                        .plugins
                        .get(&target.plugin)
                        .and_then(|entry| entry.endpoint(&target.endpoint))
                        .map(|endpoint| (target.clone(), Arc::clone(endpoint)))
                })
        };
        let Some((target, endpoint)) = lookup else {
            return;
        };

        match self.bans.is_banned(command.room(), command.user_id()).await {
            Ok(true) => {
                debug!(
                    user_id = command.user_id(),
                    room = %command.room(),
                    "Ignoring command from banned user"
                );
                return;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(error = %e, "Ban check failed; allowing command");
            }
        }

        if let Err(e) = endpoint.invoke(command.clone()).await {
            error!(
                event_id = command.event().id(),
                plugin = %target.plugin,
                endpoint = %target.endpoint,
                command = %command.name(),
                error = %e,
                "Command endpoint failed"
            );
        }
    }
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("PluginManager")
            .field("plugins", &state.plugins.len())
            .field("type_index", &state.type_index.len())
            .field("room_index", &state.room_index.len())
            .field("global_filters", &state.global_filters.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use banter_core::event::types;
    use banter_core::{MemoryBanStore, MemoryPluginStore, StorageError};

    use crate::error::RegistrationErrorKind;
    use crate::handler::{EventHandler, command_handler, event_handler, message_handler};

    // ─── Fixtures ────────────────────────────────────────────────────────────

    /// Wraps the in-memory store and records every persistence call.
    struct RecordingStore {
        inner: MemoryPluginStore,
        ops: Mutex<Vec<String>>,
    }

    impl RecordingStore {
        fn new() -> Arc<RecordingStore> {
            Arc::new(RecordingStore {
                inner: MemoryPluginStore::new(),
                ops: Mutex::new(Vec::new()),
            })
        }

        fn ops(&self) -> Vec<String> {
            self.ops.lock().clone()
        }

        /// Pre-populates a persisted mapping without recording an op.
        async fn seed(&self, room: &RoomId, plugin: &str, command: &str, endpoint: &str) {
            self.inner
                .add_command_mapping(room, plugin, command, endpoint)
                .await
                .unwrap();
        }
    }

    #[async_trait]
    impl PluginStore for RecordingStore {
        async fn is_plugin_enabled(
            &self,
            room: &RoomId,
            plugin: &str,
        ) -> Result<bool, StorageError> {
            self.inner.is_plugin_enabled(room, plugin).await
        }

        async fn set_plugin_enabled(
            &self,
            room: &RoomId,
            plugin: &str,
            enabled: bool,
        ) -> Result<(), StorageError> {
            self.ops.lock().push(format!("enabled:{plugin}:{enabled}"));
            self.inner.set_plugin_enabled(room, plugin, enabled).await
        }

        async fn mapped_commands(
            &self,
            room: &RoomId,
            plugin: &str,
        ) -> Result<Option<HashMap<String, String>>, StorageError> {
            self.inner.mapped_commands(room, plugin).await
        }

        async fn add_command_mapping(
            &self,
            room: &RoomId,
            plugin: &str,
            command: &str,
            endpoint: &str,
        ) -> Result<(), StorageError> {
            self.ops.lock().push(format!("add:{command}"));
            self.inner
                .add_command_mapping(room, plugin, command, endpoint)
                .await
        }

        async fn remove_command_mapping(
            &self,
            room: &RoomId,
            plugin: &str,
            command: &str,
        ) -> Result<(), StorageError> {
            self.ops.lock().push(format!("remove:{command}"));
            self.inner.remove_command_mapping(room, plugin, command).await
        }
    }

    /// Configurable plugin whose handlers bump atomic counters.
    struct TestPlugin {
        name: String,
        endpoints: Vec<(String, Option<String>)>,
        filters: Vec<String>,
        has_message_handler: bool,
        failing: bool,
        command_calls: Arc<AtomicUsize>,
        event_calls: Arc<AtomicUsize>,
        message_calls: Arc<AtomicUsize>,
    }

    impl TestPlugin {
        fn new(name: &str) -> TestPlugin {
            TestPlugin {
                name: name.to_string(),
                endpoints: Vec::new(),
                filters: Vec::new(),
                has_message_handler: false,
                failing: false,
                command_calls: Arc::new(AtomicUsize::new(0)),
                event_calls: Arc::new(AtomicUsize::new(0)),
                message_calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn endpoint(mut self, name: &str, default_command: Option<&str>) -> TestPlugin {
            self.endpoints
                .push((name.to_string(), default_command.map(str::to_string)));
            self
        }

        fn filter(mut self, text: &str) -> TestPlugin {
            self.filters.push(text.to_string());
            self
        }

        fn with_message_handler(mut self) -> TestPlugin {
            self.has_message_handler = true;
            self
        }

        /// Makes every handler return an error after counting the call.
        fn failing(mut self) -> TestPlugin {
            self.failing = true;
            self
        }

        fn counters(&self) -> (Arc<AtomicUsize>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
            (
                Arc::clone(&self.command_calls),
                Arc::clone(&self.event_calls),
                Arc::clone(&self.message_calls),
            )
        }
    }

    fn counted(
        calls: &Arc<AtomicUsize>,
        failing: bool,
    ) -> impl Fn() -> Result<(), banter_core::BoxError> + Send + Sync + Clone + 'static {
        let calls = Arc::clone(calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            if failing { Err("boom".into()) } else { Ok(()) }
        }
    }

    #[async_trait]
    impl Plugin for TestPlugin {
        fn name(&self) -> &str {
            &self.name
        }

        fn command_endpoints(&self) -> Vec<CommandEndpoint> {
            self.endpoints
                .iter()
                .map(|(name, default)| {
                    let count = counted(&self.command_calls, self.failing);
                    let mut endpoint =
                        CommandEndpoint::new(name, command_handler(move |_| {
                            let count = count.clone();
                            async move { count() }
                        }));
                    if let Some(command) = default {
                        endpoint = endpoint.with_default_command(command);
                    }
                    endpoint
                })
                .collect()
        }

        fn event_handlers(&self) -> Vec<(String, EventHandler)> {
            self.filters
                .iter()
                .map(|text| {
                    let count = counted(&self.event_calls, self.failing);
                    let handler = event_handler(move |_| {
                        let count = count.clone();
                        async move { count() }
                    });
                    (text.clone(), handler)
                })
                .collect()
        }

        fn message_handler(&self) -> Option<MessageHandler> {
            if !self.has_message_handler {
                return None;
            }
            let count = counted(&self.message_calls, self.failing);
            Some(message_handler(move |_| {
                let count = count.clone();
                async move { count() }
            }))
        }
    }

    fn room() -> RoomId {
        RoomId::new("chat.example.com", 11)
    }

    fn other_room() -> RoomId {
        RoomId::new("chat.example.com", 22)
    }

    fn message_event(room: &RoomId, content: &str) -> Arc<Event> {
        Event::builder(types::MESSAGE_POSTED, 1)
            .room(room.clone())
            .user(5, "alice")
            .message(100, content)
            .build_shared()
    }

    fn command(room: &RoomId, content: &str) -> Command {
        Command::from_event(&message_event(room, content)).unwrap()
    }

    fn manager_with(store: Arc<RecordingStore>) -> (Arc<PluginManager>, Arc<MemoryBanStore>) {
        let bans = Arc::new(MemoryBanStore::new());
        let manager = Arc::new(PluginManager::new(store, Arc::clone(&bans) as _));
        (manager, bans)
    }

    // ─── Registration ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn duplicate_endpoint_aborts_registration_atomically() {
        let (manager, _) = manager_with(RecordingStore::new());

        let bad = TestPlugin::new("jokes")
            .endpoint("random", None)
            .endpoint("random", None);
        let err = manager.register_plugin(Arc::new(bad)).unwrap_err();
        assert!(matches!(
            err.kind(),
            RegistrationErrorKind::DuplicateEndpoint(name) if name == "random"
        ));
        assert!(!manager.is_plugin_registered("jokes"));

        // The failed attempt left nothing behind; a corrected registration
        // under the same name succeeds.
        let good = TestPlugin::new("jokes").endpoint("random", None);
        manager.register_plugin(Arc::new(good)).unwrap();
        assert!(manager.is_plugin_registered("jokes"));
    }

    #[tokio::test]
    async fn invalid_filter_aborts_registration() {
        let (manager, _) = manager_with(RecordingStore::new());

        let bad = TestPlugin::new("watch").filter("type=1").filter("type=");
        let err = manager.register_plugin(Arc::new(bad)).unwrap_err();
        assert!(matches!(
            err.kind(),
            RegistrationErrorKind::InvalidFilter { text, .. } if text == "type="
        ));
        assert!(!manager.is_plugin_registered("watch"));

        // No filter from the failed attempt fires.
        let event = Event::builder(1, 1).room(room()).build_shared();
        manager.invoke_handlers_for_event(&event).await;
    }

    #[tokio::test]
    async fn reregistering_a_live_plugin_is_rejected() {
        let (manager, _) = manager_with(RecordingStore::new());
        manager
            .register_plugin(Arc::new(TestPlugin::new("jokes")))
            .unwrap();
        let err = manager
            .register_plugin(Arc::new(TestPlugin::new("Jokes")))
            .unwrap_err();
        assert!(matches!(
            err.kind(),
            RegistrationErrorKind::AlreadyRegistered
        ));
    }

    // ─── Enable / disable ────────────────────────────────────────────────────

    #[tokio::test]
    async fn enable_installs_and_persists_default_commands() {
        let store = RecordingStore::new();
        let (manager, _) = manager_with(Arc::clone(&store));

        let plugin = TestPlugin::new("jokes")
            .endpoint("random", Some("joke"))
            .endpoint("knock", None);
        manager.register_plugin(Arc::new(plugin)).unwrap();

        manager
            .enable_plugin_for_room(&room(), "jokes", true)
            .await
            .unwrap();

        assert!(manager.is_plugin_enabled_for_room(&room(), "jokes"));
        assert_eq!(
            manager.mapped_command(&room(), "joke"),
            Some(MappedCommand {
                plugin: "jokes".into(),
                endpoint: "random".into()
            })
        );
        // Endpoints without a default command map nothing.
        assert_eq!(manager.mapped_commands_for_room(&room()).len(), 1);
        // One persisted add for the default plus the enabled flag.
        assert_eq!(store.ops(), vec!["add:joke", "enabled:jokes:true"]);
    }

    #[tokio::test]
    async fn enable_restores_persisted_mappings_and_drops_stale_endpoints() {
        let store = RecordingStore::new();
        store.seed(&room(), "jokes", "laugh", "random").await;
        store.seed(&room(), "jokes", "old", "removed_endpoint").await;
        let (manager, _) = manager_with(Arc::clone(&store));

        let plugin = TestPlugin::new("jokes").endpoint("random", Some("joke"));
        manager.register_plugin(Arc::new(plugin)).unwrap();
        manager
            .enable_plugin_for_room(&room(), "jokes", false)
            .await
            .unwrap();

        // The persisted set wins over defaults, stale endpoints are dropped,
        // and restoring issues no persistence writes.
        assert!(manager.is_command_mapped_for_room(&room(), "laugh"));
        assert!(!manager.is_command_mapped_for_room(&room(), "joke"));
        assert!(!manager.is_command_mapped_for_room(&room(), "old"));
        assert!(store.ops().is_empty());
    }

    #[tokio::test]
    async fn disable_removes_only_that_plugins_mappings() {
        let (manager, _) = manager_with(RecordingStore::new());
        manager
            .register_plugin(Arc::new(
                TestPlugin::new("jokes").endpoint("random", Some("joke")),
            ))
            .unwrap();
        manager
            .register_plugin(Arc::new(
                TestPlugin::new("search").endpoint("web", Some("find")),
            ))
            .unwrap();
        manager
            .enable_plugin_for_room(&room(), "jokes", false)
            .await
            .unwrap();
        manager
            .enable_plugin_for_room(&room(), "search", false)
            .await
            .unwrap();

        manager
            .disable_plugin_for_room(&room(), "jokes", false)
            .await
            .unwrap();

        assert!(!manager.is_plugin_enabled_for_room(&room(), "jokes"));
        assert!(!manager.is_command_mapped_for_room(&room(), "joke"));
        assert!(manager.is_plugin_enabled_for_room(&room(), "search"));
        assert!(manager.is_command_mapped_for_room(&room(), "find"));
    }

    // ─── Command mapping ─────────────────────────────────────────────────────

    #[tokio::test]
    async fn map_unmap_round_trip_persists_each_exactly_once() {
        let store = RecordingStore::new();
        let (manager, _) = manager_with(Arc::clone(&store));
        manager
            .register_plugin(Arc::new(TestPlugin::new("jokes").endpoint("random", None)))
            .unwrap();
        manager
            .enable_plugin_for_room(&room(), "jokes", false)
            .await
            .unwrap();

        manager
            .map_command_for_room(&room(), "jokes", "random", "laugh")
            .await
            .unwrap();
        assert!(manager.is_command_mapped_for_room(&room(), "laugh"));

        let removed = manager
            .unmap_command_for_room(&room(), "laugh")
            .await
            .unwrap();
        assert_eq!(removed.plugin, "jokes");
        assert!(!manager.is_command_mapped_for_room(&room(), "laugh"));
        assert_eq!(store.ops(), vec!["add:laugh", "remove:laugh"]);
    }

    #[tokio::test]
    async fn built_in_names_always_win_mapping_precedence() {
        let (manager, _) = manager_with(RecordingStore::new());
        manager.reserve_command_names(["help"]);

        // Fails with the built-in error even though the plugin and endpoint
        // do not exist at all.
        let err = manager
            .map_command_for_room(&room(), "ghost", "nowhere", "help")
            .await
            .unwrap_err();
        assert_eq!(err, MappingError::BuiltIn("help".into()));

        let err = manager.unmap_command_for_room(&room(), "help").await.unwrap_err();
        assert_eq!(err, MappingError::BuiltIn("help".into()));
    }

    #[tokio::test]
    async fn mapping_validates_plugin_endpoint_and_state() {
        let (manager, _) = manager_with(RecordingStore::new());
        manager
            .register_plugin(Arc::new(TestPlugin::new("jokes").endpoint("random", None)))
            .unwrap();

        assert!(matches!(
            manager
                .map_command_for_room(&room(), "ghost", "random", "x")
                .await,
            Err(MappingError::UnknownPlugin(_))
        ));
        assert!(matches!(
            manager
                .map_command_for_room(&room(), "jokes", "random", "x")
                .await,
            Err(MappingError::PluginNotEnabled { .. })
        ));

        manager
            .enable_plugin_for_room(&room(), "jokes", false)
            .await
            .unwrap();
        assert!(matches!(
            manager
                .map_command_for_room(&room(), "jokes", "nope", "x")
                .await,
            Err(MappingError::UnknownEndpoint { .. })
        ));

        manager
            .map_command_for_room(&room(), "jokes", "random", "x")
            .await
            .unwrap();
        assert!(matches!(
            manager
                .map_command_for_room(&room(), "jokes", "random", "x")
                .await,
            Err(MappingError::AlreadyMapped { .. })
        ));

        assert!(matches!(
            manager.unmap_command_for_room(&room(), "unused").await,
            Err(MappingError::NotMapped { .. })
        ));
    }

    // ─── Event dispatch ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn dispatch_invokes_exactly_the_matching_enabled_filters() {
        let (manager, _) = manager_with(RecordingStore::new());

        let by_type = TestPlugin::new("by_type").filter("type=any(1,2)");
        let (_, by_type_events, _) = by_type.counters();
        let wrong_type = TestPlugin::new("wrong_type").filter("type=4");
        let (_, wrong_type_events, _) = wrong_type.counters();
        let unindexed = TestPlugin::new("unindexed").filter("class=any(user,room)");
        let (_, unindexed_events, _) = unindexed.counters();
        let disabled = TestPlugin::new("disabled").filter("type=1");
        let (_, disabled_events, _) = disabled.counters();

        for plugin in [by_type, wrong_type, unindexed] {
            let name = plugin.name.clone();
            manager.register_plugin(Arc::new(plugin)).unwrap();
            manager
                .enable_plugin_for_room(&room(), &name, false)
                .await
                .unwrap();
        }
        manager.register_plugin(Arc::new(disabled)).unwrap();

        let event = Event::builder(1, 10)
            .room(room())
            .user(5, "alice")
            .build_shared();
        manager.invoke_handlers_for_event(&event).await;

        assert_eq!(by_type_events.load(Ordering::SeqCst), 1);
        assert_eq!(unindexed_events.load(Ordering::SeqCst), 1);
        assert_eq!(wrong_type_events.load(Ordering::SeqCst), 0);
        assert_eq!(disabled_events.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn global_events_bypass_the_enabled_gate() {
        let (manager, _) = manager_with(RecordingStore::new());
        let plugin = TestPlugin::new("invites").filter("type=17&class=global");
        let (_, events, _) = plugin.counters();
        manager.register_plugin(Arc::new(plugin)).unwrap();

        // Never enabled anywhere, yet the global event still fires it.
        let event = Event::builder(types::INVITATION, 3).user(5, "alice").build_shared();
        manager.invoke_handlers_for_event(&event).await;
        assert_eq!(events.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn indexed_filter_with_failing_extra_condition_does_not_fire() {
        let (manager, _) = manager_with(RecordingStore::new());
        let plugin = TestPlugin::new("strict").filter("type=1&class=message");
        let (_, events, _) = plugin.counters();
        manager.register_plugin(Arc::new(plugin)).unwrap();
        manager
            .enable_plugin_for_room(&room(), "strict", false)
            .await
            .unwrap();

        // Found through the type index, but the class condition fails.
        let bare = Event::builder(1, 4).room(room()).build_shared();
        manager.invoke_handlers_for_event(&bare).await;
        assert_eq!(events.load(Ordering::SeqCst), 0);

        manager
            .invoke_handlers_for_event(&message_event(&room(), "hi"))
            .await;
        assert_eq!(events.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn room_indexed_filters_fire_only_in_their_rooms() {
        let (manager, _) = manager_with(RecordingStore::new());
        let plugin = TestPlugin::new("local").filter("room=chat.example.com#11&type=1");
        let (_, events, _) = plugin.counters();
        manager.register_plugin(Arc::new(plugin)).unwrap();
        for r in [room(), other_room()] {
            manager
                .enable_plugin_for_room(&r, "local", false)
                .await
                .unwrap();
        }

        manager
            .invoke_handlers_for_event(&Event::builder(1, 1).room(room()).build_shared())
            .await;
        assert_eq!(events.load(Ordering::SeqCst), 1);

        // Wrong type in the right room.
        manager
            .invoke_handlers_for_event(&Event::builder(2, 2).room(room()).build_shared())
            .await;
        assert_eq!(events.load(Ordering::SeqCst), 1);

        // Right type in the wrong room.
        manager
            .invoke_handlers_for_event(&Event::builder(1, 3).room(other_room()).build_shared())
            .await;
        assert_eq!(events.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failing_handlers_do_not_block_siblings() {
        let (manager, _) = manager_with(RecordingStore::new());
        let broken = TestPlugin::new("broken").filter("type=1").failing();
        let (_, broken_events, _) = broken.counters();
        let healthy = TestPlugin::new("healthy").filter("type=1");
        let (_, healthy_events, _) = healthy.counters();

        for plugin in [broken, healthy] {
            let name = plugin.name.clone();
            manager.register_plugin(Arc::new(plugin)).unwrap();
            manager
                .enable_plugin_for_room(&room(), &name, false)
                .await
                .unwrap();
        }

        let event = Event::builder(1, 9).room(room()).build_shared();
        manager.invoke_handlers_for_event(&event).await;
        manager.invoke_handlers_for_event(&event).await;

        assert_eq!(broken_events.load(Ordering::SeqCst), 2);
        assert_eq!(healthy_events.load(Ordering::SeqCst), 2);
    }

    // ─── Command dispatch ────────────────────────────────────────────────────

    #[tokio::test]
    async fn command_dispatch_invokes_mapped_endpoint() {
        let (manager, _) = manager_with(RecordingStore::new());
        let plugin = TestPlugin::new("jokes").endpoint("random", Some("joke"));
        let (commands, _, _) = plugin.counters();
        manager.register_plugin(Arc::new(plugin)).unwrap();
        manager
            .enable_plugin_for_room(&room(), "jokes", false)
            .await
            .unwrap();

        manager
            .invoke_handler_for_command(&command(&room(), "!!joke"))
            .await;
        assert_eq!(commands.load(Ordering::SeqCst), 1);

        // Unmapped command names are a no-op.
        manager
            .invoke_handler_for_command(&command(&room(), "!!unknown"))
            .await;
        assert_eq!(commands.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn banned_users_are_silently_ignored_for_commands_only() {
        let (manager, bans) = manager_with(RecordingStore::new());
        let plugin = TestPlugin::new("jokes")
            .endpoint("random", Some("joke"))
            .filter("type=1");
        let (commands, events, _) = plugin.counters();
        manager.register_plugin(Arc::new(plugin)).unwrap();
        manager
            .enable_plugin_for_room(&room(), "jokes", false)
            .await
            .unwrap();

        bans.ban(&room(), 5);

        let event = message_event(&room(), "!!joke");
        manager
            .invoke_handler_for_command(&Command::from_event(&event).unwrap())
            .await;
        // Ban gating is command-specific: the event filter still fires.
        manager.invoke_handlers_for_event(&event).await;

        assert_eq!(commands.load(Ordering::SeqCst), 0);
        assert_eq!(events.load(Ordering::SeqCst), 1);
    }

    // ─── Message handlers ────────────────────────────────────────────────────

    #[tokio::test]
    async fn message_handlers_fire_only_where_enabled() {
        let (manager, _) = manager_with(RecordingStore::new());
        let plugin = TestPlugin::new("lurker").with_message_handler();
        let (_, _, messages) = plugin.counters();
        manager.register_plugin(Arc::new(plugin)).unwrap();
        manager
            .enable_plugin_for_room(&room(), "lurker", false)
            .await
            .unwrap();

        manager
            .invoke_message_handlers(&message_event(&room(), "hello"))
            .await;
        assert_eq!(messages.load(Ordering::SeqCst), 1);

        manager
            .invoke_message_handlers(&message_event(&other_room(), "hello"))
            .await;
        assert_eq!(messages.load(Ordering::SeqCst), 1);

        // Non-message events are ignored outright.
        manager
            .invoke_message_handlers(&Event::builder(3, 1).room(room()).build_shared())
            .await;
        assert_eq!(messages.load(Ordering::SeqCst), 1);
    }
}

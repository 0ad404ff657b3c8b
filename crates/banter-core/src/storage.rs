//! Storage collaborator contracts.
//!
//! The engine never touches disk itself; it talks to two async storage
//! seams. [`BanStore`] answers "may this user run commands here", and
//! [`PluginStore`] persists the per-room plugin-enabled flags and
//! command-to-endpoint mappings so they survive restarts.
//!
//! All keys are the canonical room identifier string and the lower-cased
//! plugin name. Implementations backed by files or databases live outside
//! this crate; the in-memory implementations below back tests and the
//! default runtime wiring.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::StorageError;
use crate::room::RoomId;

// ============================================================================
// Contracts
// ============================================================================

/// Read access to the ban list.
#[async_trait]
pub trait BanStore: Send + Sync {
    /// Whether `user_id` is banned from interacting with the bot in `room`.
    async fn is_banned(&self, room: &RoomId, user_id: u64) -> Result<bool, StorageError>;
}

/// Persistence for per-room plugin state.
#[async_trait]
pub trait PluginStore: Send + Sync {
    /// Whether the plugin was persisted as enabled for the room.
    async fn is_plugin_enabled(&self, room: &RoomId, plugin: &str)
    -> Result<bool, StorageError>;

    /// Persists the enabled/disabled flag for the plugin in the room.
    async fn set_plugin_enabled(
        &self,
        room: &RoomId,
        plugin: &str,
        enabled: bool,
    ) -> Result<(), StorageError>;

    /// Returns the persisted `command → endpoint` map for `(room, plugin)`.
    ///
    /// `None` means no mapping set was ever persisted for the pair, which
    /// tells the caller to fall back to the plugin's default commands;
    /// `Some` (possibly empty) means a set exists and must be restored
    /// verbatim.
    async fn mapped_commands(
        &self,
        room: &RoomId,
        plugin: &str,
    ) -> Result<Option<HashMap<String, String>>, StorageError>;

    /// Persists one `command → endpoint` mapping.
    async fn add_command_mapping(
        &self,
        room: &RoomId,
        plugin: &str,
        command: &str,
        endpoint: &str,
    ) -> Result<(), StorageError>;

    /// Removes one persisted command mapping.
    async fn remove_command_mapping(
        &self,
        room: &RoomId,
        plugin: &str,
        command: &str,
    ) -> Result<(), StorageError>;
}

// ============================================================================
// In-memory implementations
// ============================================================================

fn plugin_key(room: &RoomId, plugin: &str) -> (String, String) {
    (room.to_string(), plugin.to_lowercase())
}

/// In-memory [`BanStore`]. Bans are per `(room, user)` pair.
#[derive(Default)]
pub struct MemoryBanStore {
    banned: RwLock<HashSet<(String, u64)>>,
}

impl MemoryBanStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `user_id` as banned in `room`.
    pub fn ban(&self, room: &RoomId, user_id: u64) {
        self.banned.write().insert((room.to_string(), user_id));
    }

    /// Lifts a ban.
    pub fn unban(&self, room: &RoomId, user_id: u64) {
        self.banned.write().remove(&(room.to_string(), user_id));
    }
}

#[async_trait]
impl BanStore for MemoryBanStore {
    async fn is_banned(&self, room: &RoomId, user_id: u64) -> Result<bool, StorageError> {
        Ok(self.banned.read().contains(&(room.to_string(), user_id)))
    }
}

/// In-memory [`PluginStore`].
#[derive(Default)]
pub struct MemoryPluginStore {
    enabled: RwLock<HashSet<(String, String)>>,
    mappings: RwLock<HashMap<(String, String), HashMap<String, String>>>,
}

impl MemoryPluginStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PluginStore for MemoryPluginStore {
    async fn is_plugin_enabled(
        &self,
        room: &RoomId,
        plugin: &str,
    ) -> Result<bool, StorageError> {
        Ok(self.enabled.read().contains(&plugin_key(room, plugin)))
    }

    async fn set_plugin_enabled(
        &self,
        room: &RoomId,
        plugin: &str,
        enabled: bool,
    ) -> Result<(), StorageError> {
        let key = plugin_key(room, plugin);
        if enabled {
            self.enabled.write().insert(key);
        } else {
            self.enabled.write().remove(&key);
        }
        Ok(())
    }

    async fn mapped_commands(
        &self,
        room: &RoomId,
        plugin: &str,
    ) -> Result<Option<HashMap<String, String>>, StorageError> {
        Ok(self.mappings.read().get(&plugin_key(room, plugin)).cloned())
    }

    async fn add_command_mapping(
        &self,
        room: &RoomId,
        plugin: &str,
        command: &str,
        endpoint: &str,
    ) -> Result<(), StorageError> {
        self.mappings
            .write()
            .entry(plugin_key(room, plugin))
            .or_default()
            .insert(command.to_string(), endpoint.to_string());
        Ok(())
    }

    async fn remove_command_mapping(
        &self,
        room: &RoomId,
        plugin: &str,
        command: &str,
    ) -> Result<(), StorageError> {
        if let Some(map) = self.mappings.write().get_mut(&plugin_key(room, plugin)) {
            map.remove(command);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> RoomId {
        RoomId::new("chat.example.com", 11)
    }

    #[tokio::test]
    async fn ban_store_round_trip() {
        let store = MemoryBanStore::new();
        assert!(!store.is_banned(&room(), 5).await.unwrap());
        store.ban(&room(), 5);
        assert!(store.is_banned(&room(), 5).await.unwrap());
        store.unban(&room(), 5);
        assert!(!store.is_banned(&room(), 5).await.unwrap());
    }

    #[tokio::test]
    async fn plugin_store_keys_are_case_insensitive() {
        let store = MemoryPluginStore::new();
        store.set_plugin_enabled(&room(), "Jokes", true).await.unwrap();
        assert!(store.is_plugin_enabled(&room(), "jokes").await.unwrap());
    }

    #[tokio::test]
    async fn absent_mapping_set_is_none_not_empty() {
        let store = MemoryPluginStore::new();
        assert!(store.mapped_commands(&room(), "jokes").await.unwrap().is_none());

        store
            .add_command_mapping(&room(), "jokes", "joke", "random")
            .await
            .unwrap();
        let map = store.mapped_commands(&room(), "jokes").await.unwrap().unwrap();
        assert_eq!(map.get("joke").map(String::as_str), Some("random"));

        store
            .remove_command_mapping(&room(), "jokes", "joke")
            .await
            .unwrap();
        // The set still exists once touched; it is just empty now.
        let map = store.mapped_commands(&room(), "jokes").await.unwrap().unwrap();
        assert!(map.is_empty());
    }
}

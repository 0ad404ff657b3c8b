//! The `plugin` built-in: per-room plugin administration.
//!
//! ```text
//! !!plugin list
//! !!plugin status <name>
//! !!plugin enable <name>
//! !!plugin disable <name>
//! ```
//!
//! Enable and disable persist the room's flag so it survives restarts.

use std::sync::Arc;

use async_trait::async_trait;

use banter_core::{BoxError, Command, Responder, RoomId};

use super::BuiltInCommand;
use crate::manager::PluginManager;

const USAGE: &str = "usage: !!plugin list | status <name> | enable <name> | disable <name>";

/// Administers per-room plugin state through the [`PluginManager`].
pub struct PluginAdmin {
    plugins: Arc<PluginManager>,
    responder: Arc<dyn Responder>,
}

impl PluginAdmin {
    /// Creates the built-in.
    pub fn new(plugins: Arc<PluginManager>, responder: Arc<dyn Responder>) -> PluginAdmin {
        PluginAdmin { plugins, responder }
    }

    fn list(&self, room: &RoomId) -> String {
        let names = self.plugins.plugin_names();
        if names.is_empty() {
            return "No plugins are registered.".to_string();
        }
        names
            .iter()
            .map(|name| {
                let marker = if self.plugins.is_plugin_enabled_for_room(room, name) {
                    "enabled"
                } else {
                    "disabled"
                };
                format!("{name} [{marker}]")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn status(&self, room: &RoomId, name: &str) -> String {
        if !self.plugins.is_plugin_registered(name) {
            return format!("unknown plugin '{name}'");
        }
        let enabled = self.plugins.is_plugin_enabled_for_room(room, name);
        let commands: Vec<String> = self
            .plugins
            .mapped_commands_for_room(room)
            .into_iter()
            .filter(|(_, target)| target.plugin == name.to_lowercase())
            .map(|(command, target)| format!("{command} -> {}", target.endpoint))
            .collect();

        let mut lines = vec![format!(
            "{name}: {}",
            if enabled { "enabled" } else { "disabled" }
        )];
        if let Some(description) = self.plugins.plugin_description(name)
            && !description.is_empty()
        {
            lines.push(description);
        }
        if !commands.is_empty() {
            lines.push(format!("commands: {}", commands.join(", ")));
        }
        lines.join("\n")
    }
}

#[async_trait]
impl BuiltInCommand for PluginAdmin {
    fn command_names(&self) -> Vec<String> {
        vec!["plugin".to_string()]
    }

    fn description(&self) -> &str {
        "List, inspect, enable, and disable plugins for this room"
    }

    async fn handle_command(&self, command: &Command) -> Result<(), BoxError> {
        let room = command.room();
        let reply = match command.parameters() {
            [sub] if sub == "list" => self.list(room),
            [sub, name] if sub == "status" => self.status(room, name),
            [sub, name] if sub == "enable" => {
                match self.plugins.enable_plugin_for_room(room, name, true).await {
                    Ok(()) => format!("Plugin '{name}' enabled."),
                    Err(e) => e.to_string(),
                }
            }
            [sub, name] if sub == "disable" => {
                match self.plugins.disable_plugin_for_room(room, name, true).await {
                    Ok(()) => format!("Plugin '{name}' disabled."),
                    Err(e) => e.to_string(),
                }
            }
            _ => USAGE.to_string(),
        };
        self.responder.post_message(room, &reply).await
    }
}

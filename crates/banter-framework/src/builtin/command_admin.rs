//! The `command` built-in: room command-mapping administration.
//!
//! ```text
//! !!command list
//! !!command map <command> <plugin> <endpoint>
//! !!command unmap <command>
//! !!command clone <host#id>
//! ```
//!
//! Mapping errors are surfaced back to the invoking room as plain-text
//! replies; they are never logged-and-swallowed here.

use std::sync::Arc;

use async_trait::async_trait;

use banter_core::{BoxError, Command, Responder, RoomId};

use super::BuiltInCommand;
use crate::manager::PluginManager;

const USAGE: &str =
    "usage: !!command list | map <command> <plugin> <endpoint> | unmap <command> | clone <host#id>";

/// Administers the per-room command map through the [`PluginManager`].
pub struct CommandAdmin {
    plugins: Arc<PluginManager>,
    responder: Arc<dyn Responder>,
}

impl CommandAdmin {
    /// Creates the built-in.
    pub fn new(plugins: Arc<PluginManager>, responder: Arc<dyn Responder>) -> CommandAdmin {
        CommandAdmin { plugins, responder }
    }

    fn list(&self, room: &RoomId) -> String {
        let mappings = self.plugins.mapped_commands_for_room(room);
        if mappings.is_empty() {
            return "No commands are mapped in this room.".to_string();
        }
        mappings
            .iter()
            .map(|(command, target)| {
                format!("{command} -> {}.{}", target.plugin, target.endpoint)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    async fn clone_from(&self, room: &RoomId, source: &str) -> String {
        let source: RoomId = match source.parse() {
            Ok(source) => source,
            Err(e) => return format!("Invalid source room '{source}': {e}"),
        };
        if source == *room {
            return "Cannot clone a room's commands onto itself.".to_string();
        }

        let mut copied = 0usize;
        let mut skipped = 0usize;
        for (command, target) in self.plugins.mapped_commands_for_room(&source) {
            match self
                .plugins
                .map_command_for_room(room, &target.plugin, &target.endpoint, &command)
                .await
            {
                Ok(()) => copied += 1,
                Err(_) => skipped += 1,
            }
        }
        format!("Cloned {copied} command mapping(s) from {source} ({skipped} skipped).")
    }
}

#[async_trait]
impl BuiltInCommand for CommandAdmin {
    fn command_names(&self) -> Vec<String> {
        vec!["command".to_string()]
    }

    fn description(&self) -> &str {
        "List, map, unmap, and clone room command mappings"
    }

    async fn handle_command(&self, command: &Command) -> Result<(), BoxError> {
        let room = command.room();
        let reply = match command.parameters() {
            [sub] if sub == "list" => self.list(room),
            [sub, name, plugin, endpoint] if sub == "map" => {
                match self
                    .plugins
                    .map_command_for_room(room, plugin, endpoint, name)
                    .await
                {
                    Ok(()) => format!("Command '{name}' mapped to {plugin}.{endpoint}."),
                    Err(e) => e.to_string(),
                }
            }
            [sub, name] if sub == "unmap" => {
                match self.plugins.unmap_command_for_room(room, name).await {
                    Ok(removed) => format!(
                        "Command '{name}' unmapped from {}.{}.",
                        removed.plugin, removed.endpoint
                    ),
                    Err(e) => e.to_string(),
                }
            }
            [sub, source] if sub == "clone" => self.clone_from(room, source).await,
            _ => USAGE.to_string(),
        };
        self.responder.post_message(room, &reply).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    use banter_core::event::types;
    use banter_core::{Event, MemoryBanStore, MemoryPluginStore};

    use crate::handler::command_handler;
    use crate::plugin::{CommandEndpoint, Plugin};

    struct RecordingResponder {
        replies: Mutex<Vec<(RoomId, String)>>,
    }

    impl RecordingResponder {
        fn new() -> Arc<RecordingResponder> {
            Arc::new(RecordingResponder {
                replies: Mutex::new(Vec::new()),
            })
        }

        fn last(&self) -> String {
            self.replies.lock().last().map(|(_, text)| text.clone()).unwrap()
        }
    }

    #[async_trait]
    impl Responder for RecordingResponder {
        async fn post_message(&self, room: &RoomId, text: &str) -> Result<(), BoxError> {
            self.replies.lock().push((room.clone(), text.to_string()));
            Ok(())
        }
    }

    struct StubPlugin;

    #[async_trait]
    impl Plugin for StubPlugin {
        fn name(&self) -> &str {
            "jokes"
        }

        fn command_endpoints(&self) -> Vec<CommandEndpoint> {
            vec![CommandEndpoint::new(
                "random",
                command_handler(|_| async { Ok(()) }),
            )]
        }
    }

    fn room() -> RoomId {
        RoomId::new("chat.example.com", 11)
    }

    fn command(content: &str) -> Command {
        let event = Event::builder(types::MESSAGE_POSTED, 1)
            .room(room())
            .user(5, "alice")
            .message(100, content)
            .build_shared();
        Command::from_event(&event).unwrap()
    }

    async fn fixture() -> (Arc<PluginManager>, Arc<RecordingResponder>, CommandAdmin) {
        let manager = Arc::new(PluginManager::new(
            Arc::new(MemoryPluginStore::new()),
            Arc::new(MemoryBanStore::new()),
        ));
        manager.register_plugin(Arc::new(StubPlugin)).unwrap();
        manager
            .enable_plugin_for_room(&room(), "jokes", false)
            .await
            .unwrap();
        let responder = RecordingResponder::new();
        let admin = CommandAdmin::new(Arc::clone(&manager), Arc::clone(&responder) as _);
        (manager, responder, admin)
    }

    #[tokio::test]
    async fn map_list_unmap_round_trip() {
        let (manager, responder, admin) = fixture().await;

        admin
            .handle_command(&command("!!command map laugh jokes random"))
            .await
            .unwrap();
        assert!(manager.is_command_mapped_for_room(&room(), "laugh"));
        assert_eq!(responder.last(), "Command 'laugh' mapped to jokes.random.");

        admin.handle_command(&command("!!command list")).await.unwrap();
        assert_eq!(responder.last(), "laugh -> jokes.random");

        admin
            .handle_command(&command("!!command unmap laugh"))
            .await
            .unwrap();
        assert!(!manager.is_command_mapped_for_room(&room(), "laugh"));
    }

    #[tokio::test]
    async fn mapping_errors_become_plain_text_replies() {
        let (_, responder, admin) = fixture().await;

        admin
            .handle_command(&command("!!command unmap ghost"))
            .await
            .unwrap();
        assert_eq!(
            responder.last(),
            "command 'ghost' is not mapped in room chat.example.com#11"
        );

        admin.handle_command(&command("!!command")).await.unwrap();
        assert_eq!(responder.last(), USAGE);
    }

    #[tokio::test]
    async fn clone_copies_mappings_through_normal_precedence() {
        let (manager, responder, admin) = fixture().await;
        let source = RoomId::new("chat.example.com", 22);
        manager
            .enable_plugin_for_room(&source, "jokes", false)
            .await
            .unwrap();
        manager
            .map_command_for_room(&source, "jokes", "random", "laugh")
            .await
            .unwrap();

        admin
            .handle_command(&command("!!command clone chat.example.com#22"))
            .await
            .unwrap();
        assert!(manager.is_command_mapped_for_room(&room(), "laugh"));
        assert_eq!(
            responder.last(),
            "Cloned 1 command mapping(s) from chat.example.com#22 (0 skipped)."
        );
    }
}

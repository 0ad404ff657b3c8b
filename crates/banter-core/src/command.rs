//! Command classification for chat messages.
//!
//! A message whose content starts with the invoker token `!!`, immediately
//! followed by a command name, is treated as an instruction to the bot:
//! `!!translate en hello` becomes the command `translate` with parameters
//! `["en", "hello"]`. Parameters are split on runs of whitespace; the name
//! is kept exactly as typed (command names are case-sensitive).

use std::sync::Arc;

use crate::event::{Event, EventUser};
use crate::room::RoomId;

/// The fixed token that marks a message as a command.
pub const COMMAND_INVOKER: &str = "!!";

/// A message event classified as a command.
///
/// Built at most once per qualifying message and read-only afterwards. The
/// room and user facets are copied out of the event at construction, so the
/// accessors are infallible even though [`Event`] itself is polymorphic.
#[derive(Debug, Clone)]
pub struct Command {
    event: Arc<Event>,
    room: RoomId,
    user: EventUser,
    name: String,
    parameters: Vec<String>,
}

impl Command {
    /// Classifies `event` as a command.
    ///
    /// Returns `None` unless the event is a room-sourced, user-sourced
    /// message whose content starts with [`COMMAND_INVOKER`] immediately
    /// followed by a name character. A bare `!!`, or `!!` followed by
    /// whitespace, is not a command.
    pub fn from_event(event: &Arc<Event>) -> Option<Command> {
        let message = event.message()?;
        let room = event.room()?.clone();
        let user = event.user()?.clone();

        let rest = message.content.strip_prefix(COMMAND_INVOKER)?;
        let first = rest.chars().next()?;
        if first.is_whitespace() {
            return None;
        }

        let mut tokens = rest.split_whitespace();
        let name = tokens.next()?.to_string();
        let parameters = tokens.map(str::to_string).collect();

        Some(Command {
            event: Arc::clone(event),
            room,
            user,
            name,
            parameters,
        })
    }

    /// The command name, as typed (without the invoker).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Positional parameters following the name. May be empty.
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    /// The room the command was issued in.
    pub fn room(&self) -> &RoomId {
        &self.room
    }

    /// The user that issued the command.
    pub fn user_id(&self) -> u64 {
        self.user.id
    }

    /// Display name of the issuing user.
    pub fn user_name(&self) -> &str {
        &self.user.name
    }

    /// The underlying message event.
    pub fn event(&self) -> &Arc<Event> {
        &self.event
    }
}

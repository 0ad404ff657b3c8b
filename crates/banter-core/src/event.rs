//! Event model for the Banter engine.
//!
//! Every frame the chat service delivers is decoded by the transport layer
//! into one immutable [`Event`]. An event always carries a numeric type id,
//! a per-source monotonically increasing id, and a timestamp; depending on
//! what produced it, it may additionally carry the originating user, the
//! owning room, and message content.
//!
//! Rather than modelling the user/room/message facets as a trait hierarchy
//! probed at runtime, each event exposes an explicit [`CapabilitySet`]
//! bitset derived from which facets are present. Filters test capabilities
//! with cheap bit operations (see the `class` field of the filter DSL).
//!
//! ```rust
//! use banter_core::event::{Capability, Event, types};
//! use banter_core::room::RoomId;
//!
//! let event = Event::builder(types::MESSAGE_POSTED, 42)
//!     .timestamp(1_700_000_000)
//!     .room(RoomId::new("chat.example.com", 11))
//!     .user(17, "someone")
//!     .message(9001, "hello there")
//!     .build();
//!
//! assert!(event.capabilities().contains(Capability::Message));
//! assert!(!event.capabilities().contains(Capability::Global));
//! ```

use std::fmt;
use std::sync::Arc;

use crate::room::RoomId;

// ============================================================================
// Event type ids
// ============================================================================

/// Well-known event type ids used by the chat service.
///
/// The transport decodes each wire frame into an [`Event`] tagged with one of
/// these discriminators. The set is open-ended: filters accept any
/// non-negative integer, so unknown frame types still route correctly.
pub mod types {
    /// A new message was posted to a room.
    pub const MESSAGE_POSTED: u32 = 1;
    /// An existing message was edited.
    pub const MESSAGE_EDITED: u32 = 2;
    /// A user entered a room.
    pub const USER_ENTERED: u32 = 3;
    /// A user left a room.
    pub const USER_LEFT: u32 = 4;
    /// A room's name or description changed.
    pub const ROOM_EDITED: u32 = 5;
    /// A message was starred or unstarred.
    pub const MESSAGE_STARRED: u32 = 6;
    /// The bot's account was pinged in a message.
    pub const USER_MENTIONED: u32 = 8;
    /// A message was flagged for moderator attention.
    pub const MESSAGE_FLAGGED: u32 = 9;
    /// A message was deleted.
    pub const MESSAGE_DELETED: u32 = 10;
    /// The account was invited to another room. Not tied to a room the bot
    /// is in, so the transport delivers it without a room reference.
    pub const INVITATION: u32 = 17;
}

// ============================================================================
// Capability tags
// ============================================================================

/// One capability facet an event can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// The event was produced by a user account (`user()` is populated).
    User,
    /// The event belongs to a specific room (`room()` is populated).
    Room,
    /// The event is account-level rather than room-level (no room attached).
    Global,
    /// The event carries message content (`message()` is populated).
    Message,
}

impl Capability {
    /// All capability tags, in declaration order.
    pub const ALL: [Capability; 4] = [
        Capability::User,
        Capability::Room,
        Capability::Global,
        Capability::Message,
    ];

    const fn bit(self) -> u8 {
        match self {
            Capability::User => 1 << 0,
            Capability::Room => 1 << 1,
            Capability::Global => 1 << 2,
            Capability::Message => 1 << 3,
        }
    }

    /// Resolves a symbolic class name (`user`, `room`, `global`, `message`)
    /// as used by the filter DSL. Names are expected pre-folded to lower
    /// case.
    pub fn from_name(name: &str) -> Option<Capability> {
        match name {
            "user" => Some(Capability::User),
            "room" => Some(Capability::Room),
            "global" => Some(Capability::Global),
            "message" => Some(Capability::Message),
            _ => None,
        }
    }

    /// The symbolic name of this tag.
    pub fn name(self) -> &'static str {
        match self {
            Capability::User => "user",
            Capability::Room => "room",
            Capability::Global => "global",
            Capability::Message => "message",
        }
    }
}

/// A set of [`Capability`] tags, stored as a bitset.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    /// The empty set.
    pub const EMPTY: CapabilitySet = CapabilitySet(0);

    /// Returns a copy of this set with `cap` added.
    #[must_use]
    pub const fn with(self, cap: Capability) -> CapabilitySet {
        CapabilitySet(self.0 | cap.bit())
    }

    /// Adds `cap` to the set in place.
    pub fn insert(&mut self, cap: Capability) {
        self.0 |= cap.bit();
    }

    /// Whether `cap` is in the set.
    pub const fn contains(self, cap: Capability) -> bool {
        self.0 & cap.bit() != 0
    }

    /// Whether every tag in `other` is also in `self`.
    pub const fn contains_all(self, other: CapabilitySet) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether at least one tag is shared with `other`.
    pub const fn intersects(self, other: CapabilitySet) -> bool {
        self.0 & other.0 != 0
    }

    /// Whether the set is empty.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        let mut set = CapabilitySet::EMPTY;
        for cap in iter {
            set.insert(cap);
        }
        set
    }
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set = f.debug_set();
        for cap in Capability::ALL {
            if self.contains(cap) {
                set.entry(&cap.name());
            }
        }
        set.finish()
    }
}

// ============================================================================
// Event
// ============================================================================

/// The user account that produced an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventUser {
    /// Numeric account id on the chat service.
    pub id: u64,
    /// Display name at the time the event was produced.
    pub name: String,
}

/// Message content attached to a message-capable event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMessage {
    /// The service's message id (distinct from the event id).
    pub message_id: u64,
    /// Raw message content as delivered by the transport.
    pub content: String,
}

/// One typed notification from the chat service.
///
/// Events are constructed once by the transport layer, shared as
/// [`Arc<Event>`] through dispatch, and never mutated. The optional facets
/// determine the event's [`CapabilitySet`]:
///
/// - a user attached ⇒ [`Capability::User`]
/// - a room attached ⇒ [`Capability::Room`]; no room ⇒ [`Capability::Global`]
/// - message content attached ⇒ [`Capability::Message`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    type_id: u32,
    id: u64,
    timestamp: i64,
    user: Option<EventUser>,
    room: Option<RoomId>,
    message: Option<EventMessage>,
}

impl Event {
    /// Starts building an event with the given type and event id.
    pub fn builder(type_id: u32, id: u64) -> EventBuilder {
        EventBuilder {
            event: Event {
                type_id,
                id,
                timestamp: 0,
                user: None,
                room: None,
                message: None,
            },
        }
    }

    /// The numeric event-type discriminator.
    pub fn type_id(&self) -> u32 {
        self.type_id
    }

    /// Monotonically increasing id assigned by the source.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Unix timestamp (seconds) of the event.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// The user that produced the event, if any.
    pub fn user(&self) -> Option<&EventUser> {
        self.user.as_ref()
    }

    /// The room the event belongs to; `None` for account-level events.
    pub fn room(&self) -> Option<&RoomId> {
        self.room.as_ref()
    }

    /// Message content, for message-capable events.
    pub fn message(&self) -> Option<&EventMessage> {
        self.message.as_ref()
    }

    /// The capability tags this event exposes, derived from its facets.
    pub fn capabilities(&self) -> CapabilitySet {
        let mut caps = CapabilitySet::EMPTY;
        if self.user.is_some() {
            caps.insert(Capability::User);
        }
        match self.room {
            Some(_) => caps.insert(Capability::Room),
            None => caps.insert(Capability::Global),
        }
        if self.message.is_some() {
            caps.insert(Capability::Message);
        }
        caps
    }
}

/// Builder for [`Event`], used by the transport layer and by tests.
#[derive(Debug, Clone)]
pub struct EventBuilder {
    event: Event,
}

impl EventBuilder {
    /// Sets the Unix timestamp.
    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.event.timestamp = timestamp;
        self
    }

    /// Attaches the producing user.
    pub fn user(mut self, id: u64, name: impl Into<String>) -> Self {
        self.event.user = Some(EventUser {
            id,
            name: name.into(),
        });
        self
    }

    /// Attaches the owning room.
    pub fn room(mut self, room: RoomId) -> Self {
        self.event.room = Some(room);
        self
    }

    /// Attaches message content.
    pub fn message(mut self, message_id: u64, content: impl Into<String>) -> Self {
        self.event.message = Some(EventMessage {
            message_id,
            content: content.into(),
        });
        self
    }

    /// Finishes the event.
    pub fn build(self) -> Event {
        self.event
    }

    /// Finishes the event already wrapped for dispatch.
    pub fn build_shared(self) -> Arc<Event> {
        Arc::new(self.event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capabilities_for_room_message() {
        let event = Event::builder(types::MESSAGE_POSTED, 1)
            .room(RoomId::new("chat.example.com", 11))
            .user(5, "alice")
            .message(100, "hi")
            .build();

        let caps = event.capabilities();
        assert!(caps.contains(Capability::User));
        assert!(caps.contains(Capability::Room));
        assert!(caps.contains(Capability::Message));
        assert!(!caps.contains(Capability::Global));
    }

    #[test]
    fn capabilities_for_global_event() {
        let event = Event::builder(types::INVITATION, 7).user(5, "alice").build();

        let caps = event.capabilities();
        assert!(caps.contains(Capability::Global));
        assert!(caps.contains(Capability::User));
        assert!(!caps.contains(Capability::Room));
        assert!(!caps.contains(Capability::Message));
    }

    #[test]
    fn contains_all_vs_intersects() {
        let user_room = CapabilitySet::EMPTY
            .with(Capability::User)
            .with(Capability::Room);
        let user_only = CapabilitySet::EMPTY.with(Capability::User);
        let global_only = CapabilitySet::EMPTY.with(Capability::Global);

        assert!(user_room.contains_all(user_only));
        assert!(!user_only.contains_all(user_room));
        assert!(user_room.intersects(user_only));
        assert!(!user_room.intersects(global_only));
        assert!(CapabilitySet::EMPTY.is_empty());
    }

    #[test]
    fn capability_names_round_trip() {
        for cap in Capability::ALL {
            assert_eq!(Capability::from_name(cap.name()), Some(cap));
        }
        assert_eq!(Capability::from_name("bogus"), None);
    }
}

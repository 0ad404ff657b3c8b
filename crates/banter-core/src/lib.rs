//! # Banter Core
//!
//! Foundation types for the Banter chat-room automation bot.
//!
//! This crate defines the value types the whole engine is built from and
//! the contracts of its external collaborators:
//!
//! - **Events**: [`Event`] with explicit capability tags
//!   ([`Capability`]/[`CapabilitySet`]), constructed by the transport layer
//!   and shared as `Arc<Event>` through dispatch.
//! - **Rooms**: the canonical [`RoomId`] key (`host#id`) scoping all
//!   per-room state.
//! - **Commands**: [`Command`], a message classified as an instruction by
//!   its leading `!!` invoker.
//! - **Storage seams**: [`BanStore`] and [`PluginStore`], async contracts
//!   implemented by the storage backends.
//! - **Outbound seam**: [`Responder`], implemented by the action executor.
//!
//! The routing engine itself lives in `banter-framework`; orchestration and
//! configuration live in `banter-runtime`.

pub mod command;
pub mod error;
pub mod event;
pub mod responder;
pub mod room;
pub mod storage;

pub use command::{COMMAND_INVOKER, Command};
pub use error::{BoxError, StorageError};
pub use event::{Capability, CapabilitySet, Event, EventBuilder, EventMessage, EventUser};
pub use responder::Responder;
pub use room::{RoomId, RoomIdError};
pub use storage::{BanStore, MemoryBanStore, MemoryPluginStore, PluginStore};

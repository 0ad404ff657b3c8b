//! # Banter Framework
//!
//! The event routing and plugin command-dispatch engine of the Banter bot.
//!
//! This layer provides:
//!
//! - The filter condition language: a hand-written single-pass
//!   [`parser`](filter::parser) and a [`compiler`](filter::compiler) that
//!   turns conditions into indexed predicates.
//! - [`Filter`], the compiled artifact binding predicates, index keys, and
//!   a handler callback.
//! - [`PluginManager`]: plugin registration, per-room enable/disable and
//!   command mapping with persistence, and the indexed dispatch lookups.
//! - [`BuiltInActionManager`] and the administrative built-ins (`command`,
//!   `plugin`).
//! - [`EventDispatcher`], the per-event routing glue.
//!
//! Value types (events, rooms, commands) and the storage/responder seams
//! live in `banter-core`; orchestration lives in `banter-runtime`.

pub mod builtin;
pub mod dispatcher;
pub mod error;
pub mod filter;
pub mod handler;
pub mod manager;
pub mod plugin;

pub use builtin::{BuiltInActionManager, BuiltInCommand, BuiltInEventHandler};
pub use dispatcher::EventDispatcher;
pub use error::{MappingError, RegistrationError, RegistrationErrorKind};
pub use filter::{Filter, FilterError};
pub use handler::{
    CommandHandler, EventHandler, HandlerFuture, MessageHandler, command_handler, event_handler,
    message_handler,
};
pub use manager::{MappedCommand, PluginManager};
pub use plugin::{CommandEndpoint, Plugin};

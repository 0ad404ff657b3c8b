//! Handler callback types.
//!
//! Plugins and built-ins hand the engine plain async callbacks. The aliases
//! here erase the concrete future type behind [`BoxFuture`] so callbacks can
//! be stored in registries and cloned cheaply via `Arc`.
//!
//! The adapter functions wrap an async fn (or closure returning a future)
//! into the erased form:
//!
//! ```rust
//! use banter_framework::handler::event_handler;
//!
//! let handler = event_handler(|event| async move {
//!     println!("event {}", event.id());
//!     Ok(())
//! });
//! ```

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use banter_core::{BoxError, Command, Event};

/// The erased future returned by every handler callback.
pub type HandlerFuture = BoxFuture<'static, Result<(), BoxError>>;

/// Callback attached to a compiled event filter.
pub type EventHandler = Arc<dyn Fn(Arc<Event>) -> HandlerFuture + Send + Sync>;

/// A plugin's free-text message callback, invoked for every message event
/// routed to the plugin's rooms.
pub type MessageHandler = Arc<dyn Fn(Arc<Event>) -> HandlerFuture + Send + Sync>;

/// Callback behind a plugin command endpoint.
pub type CommandHandler = Arc<dyn Fn(Command) -> HandlerFuture + Send + Sync>;

/// Wraps an async fn into an [`EventHandler`].
pub fn event_handler<F, Fut>(f: F) -> EventHandler
where
    F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    Arc::new(move |event: Arc<Event>| -> HandlerFuture { Box::pin(f(event)) })
}

/// Wraps an async fn into a [`MessageHandler`].
pub fn message_handler<F, Fut>(f: F) -> MessageHandler
where
    F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    Arc::new(move |event: Arc<Event>| -> HandlerFuture { Box::pin(f(event)) })
}

/// Wraps an async fn into a [`CommandHandler`].
pub fn command_handler<F, Fut>(f: F) -> CommandHandler
where
    F: Fn(Command) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    Arc::new(move |command: Command| -> HandlerFuture { Box::pin(f(command)) })
}

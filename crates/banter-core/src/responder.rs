//! Outbound action seam.
//!
//! Handlers and built-ins reply to rooms through [`Responder`]. The
//! implementation (HTTP posting, rate limiting, retry/back-off) lives in
//! the action-executor collaborator outside this crate; the engine only
//! depends on the trait.

use async_trait::async_trait;

use crate::error::BoxError;
use crate::room::RoomId;

/// Posts outbound messages to chat rooms.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Posts `text` as a new message in `room`.
    async fn post_message(&self, room: &RoomId, text: &str) -> Result<(), BoxError>;
}

//! Error types for the Banter engine.

use thiserror::Error;

use banter_core::RoomId;

use crate::filter::FilterError;

/// A plugin registration failure.
///
/// Registration is atomic: when this error is returned, nothing of the
/// plugin was installed and a corrected registration under the same name
/// may be attempted.
#[derive(Debug, Error)]
#[error("failed to register plugin '{plugin}': {kind}")]
pub struct RegistrationError {
    plugin: String,
    kind: RegistrationErrorKind,
}

impl RegistrationError {
    pub(crate) fn new(plugin: impl Into<String>, kind: RegistrationErrorKind) -> Self {
        RegistrationError {
            plugin: plugin.into(),
            kind,
        }
    }

    /// The plugin that failed to register.
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    /// The underlying cause.
    pub fn kind(&self) -> &RegistrationErrorKind {
        &self.kind
    }
}

/// The cause of a [`RegistrationError`].
#[derive(Debug, Error)]
pub enum RegistrationErrorKind {
    /// A plugin with the same name is already installed.
    #[error("a plugin with this name is already registered")]
    AlreadyRegistered,

    /// Two endpoints share a name.
    #[error("duplicate command endpoint '{0}'")]
    DuplicateEndpoint(String),

    /// An event filter failed to parse or compile.
    #[error("invalid event filter '{text}': {source}")]
    InvalidFilter {
        /// The filter text as declared by the plugin.
        text: String,
        /// The parse or compile failure.
        source: FilterError,
    },
}

/// A command-mapping logic error, raised synchronously to the caller.
///
/// These are the user-visible failures of the administrative mapping
/// surface; persistence I/O failures are logged instead (in-memory state
/// deliberately runs ahead of storage).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    /// The command name is reserved by a built-in.
    #[error("command '{0}' is reserved by a built-in")]
    BuiltIn(String),

    /// The command is already mapped in the room.
    #[error("command '{command}' is already mapped in room {room}")]
    AlreadyMapped {
        /// The room the mapping was attempted in.
        room: RoomId,
        /// The already-mapped command name.
        command: String,
    },

    /// The command is not currently mapped in the room.
    #[error("command '{command}' is not mapped in room {room}")]
    NotMapped {
        /// The room the unmapping was attempted in.
        room: RoomId,
        /// The unmapped command name.
        command: String,
    },

    /// No plugin with this name is registered.
    #[error("unknown plugin '{0}'")]
    UnknownPlugin(String),

    /// The plugin declares no endpoint with this name.
    #[error("plugin '{plugin}' has no endpoint '{endpoint}'")]
    UnknownEndpoint {
        /// The plugin that was addressed.
        plugin: String,
        /// The unknown endpoint name.
        endpoint: String,
    },

    /// The plugin is not enabled in the room.
    #[error("plugin '{plugin}' is not enabled in room {room}")]
    PluginNotEnabled {
        /// The room the operation was attempted in.
        room: RoomId,
        /// The plugin that is not enabled.
        plugin: String,
    },
}

//! Canonical room identifiers.
//!
//! Every per-room index, command mapping, and persisted flag in the engine
//! is keyed by the canonical string form `host#id`, e.g.
//! `chat.example.com#11`. The host part is case-folded to lower case when a
//! [`RoomId`] is constructed, so two spellings of the same room always
//! collapse onto one key.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use thiserror::Error;

/// Errors produced when parsing a room identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomIdError {
    /// The `#` separating host and numeric id is missing.
    #[error("missing '#' separator")]
    MissingSeparator,

    /// The host part is empty.
    #[error("empty host")]
    EmptyHost,

    /// The host part contains a character outside `[a-z0-9.-]`.
    #[error("invalid host character '{0}'")]
    InvalidHostChar(char),

    /// The part after `#` is not a decimal room number.
    #[error("invalid room number '{0}'")]
    InvalidRoomNumber(String),
}

/// Identifier of one room on a chat host.
///
/// The canonical string form `host#id` (host lower-cased) is produced by
/// [`Display`](fmt::Display) and parsed by [`FromStr`]; it is the key used
/// for all per-room state, in memory and in storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId {
    host: String,
    id: u64,
}

impl RoomId {
    /// Creates a room identifier, folding the host to lower case.
    pub fn new(host: impl Into<String>, id: u64) -> RoomId {
        RoomId {
            host: host.into().to_lowercase(),
            id,
        }
    }

    /// The chat host, always lower case.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The numeric room id on the host.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.host, self.id)
    }
}

impl FromStr for RoomId {
    type Err = RoomIdError;

    fn from_str(s: &str) -> Result<RoomId, RoomIdError> {
        let (host, number) = s.split_once('#').ok_or(RoomIdError::MissingSeparator)?;
        if host.is_empty() {
            return Err(RoomIdError::EmptyHost);
        }
        let host = host.to_lowercase();
        if let Some(c) = host
            .chars()
            .find(|c| !c.is_ascii_lowercase() && !c.is_ascii_digit() && *c != '.' && *c != '-')
        {
            return Err(RoomIdError::InvalidHostChar(c));
        }
        let id = number
            .parse::<u64>()
            .map_err(|_| RoomIdError::InvalidRoomNumber(number.to_string()))?;
        Ok(RoomId { host, id })
    }
}

impl Serialize for RoomId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RoomId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<RoomId, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

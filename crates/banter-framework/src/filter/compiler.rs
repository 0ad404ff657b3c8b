//! Compiler for parsed filter conditions.
//!
//! Turns a condition list into a set of predicate closures (evaluated as a
//! conjunction) plus the event-type ids and room identifiers the filter can
//! ever match. The extracted keys are what make O(1) indexed dispatch
//! possible; a filter that constrains neither `type` nor `room` exports no
//! keys and is evaluated against every event.
//!
//! Supported fields:
//!
//! | Field   | Forms                         | Semantics                          |
//! |---------|-------------------------------|------------------------------------|
//! | `type`  | scalar, `any(...)`            | `event.type_id()` membership       |
//! | `room`  | scalar, `any(...)`            | room-sourced and room membership   |
//! | `class` | scalar, `any(...)`, `all(...)`| capability-bitset test, never keyed|

use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;

use banter_core::event::{Capability, CapabilitySet, Event};
use banter_core::room::{RoomId, RoomIdError};

use super::parser::{Condition, ConditionValue};

// ─── Output ──────────────────────────────────────────────────────────────────

/// One compiled condition: a cheap boolean test over an event.
pub type Predicate = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

/// The result of compiling a condition list.
pub struct CompiledFilter {
    /// All predicates must pass for the filter to match.
    pub predicates: Vec<Predicate>,
    /// Event-type ids the filter can match; empty if unconstrained.
    pub type_keys: BTreeSet<u32>,
    /// Canonical room identifiers the filter can match; empty if
    /// unconstrained.
    pub room_keys: BTreeSet<String>,
}

impl std::fmt::Debug for CompiledFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledFilter")
            .field("predicates", &self.predicates.len())
            .field("type_keys", &self.type_keys)
            .field("room_keys", &self.room_keys)
            .finish()
    }
}

// ─── Errors ──────────────────────────────────────────────────────────────────

/// A semantically invalid (but well-formed) filter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// The same field appears twice in one filter.
    #[error("duplicate field '{0}'")]
    DuplicateField(String),

    /// The field is not part of the filter language.
    #[error("unknown field '{0}'")]
    UnknownField(String),

    /// The set operator is not valid for the field (e.g. `type=all(...)`).
    #[error("field '{field}' does not support set '{set}'")]
    UnsupportedSet {
        /// The offending field.
        field: String,
        /// The set operator that was used.
        set: String,
    },

    /// A `type` value is not a non-negative integer.
    #[error("invalid event type id '{0}'")]
    InvalidTypeId(String),

    /// A `room` value is not a valid `host#id` identifier.
    #[error("invalid room identifier '{value}': {source}")]
    InvalidRoomId {
        /// The offending value.
        value: String,
        /// Why it failed to parse.
        source: RoomIdError,
    },

    /// A `class` value is not one of `user`, `room`, `global`, `message`.
    #[error("unknown event class '{0}'")]
    UnknownClass(String),
}

// ─── Compilation ─────────────────────────────────────────────────────────────

fn parse_type_id(value: &str) -> Result<u32, CompileError> {
    value
        .parse::<u32>()
        .map_err(|_| CompileError::InvalidTypeId(value.to_string()))
}

fn parse_room(value: &str) -> Result<RoomId, CompileError> {
    value.parse::<RoomId>().map_err(|source| CompileError::InvalidRoomId {
        value: value.to_string(),
        source,
    })
}

fn parse_class(value: &str) -> Result<Capability, CompileError> {
    Capability::from_name(&value.to_lowercase())
        .ok_or_else(|| CompileError::UnknownClass(value.to_string()))
}

/// Compiles parsed conditions into predicates and index keys.
pub fn compile(conditions: &[Condition]) -> Result<CompiledFilter, CompileError> {
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let mut predicates: Vec<Predicate> = Vec::new();
    let mut type_keys: BTreeSet<u32> = BTreeSet::new();
    let mut room_keys: BTreeSet<String> = BTreeSet::new();

    for condition in conditions {
        if !seen.insert(condition.field.as_str()) {
            return Err(CompileError::DuplicateField(condition.field.clone()));
        }

        match condition.field.as_str() {
            "type" => {
                let ids: BTreeSet<u32> = match &condition.value {
                    ConditionValue::Scalar(value) => BTreeSet::from([parse_type_id(value)?]),
                    ConditionValue::Set { name, members } if name == "any" => members
                        .iter()
                        .map(|m| parse_type_id(m))
                        .collect::<Result<_, _>>()?,
                    ConditionValue::Set { name, .. } => {
                        return Err(CompileError::UnsupportedSet {
                            field: condition.field.clone(),
                            set: name.clone(),
                        });
                    }
                };
                type_keys.extend(ids.iter().copied());
                predicates.push(Arc::new(move |event| ids.contains(&event.type_id())));
            }

            "room" => {
                let rooms: BTreeSet<RoomId> = match &condition.value {
                    ConditionValue::Scalar(value) => BTreeSet::from([parse_room(value)?]),
                    ConditionValue::Set { name, members } if name == "any" => members
                        .iter()
                        .map(|m| parse_room(m))
                        .collect::<Result<_, _>>()?,
                    ConditionValue::Set { name, .. } => {
                        return Err(CompileError::UnsupportedSet {
                            field: condition.field.clone(),
                            set: name.clone(),
                        });
                    }
                };
                room_keys.extend(rooms.iter().map(RoomId::to_string));
                predicates.push(Arc::new(move |event| {
                    event.room().is_some_and(|room| rooms.contains(room))
                }));
            }

            "class" => {
                enum Mode {
                    Any,
                    All,
                }
                let (mode, mask) = match &condition.value {
                    ConditionValue::Scalar(value) => {
                        (Mode::All, CapabilitySet::EMPTY.with(parse_class(value)?))
                    }
                    ConditionValue::Set { name, members } => {
                        let mode = match name.as_str() {
                            "any" => Mode::Any,
                            "all" => Mode::All,
                            _ => {
                                return Err(CompileError::UnsupportedSet {
                                    field: condition.field.clone(),
                                    set: name.clone(),
                                });
                            }
                        };
                        let mask = members
                            .iter()
                            .map(|m| parse_class(m))
                            .collect::<Result<CapabilitySet, _>>()?;
                        (mode, mask)
                    }
                };
                predicates.push(match mode {
                    Mode::Any => Arc::new(move |event| event.capabilities().intersects(mask)),
                    Mode::All => Arc::new(move |event| event.capabilities().contains_all(mask)),
                });
            }

            other => return Err(CompileError::UnknownField(other.to_string())),
        }
    }

    Ok(CompiledFilter {
        predicates,
        type_keys,
        room_keys,
    })
}

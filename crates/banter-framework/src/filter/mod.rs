//! Compiled event filters.
//!
//! A [`Filter`] is the compiled form of one `filter text → handler` pair
//! declared by a plugin: the parsed and compiled predicate conjunction, the
//! type/room keys it is indexed under, and the handler callback to invoke
//! when an event matches. Filters are built once at plugin registration and
//! immutable afterwards.

pub mod compiler;
pub mod parser;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use banter_core::{BoxError, Event};

use crate::handler::EventHandler;
use compiler::{CompileError, Predicate};
use parser::ParseError;

pub use compiler::CompiledFilter;
pub use parser::{Condition, ConditionValue};

/// Why a filter failed to build.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// The filter text is malformed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The filter text is well-formed but semantically invalid.
    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// A compiled filter bound to its owning plugin and handler.
pub struct Filter {
    text: String,
    plugin: String,
    predicates: Vec<Predicate>,
    type_keys: BTreeSet<u32>,
    room_keys: BTreeSet<String>,
    handler: EventHandler,
}

impl Filter {
    /// Parses and compiles `text` into a filter owned by `plugin`.
    pub fn build(
        plugin: impl Into<String>,
        text: impl Into<String>,
        handler: EventHandler,
    ) -> Result<Filter, FilterError> {
        let text = text.into();
        let conditions = parser::parse(&text)?;
        let compiled = compiler::compile(&conditions)?;
        Ok(Filter {
            text,
            plugin: plugin.into(),
            predicates: compiled.predicates,
            type_keys: compiled.type_keys,
            room_keys: compiled.room_keys,
            handler,
        })
    }

    /// The original filter text, kept for diagnostics and listings.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The lower-cased name of the plugin that owns this filter.
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    /// Event-type ids this filter is indexed under.
    pub fn type_keys(&self) -> &BTreeSet<u32> {
        &self.type_keys
    }

    /// Canonical room identifiers this filter is indexed under.
    pub fn room_keys(&self) -> &BTreeSet<String> {
        &self.room_keys
    }

    /// Whether the filter has no index keys and must be evaluated for every
    /// event.
    pub fn is_unindexed(&self) -> bool {
        self.type_keys.is_empty() && self.room_keys.is_empty()
    }

    /// Evaluates the full predicate conjunction against `event`.
    ///
    /// Always re-verifies every condition, regardless of which index the
    /// filter was found through.
    pub fn matches(&self, event: &Event) -> bool {
        self.predicates.iter().all(|p| p(event))
    }

    /// Invokes the owning handler.
    pub(crate) async fn invoke(&self, event: Arc<Event>) -> Result<(), BoxError> {
        (self.handler)(event).await
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("plugin", &self.plugin)
            .field("text", &self.text)
            .field("type_keys", &self.type_keys)
            .field("room_keys", &self.room_keys)
            .finish()
    }
}

//! FlowTable - Compiled Flow Slots
//!
//! Every registered flow is flattened into one slot array:
//!
//! ```text
//!  offset:  0    1    2     3    4     5
//!  slot:   [a1] [a2] [None] [b1] [b2] [None]
//!           ^ "alpha"        ^ "beta"
//! ```
//!
//! A `None` sentinel closes each flow. The `Cursor` uses the sentinels to
//! clamp every movement inside the flow it started in, which is what makes
//! offsets persisted in tokens safe to do arithmetic on.

use crate::error::RegistrationError;
use crate::flow::NamedFlow;
use crate::handler::SharedHandler;
use std::collections::HashMap;

/// Append-only array of handler slots plus a name → start offset index.
#[derive(Default)]
pub struct FlowTable {
    slots: Vec<Option<SharedHandler>>,
    entries: HashMap<String, usize>,
}

impl FlowTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `flow` into the table and return its start offset.
    pub fn register(&mut self, flow: NamedFlow) -> Result<usize, RegistrationError> {
        let (name, flow) = flow.into_parts();

        if name.trim().is_empty() {
            return Err(RegistrationError::Unnamed);
        }
        if flow.is_empty() {
            return Err(RegistrationError::EmptyFlow(name));
        }
        if self.entries.contains_key(&name) {
            return Err(RegistrationError::Duplicate(name));
        }

        let start = self.slots.len();
        self.slots
            .extend(flow.handlers().iter().cloned().map(Some));
        self.slots.push(None);

        tracing::debug!(flow = %name, start, handlers = flow.len(), "Registered flow");
        self.entries.insert(name, start);
        Ok(start)
    }

    /// Start offset of the flow named `name`.
    pub fn start_offset(&self, name: &str) -> Option<usize> {
        self.entries.get(name).copied()
    }

    /// Handler at `offset`. `None` for sentinels and out-of-range offsets.
    pub fn get(&self, offset: usize) -> Option<&SharedHandler> {
        self.slots.get(offset).and_then(Option::as_ref)
    }

    /// True if `offset` is a real slot (handler or sentinel).
    pub fn contains(&self, offset: usize) -> bool {
        offset < self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Registered flow names and their start offsets.
    pub fn entries(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.entries.iter().map(|(name, start)| (name.as_str(), *start))
    }

    pub fn cursor(&self, offset: usize) -> Cursor<'_> {
        Cursor {
            table: self,
            offset,
        }
    }

    /// Cursor positioned at the start of `name`.
    pub fn cursor_for(&self, name: &str) -> Option<Cursor<'_>> {
        self.start_offset(name).map(|offset| self.cursor(offset))
    }
}

impl std::fmt::Debug for FlowTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowTable")
            .field("slots", &self.slots.len())
            .field("flows", &self.entries.len())
            .finish()
    }
}

/// Bounded position inside a `FlowTable`.
#[derive(Clone, Copy)]
pub struct Cursor<'a> {
    table: &'a FlowTable,
    offset: usize,
}

impl<'a> Cursor<'a> {
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn current(&self) -> Option<&'a SharedHandler> {
        self.table.get(self.offset)
    }

    /// True on a sentinel or outside the table.
    pub fn at_end(&self) -> bool {
        self.current().is_none()
    }

    /// Advance one slot unless already on the sentinel.
    pub fn next(&mut self) {
        if !self.at_end() {
            self.offset += 1;
        }
    }

    /// Move back up to `count` slots, stopping at the flow's first handler.
    pub fn rewind_by(&mut self, mut count: usize) {
        while count > 0 && self.offset > 0 && self.table.get(self.offset - 1).is_some() {
            self.offset -= 1;
            count -= 1;
        }
    }

    /// Move forward up to `count` slots, stopping on the flow's sentinel.
    pub fn jump_by(&mut self, mut count: usize) {
        while count > 0 && !self.at_end() {
            self.offset += 1;
            count -= 1;
        }
    }
}

impl std::fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("offset", &self.offset)
            .field("at_end", &self.at_end())
            .finish()
    }
}

//! ScopeStack: a bounded LIFO of independent tables modeling nested
//! lexical scopes (e.g. compiler symbol tables). Push creates an empty
//! table, pop destroys the top one; the stack adds no algorithmic
//! machinery of its own and does not interpose on the cursor protocol.
//!
//! The stack is a caller-owned value, not process-wide state. Tables are
//! whole stack elements only; a table is never an item inside another
//! table (payloads are opaque bytes).

use crate::table::{Config, Table};
use core::hash::BuildHasher;
use std::collections::hash_map::RandomState;

/// Maximum nesting depth a [`ScopeStack`] accepts.
pub const MAX_SCOPE_DEPTH: usize = 64;

/// Push attempted beyond [`MAX_SCOPE_DEPTH`]. The stack is unchanged.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ScopeOverflow;

impl core::fmt::Display for ScopeOverflow {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("scope stack capacity exhausted")
    }
}

impl std::error::Error for ScopeOverflow {}

/// Bounded stack of tables sharing one payload size. Each scope is a
/// fully independent table created with default configuration.
pub struct ScopeStack<S = RandomState> {
    item_size: usize,
    tables: Vec<Table<S>>,
}

impl<S> ScopeStack<S>
where
    S: BuildHasher + Clone + Default,
{
    /// An empty stack whose scopes will all carry `item_size`-byte
    /// payloads.
    pub fn new(item_size: usize) -> Self {
        Self {
            item_size,
            tables: Vec::new(),
        }
    }

    /// Current nesting depth.
    pub fn depth(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Payload size used for every scope this stack creates.
    pub fn item_size(&self) -> usize {
        self.item_size
    }

    /// Enter a new scope: create an empty table on top of the stack and
    /// return its index. Fails without mutating anything when the depth
    /// limit is reached.
    pub fn push(&mut self) -> Result<usize, ScopeOverflow> {
        if self.tables.len() >= MAX_SCOPE_DEPTH {
            return Err(ScopeOverflow);
        }
        self.tables
            .push(Table::with_hasher(self.item_size, Config::default(), S::default()));
        Ok(self.tables.len() - 1)
    }

    /// Leave the top scope, destroying its table (finalize semantics do
    /// not apply: scopes use the default configuration).
    ///
    /// # Panics
    /// Popping an empty stack is a contract violation and panics. All
    /// cursors on the top table must be closed first.
    pub fn pop(&mut self) {
        assert!(!self.tables.is_empty(), "pop on empty scope stack");
        self.tables.pop();
    }

    /// The innermost scope.
    pub fn top(&self) -> Option<&Table<S>> {
        self.tables.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut Table<S>> {
        self.tables.last_mut()
    }

    /// A scope by index, 0 being the outermost. Useful for clients that
    /// resolve outward through enclosing scopes.
    pub fn get(&self, depth: usize) -> Option<&Table<S>> {
        self.tables.get(depth)
    }

    pub fn get_mut(&mut self, depth: usize) -> Option<&mut Table<S>> {
        self.tables.get_mut(depth)
    }
}

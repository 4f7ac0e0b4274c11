//! seektable: a single-threaded, byte-keyed table where all mutation and
//! iteration are funneled through cursor handles, making deletion safe
//! under multiple simultaneously open cursors.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: store arbitrary-length byte keys (plus optional "extension"
//!   bytes kept with the key but excluded from equality) alongside a
//!   fixed-size per-entry payload, with a cursor protocol that lets the
//!   table decide cheaply whether freeing a deleted entry is safe now or
//!   must wait.
//! - Pieces:
//!   - Table<S>: bucket array + chains over a slotmap arena; direct reads
//!     (`lookup`, `len`) need no cursor; `rehash` and auto-growth are
//!     gated on the open-cursor count.
//!   - Cursor: the sole mutation/iteration handle. `seek` is find-or-
//!     insert, `delete` removes the current entry and repositions, both
//!     validated against the bound table's identity tag.
//!   - ScopeStack<S>: a bounded LIFO of independent tables for nested
//!     lexical scopes; exercises table create/destroy only.
//!
//! Constraints
//! - Single-threaded: counters use `Cell`; "concurrency" means nested
//!   cursors on one thread, never parallel execution.
//! - Payloads are opaque `item_size`-byte blobs; the table never
//!   interprets them.
//! - Iteration order is arbitrary; only "each live entry exactly once"
//!   is promised.
//!
//! Deletion safety
//! - The table counts open cursors with a linear-token counter. Deleting
//!   through the only open cursor frees the entry immediately; deleting
//!   while other cursors are open unlinks the entry from its chain but
//!   parks it on a deferred list, keeping its chain link intact so a
//!   cursor positioned on it can still walk forward. The deferred list is
//!   drained when the last cursor closes.
//! - The finalize callback (if configured) runs exactly once per entry,
//!   at delete time or at table drop, always before the entry's storage
//!   is released. Deferred release does not re-invoke it.
//!
//! Misuse boundaries
//! - A cursor carries a token minted from its table's counter; dropping a
//!   cursor without closing it panics (linear-token discipline).
//! - Each table has a unique id; cursor operations reject a cursor bound
//!   to a different table (`CursorError::WrongTable`) or already closed
//!   (`CursorError::Closed`).
//! - Entry storage lives in a slotmap, so a recycled slot can never be
//!   aliased by a stale position: keys are generational.
//!
//! Notes and non-goals
//! - `Config::orders` is accepted and stored but currently has no effect.
//! - No persistence, no interior locking, no scope-chain resolution on
//!   top of `ScopeStack`; those belong to clients.

mod cursor;
mod scope;
mod table;
pub mod tokens;

// Public surface
pub use cursor::{Cursor, CursorError, SeekOutcome};
pub use scope::{ScopeOverflow, ScopeStack, MAX_SCOPE_DEPTH};
pub use table::{Config, FinalizeEntry, Finalizer, Table};

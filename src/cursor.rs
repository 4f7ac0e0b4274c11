//! Cursor: the sole mutation and iteration handle into a table.
//!
//! A cursor does not borrow its table; every operation takes the table
//! by reference, and the cursor proves it belongs to that table via the
//! table's identity tag (the calling convention used for handles
//! throughout this crate). While open, the cursor holds one linear token
//! from the table's open-cursor counter; `close` returns it, and
//! dropping an open cursor panics.

use crate::table::{Entry, Table};
use crate::tokens::{Count, Token, UsizeCount};
use core::hash::BuildHasher;
use core::marker::PhantomData;
use slotmap::DefaultKey;

/// Outcome of [`Cursor::seek`]. The discriminants carry the historical
/// return-code meaning: 0 for a pre-existing entry, 1 for a new one.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SeekOutcome {
    /// The key was already present; nothing was allocated or written.
    Existing = 0,
    /// A new entry was linked in; its payload is zeroed for the caller
    /// to fill.
    Inserted = 1,
}

/// Rejected cursor misuse.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CursorError {
    /// The cursor was already closed.
    Closed,
    /// The cursor is bound to a different table.
    WrongTable,
}

impl core::fmt::Display for CursorError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CursorError::Closed => f.write_str("cursor is closed"),
            CursorError::WrongTable => f.write_str("cursor belongs to a different table"),
        }
    }
}

impl std::error::Error for CursorError {}

/// An open enumeration and mutation position inside one table.
///
/// Obtained from [`Table::open`]; must be returned with
/// [`Cursor::close`]. Exactly one entry is current, or none (terminal
/// or empty-table state).
pub struct Cursor {
    table_id: u64,
    bucket: usize,
    current: Option<DefaultKey>,
    token: Option<Token<'static, UsizeCount>>,
    _nosend: PhantomData<*mut ()>,
}

impl<S> Table<S>
where
    S: BuildHasher + Clone + Default,
{
    /// Open a cursor on this table, positioned at an arbitrary first
    /// entry (or at the terminal state if the table is empty). The
    /// open-cursor count is incremented until [`Cursor::close`].
    pub fn open(&self) -> Cursor {
        let token = self.cursors.get();
        let (bucket, current) = match self.first_entry_from(0) {
            Some((b, k)) => (b, Some(k)),
            None => (0, None),
        };
        Cursor {
            table_id: self.id(),
            bucket,
            current,
            token: Some(token),
            _nosend: PhantomData,
        }
    }
}

impl Cursor {
    /// Whether this cursor still holds its table's token.
    pub fn is_open(&self) -> bool {
        self.token.is_some()
    }

    fn check<S>(&self, table: &Table<S>) -> Result<(), CursorError>
    where
        S: BuildHasher + Clone + Default,
    {
        if self.token.is_none() {
            return Err(CursorError::Closed);
        }
        if self.table_id != table.id() {
            return Err(CursorError::WrongTable);
        }
        Ok(())
    }

    fn entry<'t, S>(&self, table: &'t Table<S>) -> Option<&'t Entry>
    where
        S: BuildHasher + Clone + Default,
    {
        self.check(table).ok()?;
        self.current.and_then(|k| table.slots.get(k))
    }

    /// Key bytes of the current entry.
    pub fn key<'t, S>(&self, table: &'t Table<S>) -> Option<&'t [u8]>
    where
        S: BuildHasher + Clone + Default,
    {
        self.entry(table).map(Entry::key)
    }

    /// Extension bytes of the current entry.
    pub fn ext<'t, S>(&self, table: &'t Table<S>) -> Option<&'t [u8]>
    where
        S: BuildHasher + Clone + Default,
    {
        self.entry(table).map(Entry::ext)
    }

    /// Payload of the current entry.
    pub fn payload<'t, S>(&self, table: &'t Table<S>) -> Option<&'t [u8]>
    where
        S: BuildHasher + Clone + Default,
    {
        self.entry(table).map(|e| &e.payload[..])
    }

    /// Writable payload of the current entry.
    pub fn payload_mut<'t, S>(&self, table: &'t mut Table<S>) -> Option<&'t mut [u8]>
    where
        S: BuildHasher + Clone + Default,
    {
        self.check(table).ok()?;
        self.current
            .and_then(|k| table.slots.get_mut(k))
            .map(|e| &mut e.payload[..])
    }

    /// Move to the next entry in the table's arbitrary enumeration
    /// order, skipping entries deleted during this enumeration. Returns
    /// whether a current entry now exists. A closed or mismatched
    /// cursor reports false.
    pub fn advance<S>(&mut self, table: &Table<S>) -> bool
    where
        S: BuildHasher + Clone + Default,
    {
        if self.check(table).is_err() {
            return false;
        }
        self.step(table);
        self.current.is_some()
    }

    /// Find-or-insert `key` in the bound table and position the cursor
    /// on the entry. For a new entry, `ext` is copied after the key
    /// bytes and the payload starts zeroed. No partial mutation occurs
    /// on error.
    pub fn seek<S>(
        &mut self,
        table: &mut Table<S>,
        key: &[u8],
        ext: &[u8],
    ) -> Result<SeekOutcome, CursorError>
    where
        S: BuildHasher + Clone + Default,
    {
        self.check(table)?;
        let hash = table.hash_key(key);
        let b = table.bucket_of(hash);
        if let Some(k) = table.find_in_bucket(b, hash, key) {
            self.bucket = b;
            self.current = Some(k);
            return Ok(SeekOutcome::Existing);
        }
        let k = table.insert_entry(b, hash, key, ext);
        self.bucket = b;
        self.current = Some(k);
        // Growth would invalidate other cursors' bucket positions, so it
        // runs now only when this cursor is the sole one open; otherwise
        // it waits for the last close.
        if table.needs_growth() && table.open_cursors() == 1 {
            // Entries deferred while a sibling cursor was open can be
            // freed now: this cursor is the only one left and it sits on
            // a live entry.
            table.release_deferred();
            table.grow();
            self.bucket = table.bucket_of(hash);
        }
        Ok(SeekOutcome::Inserted)
    }

    /// Remove the cursor's current entry: run the finalize callback,
    /// unlink the entry, and advance to the next surviving entry. The
    /// storage is freed immediately when this is the only open cursor,
    /// or parked on the deferred list until the last cursor closes.
    ///
    /// With no current entry, or when a sibling cursor already deleted
    /// the current one, the cursor just advances.
    pub fn delete<S>(&mut self, table: &mut Table<S>) -> Result<(), CursorError>
    where
        S: BuildHasher + Clone + Default,
    {
        self.check(table)?;
        let Some(k) = self.current else {
            return Ok(());
        };
        if table.slots.get(k).map_or(true, |e| e.dead) {
            self.step(table);
            return Ok(());
        }
        table.finalize_entry(k);
        table.unlink(k);
        self.step(table);
        if table.open_cursors() == 1 {
            table.slots.remove(k);
        } else {
            table.deferred.push(k);
        }
        Ok(())
    }

    /// Return the cursor's token to the table. When the open-cursor
    /// count reaches zero, deferred entries are freed (their finalize
    /// callbacks already ran) and any pending growth is applied.
    pub fn close<S>(&mut self, table: &mut Table<S>) -> Result<(), CursorError>
    where
        S: BuildHasher + Clone + Default,
    {
        self.check(table)?;
        let token = self
            .token
            .take()
            .expect("check verified the token is present");
        if table.cursors.put(token) {
            table.release_deferred();
            if table.needs_growth() {
                table.grow();
            }
        }
        self.current = None;
        Ok(())
    }

    // Shared stepping logic for advance and delete: follow the chain
    // from the current entry (whose `next` link survives deletion),
    // skipping dead entries, then scan the remaining buckets.
    fn step<S>(&mut self, table: &Table<S>)
    where
        S: BuildHasher + Clone + Default,
    {
        let Some(k) = self.current else {
            return;
        };
        let mut next = table.slots.get(k).and_then(|e| e.next);
        while let Some(nk) = next {
            match table.slots.get(nk) {
                Some(e) if !e.dead => {
                    self.current = Some(nk);
                    return;
                }
                // Dead entries keep their link; keep walking.
                Some(e) => next = e.next,
                // A detached tail can only have been consumed by this
                // cursor's own earlier delete; fall through to the scan.
                None => break,
            }
        }
        match table.first_entry_from(self.bucket + 1) {
            Some((b, head)) => {
                self.bucket = b;
                self.current = Some(head);
            }
            None => self.current = None,
        }
    }
}

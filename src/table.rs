//! Table: bucket array + chaining over a slotmap arena, entry lifecycle,
//! and the growth/rehash policy gated on the open-cursor count.

use crate::tokens::UsizeCount;
use core::any::Any;
use core::hash::BuildHasher;
use slotmap::{DefaultKey, SlotMap};
use std::collections::hash_map::RandomState;
use std::sync::atomic::{AtomicU64, Ordering};

/// Initial bucket count for a fresh table; growth proceeds in
/// `n -> 2n + 1` steps from here.
const INITIAL_BUCKETS: usize = 7;

// Tables are tagged with a process-unique id so a cursor can prove it
// belongs to the table it is applied to, even after either has moved.
static NEXT_TABLE_ID: AtomicU64 = AtomicU64::new(1);

/// View of an entry handed to the finalize callback just before the
/// entry's storage is released. External references to the entry must be
/// cleaned up here; the storage is gone once the callback returns (or,
/// for a deferred release, once the last cursor closes).
pub struct FinalizeEntry<'a> {
    /// Key bytes (equality-relevant part only).
    pub key: &'a [u8],
    /// Extension bytes stored alongside the key.
    pub ext: &'a [u8],
    /// The entry's payload, still writable.
    pub payload: &'a mut [u8],
    /// The table's finalize context, if one was configured.
    pub context: Option<&'a mut dyn Any>,
}

/// Per-entry cleanup hook; see [`FinalizeEntry`].
pub type Finalizer = Box<dyn FnMut(FinalizeEntry<'_>)>;

/// Table creation parameters. All fields default to empty/zero.
#[derive(Default)]
pub struct Config {
    /// Invoked exactly once per entry, immediately before release.
    pub finalize: Option<Finalizer>,
    /// Opaque owner state, retrievable via [`Table::finalize_context`]
    /// and passed to the finalize callback.
    pub finalize_context: Option<Box<dyn Any>>,
    /// Accepted for compatibility; currently has no effect.
    pub orders: i32,
}

/// One stored key/payload record. Owned by its bucket chain while live,
/// by the deferred list after removal; never both, never neither.
pub(crate) struct Entry {
    pub(crate) next: Option<DefaultKey>,
    pub(crate) hash: u64,
    keysize: usize,
    /// Key bytes followed by extension bytes.
    keystore: Box<[u8]>,
    pub(crate) payload: Box<[u8]>,
    /// Unlinked but retained for still-open cursors. A dead entry keeps
    /// its `next` link so a cursor parked on it can walk forward.
    pub(crate) dead: bool,
}

impl Entry {
    #[inline]
    pub(crate) fn key(&self) -> &[u8] {
        &self.keystore[..self.keysize]
    }

    #[inline]
    pub(crate) fn ext(&self) -> &[u8] {
        &self.keystore[self.keysize..]
    }
}

/// Byte-keyed table with fixed-size payloads. All mutation goes through
/// an open [`Cursor`](crate::Cursor); `lookup` and the size observers are
/// direct reads.
pub struct Table<S = RandomState> {
    hasher: S,
    buckets: Vec<Option<DefaultKey>>,
    pub(crate) slots: SlotMap<DefaultKey, Entry>,
    item_size: usize,
    live: usize,
    pub(crate) cursors: UsizeCount,
    pub(crate) deferred: Vec<DefaultKey>,
    config: Config,
    id: u64,
}

impl Table<RandomState> {
    /// Create a table whose entries carry `item_size` payload bytes,
    /// with default configuration.
    pub fn new(item_size: usize) -> Self {
        Self::with_config(item_size, Config::default())
    }

    /// Create a table with an explicit configuration.
    pub fn with_config(item_size: usize, config: Config) -> Self {
        Self::with_hasher(item_size, config, RandomState::default())
    }
}

impl<S> Table<S>
where
    S: BuildHasher + Clone + Default,
{
    pub fn with_hasher(item_size: usize, config: Config, hasher: S) -> Self {
        Self {
            hasher,
            buckets: vec![None; INITIAL_BUCKETS],
            slots: SlotMap::with_key(),
            item_size,
            live: 0,
            cursors: UsizeCount::new(0),
            deferred: Vec::new(),
            config,
            id: NEXT_TABLE_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Number of live entries, O(1).
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Payload size shared by every entry in this table.
    pub fn item_size(&self) -> usize {
        self.item_size
    }

    /// Current bucket-array size.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Number of cursors currently open on this table.
    pub fn open_cursors(&self) -> usize {
        self.cursors.value()
    }

    /// The configured finalize context, for clients that stash extra
    /// state in it.
    pub fn finalize_context(&self) -> Option<&dyn Any> {
        self.config.finalize_context.as_deref()
    }

    pub fn finalize_context_mut(&mut self) -> Option<&mut dyn Any> {
        self.config.finalize_context.as_deref_mut()
    }

    /// The configured orders hint. Stored, never interpreted.
    pub fn orders(&self) -> i32 {
        self.config.orders
    }

    /// Digest of a key as this table buckets it. Deterministic for the
    /// table's lifetime; a bucket-selection aid, not a security
    /// primitive.
    pub fn hash_key(&self, key: &[u8]) -> u64 {
        self.hasher.hash_one(key)
    }

    /// Find an entry by exact key bytes and return its payload, or None.
    /// Pure read; no cursor required.
    pub fn lookup(&self, key: &[u8]) -> Option<&[u8]> {
        let hash = self.hash_key(key);
        let b = self.bucket_of(hash);
        self.find_in_bucket(b, hash, key)
            .map(|k| &self.slots[k].payload[..])
    }

    /// Like [`Table::lookup`], but the payload view is writable.
    pub fn lookup_mut(&mut self, key: &[u8]) -> Option<&mut [u8]> {
        let hash = self.hash_key(key);
        let b = self.bucket_of(hash);
        self.find_in_bucket(b, hash, key)
            .map(|k| &mut self.slots[k].payload[..])
    }

    /// Rebuild the bucket array to roughly `n_buckets` (clamped to at
    /// least one). Does nothing while any cursor is open, because a
    /// resize would invalidate bucket-relative cursor positions.
    pub fn rehash(&mut self, n_buckets: usize) {
        if self.cursors.value() > 0 {
            return;
        }
        self.rebuild(n_buckets.max(1));
    }

    #[inline]
    pub(crate) fn bucket_of(&self, hash: u64) -> usize {
        (hash % self.buckets.len() as u64) as usize
    }

    /// First non-empty bucket at or after `from`, with its chain head.
    /// Chain heads are always live: dead entries are never linked.
    pub(crate) fn first_entry_from(&self, from: usize) -> Option<(usize, DefaultKey)> {
        (from..self.buckets.len()).find_map(|b| self.buckets[b].map(|k| (b, k)))
    }

    pub(crate) fn find_in_bucket(&self, b: usize, hash: u64, key: &[u8]) -> Option<DefaultKey> {
        let mut link = self.buckets[b];
        while let Some(k) = link {
            let e = &self.slots[k];
            if e.hash == hash && e.key() == key {
                return Some(k);
            }
            link = e.next;
        }
        None
    }

    /// Allocate a new entry for `key` + `ext`, link it at the head of
    /// bucket `b`, and bump the live count. The payload starts zeroed.
    pub(crate) fn insert_entry(
        &mut self,
        b: usize,
        hash: u64,
        key: &[u8],
        ext: &[u8],
    ) -> DefaultKey {
        let mut keystore = Vec::with_capacity(key.len() + ext.len());
        keystore.extend_from_slice(key);
        keystore.extend_from_slice(ext);
        let entry = Entry {
            next: self.buckets[b],
            hash,
            keysize: key.len(),
            keystore: keystore.into_boxed_slice(),
            payload: vec![0u8; self.item_size].into_boxed_slice(),
            dead: false,
        };
        let k = self.slots.insert(entry);
        self.buckets[b] = Some(k);
        self.live += 1;
        k
    }

    /// Run the finalize callback for an entry, if one is configured.
    /// Callers guarantee this happens at most once per entry.
    pub(crate) fn finalize_entry(&mut self, k: DefaultKey) {
        let Some(entry) = self.slots.get_mut(k) else {
            return;
        };
        let Config {
            finalize,
            finalize_context,
            ..
        } = &mut self.config;
        if let Some(run) = finalize {
            let Entry {
                keystore,
                keysize,
                payload,
                ..
            } = entry;
            run(FinalizeEntry {
                key: &keystore[..*keysize],
                ext: &keystore[*keysize..],
                payload,
                context: finalize_context.as_deref_mut(),
            });
        }
    }

    /// Unlink a live entry from its bucket chain and mark it dead. The
    /// entry keeps its `next` link for cursors still parked on it.
    pub(crate) fn unlink(&mut self, k: DefaultKey) {
        let (hash, next) = {
            let e = &self.slots[k];
            (e.hash, e.next)
        };
        let b = self.bucket_of(hash);
        if self.buckets[b] == Some(k) {
            self.buckets[b] = next;
        } else {
            let mut prev = self.buckets[b].expect("unlink target must be in a non-empty chain");
            loop {
                let pn = self.slots[prev].next;
                if pn == Some(k) {
                    self.slots[prev].next = next;
                    break;
                }
                prev = pn.expect("unlink target must be linked in its bucket chain");
            }
        }
        self.slots[k].dead = true;
        self.live -= 1;
    }

    /// Free every deferred entry. Their finalize callbacks already ran
    /// at delete time. Called when the open-cursor count reaches zero.
    pub(crate) fn release_deferred(&mut self) {
        while let Some(k) = self.deferred.pop() {
            self.slots.remove(k);
        }
    }

    #[inline]
    pub(crate) fn needs_growth(&self) -> bool {
        // Grow past one entry per bucket on average.
        self.live > self.buckets.len()
    }

    /// Apply the growth policy. Only called while no cursor position
    /// depends on the current bucket layout.
    pub(crate) fn grow(&mut self) {
        let mut n = self.buckets.len().max(1);
        while self.live > n {
            n = n * 2 + 1;
        }
        if n != self.buckets.len() {
            self.rebuild(n);
        }
    }

    fn rebuild(&mut self, n: usize) {
        debug_assert!(
            self.deferred.is_empty(),
            "deferred entries cannot outlive the last cursor"
        );
        self.buckets.clear();
        self.buckets.resize(n, None);
        for (k, e) in self.slots.iter_mut() {
            let b = (e.hash % n as u64) as usize;
            e.next = self.buckets[b];
            self.buckets[b] = Some(k);
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }
}

impl<S> Drop for Table<S> {
    fn drop(&mut self) {
        // Destroying a table with open cursors is a caller contract
        // violation; deferred entries, if any, were already finalized and
        // are simply freed with the arena.
        let Config {
            finalize,
            finalize_context,
            ..
        } = &mut self.config;
        if let Some(run) = finalize {
            for (_, e) in self.slots.iter_mut() {
                if e.dead {
                    continue;
                }
                let Entry {
                    keystore,
                    keysize,
                    payload,
                    ..
                } = e;
                run(FinalizeEntry {
                    key: &keystore[..*keysize],
                    ext: &keystore[*keysize..],
                    payload,
                    context: finalize_context.as_deref_mut(),
                });
            }
        }
    }
}

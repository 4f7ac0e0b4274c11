//! Lifetime-tied linear tokens and the counting trait behind the
//! open-cursor count.
//!
//! Tokens are zero-sized proofs that a unit was acquired from a
//! particular counter instance. Dropping a token panics; the only valid
//! way to dispose of it is to return it to the originating counter via
//! `Count::put`. A cursor holds one token for as long as it is open,
//! which makes "every open is paired with a close" a fail-fast property.

use core::cell::Cell;
use core::marker::PhantomData;

/// Zero-sized, linear token tied to its originating counter via lifetime.
pub struct Token<'a, C: ?Sized> {
    // Lifetime is tracked separately from the counter type to avoid
    // imposing `'a` bounds on `C`.
    _lt: PhantomData<&'a ()>,
    _ctr: PhantomData<*const C>,
}

impl<'a, C: ?Sized> Token<'a, C> {
    #[inline]
    pub(crate) fn new() -> Self {
        Self {
            _lt: PhantomData,
            _ctr: PhantomData,
        }
    }
}

impl<'a, C: ?Sized> Drop for Token<'a, C> {
    fn drop(&mut self) {
        // Intentional fail-fast on misuse: token must be consumed by Count::put.
        panic!("Token dropped without Count::put");
    }
}

/// A source of counted units, enforced by linear Token flow.
pub trait Count {
    /// The token type minted by this counter.
    type Token<'a>: Sized
    where
        Self: 'a;

    /// Acquire one unit and return a linear token for it.
    ///
    /// Tokens are minted with a 'static lifetime parameter. The token is
    /// still branded to this counter via its type parameter, and can be
    /// covariantly shortened when returning it via `put`.
    fn get(&self) -> Self::Token<'static>;

    /// Return (consume) a previously acquired token.
    /// Returns true if the count is now zero.
    fn put<'a>(&'a self, t: Self::Token<'a>) -> bool;
}

/// Single-threaded counter of open cursors.
#[derive(Debug)]
pub struct UsizeCount {
    count: Cell<usize>,
}

impl UsizeCount {
    pub fn new(initial: usize) -> Self {
        Self {
            count: Cell::new(initial),
        }
    }

    /// Current count; used to gate rehash/growth and to pick between
    /// immediate and deferred release on delete.
    #[inline]
    pub fn value(&self) -> usize {
        self.count.get()
    }
}

impl Count for UsizeCount {
    type Token<'a>
        = Token<'a, Self>
    where
        Self: 'a;

    #[inline]
    fn get(&self) -> Self::Token<'static> {
        let c = self.count.get();
        let n = c.wrapping_add(1);
        self.count.set(n);
        if n == 0 {
            // Follow Rc semantics: abort on overflow rather than continue unsafely.
            std::process::abort();
        }
        Token::<'static, Self>::new()
    }

    #[inline]
    fn put<'a>(&'a self, t: Self::Token<'a>) -> bool {
        let c = self.count.get();
        assert!(c > 0, "UsizeCount underflow");
        let n = c - 1;
        self.count.set(n);
        core::mem::forget(t);
        n == 0
    }
}

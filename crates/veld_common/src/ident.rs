//! Interned identifiers for cheap cloning and O(1) equality comparison.

use lasso::ThreadedRodeo;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A unique identifier for any named entity in a design.
///
/// Identifiers are interned strings represented as a `u32` index into an
/// interner. Equality and hashing operate on the index, so two identifiers
/// are equal iff their handles are equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Ident(u32);

impl Ident {
    /// Creates an `Ident` from a raw `u32` index.
    ///
    /// Primarily intended for deserialization and testing. In normal use,
    /// identifiers are created through [`Interner::intern`].
    pub fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw `u32` index of this identifier.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

// SAFETY: `Ident` wraps a `u32` which is always a valid `usize` on 32-bit
// and 64-bit platforms. `try_from_usize` rejects values that don't fit.
unsafe impl lasso::Key for Ident {
    fn into_usize(self) -> usize {
        self.0 as usize
    }

    fn try_from_usize(int: usize) -> Option<Self> {
        u32::try_from(int).ok().map(Ident)
    }
}

/// Thread-safe string interner backed by [`lasso::ThreadedRodeo`].
///
/// All identifiers live for the whole run and are never freed. Concurrent
/// readers are allowed; writes are serialized inside the rodeo.
pub struct Interner {
    rodeo: ThreadedRodeo<Ident>,
    uniq_counter: AtomicU64,
}

impl Interner {
    /// Creates a new empty interner.
    pub fn new() -> Self {
        Self {
            rodeo: ThreadedRodeo::new(),
            uniq_counter: AtomicU64::new(0),
        }
    }

    /// Interns a string, returning its [`Ident`]. If the string was already
    /// interned, returns the existing identifier without allocating.
    pub fn intern(&self, s: &str) -> Ident {
        self.rodeo.get_or_intern(s)
    }

    /// Resolves an [`Ident`] back to its string value.
    ///
    /// # Panics
    ///
    /// Panics if the `Ident` was not created by this interner.
    pub fn resolve(&self, ident: Ident) -> &str {
        self.rodeo.resolve(&ident)
    }

    /// Returns the length in bytes of an identifier's string.
    pub fn len_of(&self, ident: Ident) -> usize {
        self.resolve(ident).len()
    }

    /// Composes a hierarchical identifier `a<sep>b`.
    pub fn prefix(&self, a: Ident, b: Ident, sep: char) -> Ident {
        let joined = format!("{}{sep}{}", self.resolve(a), self.resolve(b));
        self.intern(&joined)
    }

    /// Returns an identifier guaranteed fresh within this run.
    ///
    /// The result is `base` suffixed with a monotonically increasing counter,
    /// retried until it does not collide with an already-interned name.
    pub fn unique(&self, base: &str) -> Ident {
        loop {
            let n = self.uniq_counter.fetch_add(1, Ordering::Relaxed);
            let candidate = format!("{base}{n}");
            if self.rodeo.get(&candidate).is_none() {
                return self.intern(&candidate);
            }
        }
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_resolve_roundtrip() {
        let interner = Interner::new();
        let id = interner.intern("counter");
        assert_eq!(interner.resolve(id), "counter");
    }

    #[test]
    fn same_string_same_ident() {
        let interner = Interner::new();
        let a = interner.intern("clk");
        let b = interner.intern("clk");
        assert_eq!(a, b);
    }

    #[test]
    fn different_strings_different_idents() {
        let interner = Interner::new();
        let a = interner.intern("clk");
        let b = interner.intern("rst");
        assert_ne!(a, b);
    }

    #[test]
    fn reintern_is_identity() {
        let interner = Interner::new();
        let id = interner.intern("work.top");
        let again = interner.intern(interner.resolve(id).to_string().as_str());
        assert_eq!(id, again);
    }

    #[test]
    fn prefix_composes() {
        let interner = Interner::new();
        let a = interner.intern("work");
        let b = interner.intern("top");
        let joined = interner.prefix(a, b, '.');
        assert_eq!(interner.resolve(joined), "work.top");
    }

    #[test]
    fn prefix_nested() {
        let interner = Interner::new();
        let a = interner.intern("top");
        let b = interner.intern("u1");
        let c = interner.intern("clk");
        let ab = interner.prefix(a, b, '.');
        let abc = interner.prefix(ab, c, '.');
        assert_eq!(interner.resolve(abc), "top.u1.clk");
    }

    #[test]
    fn unique_never_collides() {
        let interner = Interner::new();
        // Pre-intern a name the generator would otherwise produce first.
        interner.intern("tmp0");
        let a = interner.unique("tmp");
        let b = interner.unique("tmp");
        assert_ne!(a, b);
        assert_ne!(interner.resolve(a), "tmp0");
    }

    #[test]
    fn len_of_counts_bytes() {
        let interner = Interner::new();
        let id = interner.intern("abcd");
        assert_eq!(interner.len_of(id), 4);
    }

    #[test]
    fn serde_roundtrip() {
        let id = Ident::from_raw(42);
        let json = serde_json::to_string(&id).unwrap();
        let back: Ident = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}

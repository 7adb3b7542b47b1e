//! Opaque handles addressing nodes as `(arena, index)` pairs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an arena within an [`ObjectStore`](crate::ObjectStore).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct ArenaId(u32);

impl ArenaId {
    /// Sentinel arena id marking a local (same-unit) reference inside a
    /// serialized image.
    pub(crate) const LOCAL: ArenaId = ArenaId(u32::MAX);

    /// Sentinel arena id marking an external reference inside a serialized
    /// image; the index selects a row of the image's dependency table.
    pub(crate) const EXTERN: ArenaId = ArenaId(u32::MAX - 1);

    /// Creates an `ArenaId` from a raw `u32` index.
    pub const fn from_raw(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw `u32` index.
    pub const fn as_raw(self) -> u32 {
        self.0
    }
}

/// Monotonic generation stamp assigned to each arena at creation.
///
/// Objects in an arena may reference arenas with an older generation but
/// never a newer one.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct Generation(pub u32);

/// A reference to a node: which arena it lives in and its index there.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Handle {
    /// The arena holding the node.
    pub arena: ArenaId,
    /// The node's index within the arena.
    pub index: u32,
}

impl Handle {
    /// Creates a handle from its parts.
    pub fn new(arena: ArenaId, index: u32) -> Self {
        Self { arena, index }
    }

    /// Packs the handle into a `u64` suitable as a hash-container key.
    pub fn as_bits(self) -> u64 {
        ((self.arena.0 as u64) << 32) | self.index as u64
    }

    /// Unpacks a handle previously packed with [`as_bits`](Self::as_bits).
    pub fn from_bits(bits: u64) -> Self {
        Self {
            arena: ArenaId((bits >> 32) as u32),
            index: bits as u32,
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.arena.0, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_roundtrip() {
        let h = Handle::new(ArenaId::from_raw(3), 91);
        assert_eq!(Handle::from_bits(h.as_bits()), h);
    }

    #[test]
    fn bits_distinguish_arena_and_index() {
        let a = Handle::new(ArenaId::from_raw(1), 2);
        let b = Handle::new(ArenaId::from_raw(2), 1);
        assert_ne!(a.as_bits(), b.as_bits());
    }

    #[test]
    fn generations_are_ordered() {
        assert!(Generation(1) < Generation(2));
    }

    #[test]
    fn display() {
        let h = Handle::new(ArenaId::from_raw(0), 7);
        assert_eq!(h.to_string(), "0.7");
    }
}

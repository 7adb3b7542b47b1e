//! Kind schemas, the schema digest, and the kind-transition allow-list.

use serde::{Deserialize, Serialize};
use std::fmt;
use veld_common::ContentHash;

/// The domain a node belongs to, used by the serializer and GC root
/// enumeration.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum ObjectTag {
    /// Parsed and elaborated syntax trees.
    Tree,
    /// Types.
    Type,
    /// Compiled IR units.
    IrUnit,
    /// Runtime objects created during elaboration.
    Runtime,
}

impl fmt::Display for ObjectTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectTag::Tree => write!(f, "tree"),
            ObjectTag::Type => write!(f, "type"),
            ObjectTag::IrUnit => write!(f, "ir-unit"),
            ObjectTag::Runtime => write!(f, "runtime"),
        }
    }
}

/// The item slots a kind of node may carry.
///
/// Slot names are stable across the system; each occupies one bit of a
/// kind's item mask.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum ItemSlot {
    Ident = 0,
    Base = 1,
    Elem = 2,
    Dims = 3,
    IndexConstraint = 4,
    Fields = 5,
    Params = 6,
    Result = 7,
    Resolution = 8,
    Constraint = 9,
    Literals = 10,
    Units = 11,
    Designated = 12,
    Decls = 13,
    Stmts = 14,
    Ports = 15,
    Generics = 16,
    Value = 17,
    Target = 18,
    Condition = 19,
    Type = 20,
    Ref = 21,
    Range = 22,
    Delay = 23,
    Message = 24,
    Sensitivity = 25,
    Name = 26,
}

impl ItemSlot {
    /// Returns the bitmask with only this slot set.
    pub const fn mask(self) -> u64 {
        1u64 << (self as u8)
    }
}

/// Builds an item mask from a slice of slots.
pub const fn items(slots: &[ItemSlot]) -> u64 {
    let mut mask = 0u64;
    let mut i = 0;
    while i < slots.len() {
        mask |= slots[i].mask();
        i += 1;
    }
    mask
}

/// Schema of a single node kind: its name and the item slots it carries.
#[derive(Clone, Copy, Debug)]
pub struct KindSchema {
    /// The kind's stable name.
    pub name: &'static str,
    /// Bitmask of [`ItemSlot`]s present on this kind.
    pub items: u64,
}

/// The full schema of a node domain: its tag, per-kind item masks, and the
/// allowed kind transitions.
#[derive(Debug)]
pub struct SchemaTable {
    /// The domain this schema describes.
    pub tag: ObjectTag,
    /// One entry per kind, indexed by kind number.
    pub kinds: &'static [KindSchema],
    /// Allowed `(from, to)` kind transitions.
    pub transitions: &'static [(u32, u32)],
}

impl SchemaTable {
    /// Returns `true` if the kind carries the given slot.
    pub fn has(&self, kind: u32, slot: ItemSlot) -> bool {
        self.kinds
            .get(kind as usize)
            .is_some_and(|k| k.items & slot.mask() != 0)
    }

    /// Checks that `slot` is legal for `kind`, returning a [`SchemaError`]
    /// otherwise.
    pub fn check(&self, kind: u32, slot: ItemSlot) -> Result<(), SchemaError> {
        if self.has(kind, slot) {
            Ok(())
        } else {
            Err(SchemaError {
                kind: self.kind_name(kind),
                slot,
            })
        }
    }

    /// Checks that changing a node from `from` to `to` is on the allow-list.
    pub fn check_transition(&self, from: u32, to: u32) -> Result<(), KindTransitionError> {
        if self.transitions.contains(&(from, to)) {
            Ok(())
        } else {
            Err(KindTransitionError {
                from: self.kind_name(from),
                to: self.kind_name(to),
            })
        }
    }

    /// Returns the stable name of a kind.
    pub fn kind_name(&self, kind: u32) -> &'static str {
        self.kinds
            .get(kind as usize)
            .map(|k| k.name)
            .unwrap_or("<unknown>")
    }

    /// Computes the digest of this schema.
    ///
    /// The digest covers the tag, every kind name, its item mask, and the
    /// transition table, so any change to the node layout produces a
    /// different value. Serialized units embed the digest and readers refuse
    /// units whose digest does not match.
    pub fn digest(&self) -> ContentHash {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(self.tag.to_string().as_bytes());
        for kind in self.kinds {
            bytes.push(0);
            bytes.extend_from_slice(kind.name.as_bytes());
            bytes.extend_from_slice(&kind.items.to_le_bytes());
        }
        for (from, to) in self.transitions {
            bytes.extend_from_slice(&from.to_le_bytes());
            bytes.extend_from_slice(&to.to_le_bytes());
        }
        ContentHash::from_bytes(&bytes)
    }
}

/// An item slot was accessed on a kind that does not carry it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("kind {kind} has no {slot:?} item")]
pub struct SchemaError {
    /// The offending kind's name.
    pub kind: &'static str,
    /// The slot that was accessed.
    pub slot: ItemSlot,
}

/// A kind change was attempted that is not on the allow-list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot change object kind from {from} to {to}")]
pub struct KindTransitionError {
    /// The original kind's name.
    pub from: &'static str,
    /// The requested kind's name.
    pub to: &'static str,
}

//! Type nodes and their schema.

use serde::{Deserialize, Serialize};
use veld_common::Ident;
use veld_object::schema::{items, ItemSlot};
use veld_object::{Handle, KindSchema, Node, ObjectTag, SchemaTable};

/// A reference to a type node in the store.
pub type TypeRef = Handle;

/// Direction of a discrete range.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum RangeDir {
    /// Ascending (`low to high`).
    To,
    /// Descending (`high downto low`).
    Downto,
}

/// A folded discrete range with known integer bounds.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Range {
    /// Left bound as written.
    pub left: i64,
    /// Right bound as written.
    pub right: i64,
    /// Direction of the range.
    pub dir: RangeDir,
}

impl Range {
    /// Creates an ascending range.
    pub fn to(left: i64, right: i64) -> Self {
        Self {
            left,
            right,
            dir: RangeDir::To,
        }
    }

    /// Creates a descending range.
    pub fn downto(left: i64, right: i64) -> Self {
        Self {
            left,
            right,
            dir: RangeDir::Downto,
        }
    }

    /// Returns the `(low, high)` bounds regardless of direction.
    pub fn bounds(&self) -> (i64, i64) {
        match self.dir {
            RangeDir::To => (self.left, self.right),
            RangeDir::Downto => (self.right, self.left),
        }
    }

    /// Number of values in the range; zero for a null range.
    pub fn length(&self) -> u64 {
        let (lo, hi) = self.bounds();
        if lo > hi {
            0
        } else {
            u64::try_from(hi as i128 - lo as i128 + 1).unwrap_or(u64::MAX)
        }
    }
}

/// A folded real range.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub struct RealRange {
    /// Low bound.
    pub low: f64,
    /// High bound.
    pub high: f64,
}

/// A named field of a record type.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Field {
    /// The field name.
    pub name: Ident,
    /// The field's type.
    pub ty: TypeRef,
}

/// A secondary unit of a physical type.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct PhysicalUnit {
    /// The unit name, e.g. `ns`.
    pub name: Ident,
    /// Multiplier relative to the type's primary unit.
    pub multiplier: u64,
}

/// A type node. The variant order fixes the kind numbering used by the
/// schema digest and must not be rearranged.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub enum TypeNode {
    /// A subtype of a base type, optionally constrained and resolved.
    Subtype {
        /// The subtype's name, if declared.
        ident: Option<Ident>,
        /// The base type; following `base` eventually reaches a non-subtype.
        base: TypeRef,
        /// Index or range constraint, one entry per dimension.
        constraint: Option<Vec<Range>>,
        /// Name of the resolution function, if the subtype is resolved.
        resolution: Option<Ident>,
    },
    /// An integer type.
    Integer {
        /// The type name.
        ident: Ident,
        /// The declared range.
        range: Range,
    },
    /// A floating-point type.
    Real {
        /// The type name.
        ident: Ident,
        /// The declared range.
        range: RealRange,
    },
    /// An enumeration type.
    Enum {
        /// The type name.
        ident: Ident,
        /// Literal names in declaration order.
        literals: Vec<Ident>,
    },
    /// A physical type with secondary units.
    Physical {
        /// The type name.
        ident: Ident,
        /// The declared range, in primary units.
        range: Range,
        /// Secondary units; the primary unit has multiplier 1.
        units: Vec<PhysicalUnit>,
    },
    /// A constrained array type.
    Carray {
        /// The type name, if declared.
        ident: Option<Ident>,
        /// One folded range per dimension.
        dims: Vec<Range>,
        /// The element type.
        elem: TypeRef,
    },
    /// An unconstrained array type.
    Uarray {
        /// The type name.
        ident: Ident,
        /// Index type per dimension.
        index: Vec<TypeRef>,
        /// The element type.
        elem: TypeRef,
    },
    /// A record type.
    Record {
        /// The type name.
        ident: Ident,
        /// Fields in declaration order.
        fields: Vec<Field>,
    },
    /// A file type.
    File {
        /// The type name.
        ident: Ident,
        /// The designated type.
        designated: TypeRef,
    },
    /// An access type.
    Access {
        /// The type name.
        ident: Ident,
        /// The designated type.
        designated: TypeRef,
    },
    /// A function type.
    Func {
        /// The subprogram name, if any.
        ident: Option<Ident>,
        /// Parameter types.
        params: Vec<TypeRef>,
        /// The result type.
        result: TypeRef,
    },
    /// A forward-declared type awaiting completion.
    Incomplete {
        /// The type name.
        ident: Ident,
    },
    /// A procedure type.
    Proc {
        /// The subprogram name, if any.
        ident: Option<Ident>,
        /// Parameter types.
        params: Vec<TypeRef>,
    },
    /// The error type produced after a failed analysis.
    None {
        /// The type name, if any.
        ident: Option<Ident>,
    },
    /// A protected type.
    Protected {
        /// The type name.
        ident: Ident,
    },
}

/// Kind numbers, fixed by variant order.
pub(crate) mod kind {
    pub const SUBTYPE: u32 = 0;
    pub const INTEGER: u32 = 1;
    pub const REAL: u32 = 2;
    pub const ENUM: u32 = 3;
    pub const PHYSICAL: u32 = 4;
    pub const CARRAY: u32 = 5;
    pub const UARRAY: u32 = 6;
    pub const RECORD: u32 = 7;
    pub const FILE: u32 = 8;
    pub const ACCESS: u32 = 9;
    pub const FUNC: u32 = 10;
    pub const INCOMPLETE: u32 = 11;
    pub const PROC: u32 = 12;
    pub const NONE: u32 = 13;
    pub const PROTECTED: u32 = 14;
}

static TYPE_SCHEMA: SchemaTable = SchemaTable {
    tag: ObjectTag::Type,
    kinds: &[
        KindSchema {
            name: "SUBTYPE",
            items: items(&[
                ItemSlot::Ident,
                ItemSlot::Base,
                ItemSlot::Constraint,
                ItemSlot::Resolution,
            ]),
        },
        KindSchema {
            name: "INTEGER",
            items: items(&[ItemSlot::Ident, ItemSlot::Dims]),
        },
        KindSchema {
            name: "REAL",
            items: items(&[ItemSlot::Ident, ItemSlot::Dims]),
        },
        KindSchema {
            name: "ENUM",
            items: items(&[ItemSlot::Ident, ItemSlot::Literals]),
        },
        KindSchema {
            name: "PHYSICAL",
            items: items(&[ItemSlot::Ident, ItemSlot::Dims, ItemSlot::Units]),
        },
        KindSchema {
            name: "CARRAY",
            items: items(&[ItemSlot::Ident, ItemSlot::Dims, ItemSlot::Elem]),
        },
        KindSchema {
            name: "UARRAY",
            items: items(&[ItemSlot::Ident, ItemSlot::IndexConstraint, ItemSlot::Elem]),
        },
        KindSchema {
            name: "RECORD",
            items: items(&[ItemSlot::Ident, ItemSlot::Fields]),
        },
        KindSchema {
            name: "FILE",
            items: items(&[ItemSlot::Ident, ItemSlot::Designated]),
        },
        KindSchema {
            name: "ACCESS",
            items: items(&[ItemSlot::Ident, ItemSlot::Designated]),
        },
        KindSchema {
            name: "FUNC",
            items: items(&[ItemSlot::Ident, ItemSlot::Params, ItemSlot::Result]),
        },
        KindSchema {
            name: "INCOMPLETE",
            items: items(&[ItemSlot::Ident]),
        },
        KindSchema {
            name: "PROC",
            items: items(&[ItemSlot::Ident, ItemSlot::Params]),
        },
        KindSchema {
            name: "NONE",
            items: items(&[ItemSlot::Ident]),
        },
        KindSchema {
            name: "PROTECTED",
            items: items(&[ItemSlot::Ident]),
        },
    ],
    transitions: &[
        (kind::INCOMPLETE, kind::INTEGER),
        (kind::INCOMPLETE, kind::REAL),
        (kind::INCOMPLETE, kind::PHYSICAL),
        (kind::INCOMPLETE, kind::UARRAY),
        (kind::INCOMPLETE, kind::RECORD),
        (kind::INCOMPLETE, kind::ACCESS),
        (kind::INCOMPLETE, kind::ENUM),
        (kind::INTEGER, kind::REAL),
        (kind::REAL, kind::INTEGER),
    ],
};

impl TypeNode {
    /// Returns the declared name of this type, if any.
    pub fn ident(&self) -> Option<Ident> {
        match self {
            TypeNode::Subtype { ident, .. }
            | TypeNode::Carray { ident, .. }
            | TypeNode::Func { ident, .. }
            | TypeNode::Proc { ident, .. }
            | TypeNode::None { ident } => *ident,
            TypeNode::Integer { ident, .. }
            | TypeNode::Real { ident, .. }
            | TypeNode::Enum { ident, .. }
            | TypeNode::Physical { ident, .. }
            | TypeNode::Uarray { ident, .. }
            | TypeNode::Record { ident, .. }
            | TypeNode::File { ident, .. }
            | TypeNode::Access { ident, .. }
            | TypeNode::Incomplete { ident }
            | TypeNode::Protected { ident } => Some(*ident),
        }
    }
}

impl Node for TypeNode {
    const TAG: ObjectTag = ObjectTag::Type;

    fn schema() -> &'static SchemaTable {
        &TYPE_SCHEMA
    }

    fn kind(&self) -> u32 {
        match self {
            TypeNode::Subtype { .. } => kind::SUBTYPE,
            TypeNode::Integer { .. } => kind::INTEGER,
            TypeNode::Real { .. } => kind::REAL,
            TypeNode::Enum { .. } => kind::ENUM,
            TypeNode::Physical { .. } => kind::PHYSICAL,
            TypeNode::Carray { .. } => kind::CARRAY,
            TypeNode::Uarray { .. } => kind::UARRAY,
            TypeNode::Record { .. } => kind::RECORD,
            TypeNode::File { .. } => kind::FILE,
            TypeNode::Access { .. } => kind::ACCESS,
            TypeNode::Func { .. } => kind::FUNC,
            TypeNode::Incomplete { .. } => kind::INCOMPLETE,
            TypeNode::Proc { .. } => kind::PROC,
            TypeNode::None { .. } => kind::NONE,
            TypeNode::Protected { .. } => kind::PROTECTED,
        }
    }

    fn visit_handles(&self, f: &mut dyn FnMut(Handle)) {
        match self {
            TypeNode::Subtype { base, .. } => f(*base),
            TypeNode::Carray { elem, .. } => f(*elem),
            TypeNode::Uarray { index, elem, .. } => {
                for i in index {
                    f(*i);
                }
                f(*elem);
            }
            TypeNode::Record { fields, .. } => {
                for field in fields {
                    f(field.ty);
                }
            }
            TypeNode::File { designated, .. } | TypeNode::Access { designated, .. } => {
                f(*designated)
            }
            TypeNode::Func { params, result, .. } => {
                for p in params {
                    f(*p);
                }
                f(*result);
            }
            TypeNode::Proc { params, .. } => {
                for p in params {
                    f(*p);
                }
            }
            TypeNode::Integer { .. }
            | TypeNode::Real { .. }
            | TypeNode::Enum { .. }
            | TypeNode::Physical { .. }
            | TypeNode::Incomplete { .. }
            | TypeNode::None { .. }
            | TypeNode::Protected { .. } => {}
        }
    }

    fn map_handles(&mut self, f: &mut dyn FnMut(Handle) -> Handle) {
        match self {
            TypeNode::Subtype { base, .. } => *base = f(*base),
            TypeNode::Carray { elem, .. } => *elem = f(*elem),
            TypeNode::Uarray { index, elem, .. } => {
                for i in index {
                    *i = f(*i);
                }
                *elem = f(*elem);
            }
            TypeNode::Record { fields, .. } => {
                for field in fields {
                    field.ty = f(field.ty);
                }
            }
            TypeNode::File { designated, .. } | TypeNode::Access { designated, .. } => {
                *designated = f(*designated)
            }
            TypeNode::Func { params, result, .. } => {
                for p in params {
                    *p = f(*p);
                }
                *result = f(*result);
            }
            TypeNode::Proc { params, .. } => {
                for p in params {
                    *p = f(*p);
                }
            }
            TypeNode::Integer { .. }
            | TypeNode::Real { .. }
            | TypeNode::Enum { .. }
            | TypeNode::Physical { .. }
            | TypeNode::Incomplete { .. }
            | TypeNode::None { .. }
            | TypeNode::Protected { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_bounds_ascending() {
        let r = Range::to(-5, 10);
        assert_eq!(r.bounds(), (-5, 10));
        assert_eq!(r.length(), 16);
    }

    #[test]
    fn range_bounds_descending() {
        let r = Range::downto(7, 0);
        assert_eq!(r.bounds(), (0, 7));
        assert_eq!(r.length(), 8);
    }

    #[test]
    fn null_range_has_zero_length() {
        let r = Range::to(1, 0);
        assert_eq!(r.length(), 0);
    }

    #[test]
    fn extreme_range_length() {
        let r = Range::to(i64::MIN, i64::MAX);
        assert_eq!(r.length(), u64::MAX);
    }

    #[test]
    fn kind_numbers_follow_variant_order() {
        let n = TypeNode::Incomplete {
            ident: Ident::from_raw(0),
        };
        assert_eq!(n.kind(), kind::INCOMPLETE);
        let n = TypeNode::Integer {
            ident: Ident::from_raw(0),
            range: Range::to(0, 1),
        };
        assert_eq!(n.kind(), kind::INTEGER);
    }

    #[test]
    fn schema_digest_is_stable() {
        assert_eq!(TypeNode::schema().digest(), TypeNode::schema().digest());
    }

    #[test]
    fn incomplete_transitions_allowed() {
        let schema = TypeNode::schema();
        assert!(schema.check_transition(kind::INCOMPLETE, kind::RECORD).is_ok());
        assert!(schema.check_transition(kind::INCOMPLETE, kind::ACCESS).is_ok());
        assert!(schema.check_transition(kind::RECORD, kind::INCOMPLETE).is_err());
        assert!(schema.check_transition(kind::ENUM, kind::RECORD).is_err());
    }

    #[test]
    fn universal_folding_transitions_allowed() {
        let schema = TypeNode::schema();
        assert!(schema.check_transition(kind::INTEGER, kind::REAL).is_ok());
        assert!(schema.check_transition(kind::REAL, kind::INTEGER).is_ok());
    }

    #[test]
    fn slot_checks_follow_kind() {
        let schema = TypeNode::schema();
        assert!(schema.check(kind::ENUM, ItemSlot::Literals).is_ok());
        assert!(schema.check(kind::ENUM, ItemSlot::Elem).is_err());
        assert!(schema.check(kind::UARRAY, ItemSlot::Elem).is_ok());
    }
}

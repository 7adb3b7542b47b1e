//! The VHDL type system: kinds, equality, predicates, and value parsing.
//!
//! Types are nodes in a [`veld_object`] store. A [`TypeTable`] wraps the
//! store with the operations the rest of the toolchain needs: structural
//! equality in strict and liberal flavors, the predicate set, universal
//! conversions, pretty printing, and [`parse_value`] for turning text into
//! typed values.

#![warn(missing_docs)]

pub mod std_types;
pub mod table;
pub mod ty;
pub mod value;

pub use std_types::StdTypes;
pub use table::TypeTable;
pub use ty::{Field, PhysicalUnit, Range, RangeDir, RealRange, TypeNode, TypeRef};
pub use value::{parse_value, ParsedValue};

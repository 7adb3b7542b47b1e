//! Elaboration: from analysed trees to a runnable design.
//!
//! The elaborator instantiates the hierarchy from a root entity, resolving
//! generic and port bindings, allocating signals with their layouts,
//! lowering process bodies to IR, and building the scope tree the kernel
//! and shell navigate. Elaboration errors are fatal and carry a source
//! location; they are reported through the diagnostic sink before the
//! elaborator returns.

#![warn(missing_docs)]

pub mod const_eval;
pub mod design;
pub mod elab;
pub mod error;
pub mod lower;

pub use design::{Design, ProcessDef, Resolution, Scope, SignalDef, UnitIndex};
pub use elab::elaborate;
pub use error::ElabError;

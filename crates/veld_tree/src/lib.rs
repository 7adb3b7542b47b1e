//! Design trees: declarations, statements, and expressions.
//!
//! Tree nodes live in a [`veld_object`] store of their own and reference
//! types in the session's [`TypeTable`](veld_types::TypeTable) and names in
//! the interner. The tree-domain handle walkers cover only tree handles;
//! type references have their own walkers so the library manager can rewrite
//! them across serialization.

#![warn(missing_docs)]

pub mod builder;
pub mod eq;
pub mod node;

pub use builder::TreeStore;
pub use eq::tree_strict_eq;
pub use node::{BinaryOp, PortMode, TreeData, TreeNode, TreeRef, UnaryOp};

//! Shared foundational types used across the veld VHDL toolchain.
//!
//! This crate provides interned identifiers, content hashing, the canonical
//! hash containers used by the compiler core, the nine-value logic scalar,
//! and common result types.

#![warn(missing_docs)]

pub mod hash;
pub mod ident;
pub mod logic;
pub mod map;
pub mod result;

pub use hash::ContentHash;
pub use ident::{Ident, Interner};
pub use logic::Logic;
pub use result::{InternalError, VeldResult};

//! Source file management and location tracking for diagnostics.
//!
//! This crate provides the [`SourceDb`] for registering source files,
//! [`FileId`] handles, and the [`Loc`] type recording where in a source file
//! a tree node or diagnostic originated.

#![warn(missing_docs)]

pub mod loc;
pub mod source_db;

pub use loc::{FileId, Loc};
pub use source_db::SourceDb;

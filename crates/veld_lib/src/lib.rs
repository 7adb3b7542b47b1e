//! Named design libraries persisted on disk.
//!
//! A library is a directory holding a JSON catalog and one binary file per
//! design unit. Unit files carry magic bytes, the tool version, the schema
//! digests, and dependency triples ahead of the serialized arenas; any
//! mismatch on load surfaces as [`StaleUnitError`](veld_object::StaleUnitError)
//! without touching session state. The manager memoizes loads and links
//! cross-unit references back together.

#![warn(missing_docs)]

pub mod catalog;
pub mod error;
pub mod format;
pub mod manager;

pub use catalog::{Catalog, UnitMeta};
pub use error::LibError;
pub use format::{UnitFile, UnitPayload};
pub use manager::{LibraryManager, LoadedUnit};

/// The tool version stamped into unit files and catalogs.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

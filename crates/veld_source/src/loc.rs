//! Source locations: file id plus line, column, and length.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier for a source file registered in the
/// [`SourceDb`](crate::SourceDb).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct FileId(u32);

impl FileId {
    /// A dummy file ID used for synthetic locations.
    pub const DUMMY: FileId = FileId(u32::MAX);

    /// Creates a `FileId` from a raw `u32` value.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw `u32` value of this `FileId`.
    pub fn as_raw(self) -> u32 {
        self.0
    }
}

/// A location within a source file.
///
/// Locations are carried by every tree node and diagnostic. Lines and
/// columns are one-based; `length` is the number of characters covered.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Loc {
    /// The source file this location belongs to.
    pub file: FileId,
    /// One-based line number.
    pub line: u32,
    /// One-based column number.
    pub column: u32,
    /// Number of characters covered.
    pub length: u32,
}

impl Loc {
    /// A dummy location used when no source position is available.
    pub const DUMMY: Loc = Loc {
        file: FileId::DUMMY,
        line: 0,
        column: 0,
        length: 0,
    };

    /// Creates a new location.
    pub fn new(file: FileId, line: u32, column: u32, length: u32) -> Self {
        Self {
            file,
            line,
            column,
            length,
        }
    }

    /// Returns `true` if this is the dummy location.
    pub fn is_dummy(&self) -> bool {
        self.file == FileId::DUMMY
    }
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_dummy() {
            write!(f, "<no location>")
        } else {
            write!(f, "{}:{}", self.line, self.column)
        }
    }
}

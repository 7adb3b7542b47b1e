//! Error types for library operations.

use std::path::PathBuf;
use veld_object::StaleUnitError;

/// Errors from loading or saving design libraries.
#[derive(Debug, thiserror::Error)]
pub enum LibError {
    /// An I/O error while reading or writing library files.
    #[error("library I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The named library is not on the search path.
    #[error("library {0} not found on search path")]
    UnknownLibrary(String),

    /// The named unit does not exist in the library.
    #[error("unit {unit} not found in library {library}")]
    UnknownUnit {
        /// The library searched.
        library: String,
        /// The unit requested.
        unit: String,
    },

    /// The unit file is malformed (bad magic, truncated, or undecodable).
    #[error("corrupt unit file {path}: {reason}")]
    Corrupt {
        /// The unit file path.
        path: PathBuf,
        /// What was wrong.
        reason: String,
    },

    /// The unit is incompatible with the current tool or library state.
    ///
    /// Recoverable by re-analysing the unit's sources.
    #[error(transparent)]
    Stale(#[from] StaleUnitError),

    /// Serialization of a unit failed.
    #[error("failed to serialize unit: {0}")]
    Serialize(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_unit_display() {
        let err = LibError::UnknownUnit {
            library: "work".into(),
            unit: "top".into(),
        };
        assert_eq!(err.to_string(), "unit top not found in library work");
    }

    #[test]
    fn corrupt_display() {
        let err = LibError::Corrupt {
            path: PathBuf::from("work/top.unit"),
            reason: "bad magic".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("top.unit"));
        assert!(msg.contains("bad magic"));
    }

    #[test]
    fn stale_wraps_object_error() {
        let err: LibError = StaleUnitError::MissingDependency {
            library: "std".into(),
            unit: "standard".into(),
        }
        .into();
        assert!(err.to_string().contains("missing dependency"));
    }
}

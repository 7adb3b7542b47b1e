//! Elaboration errors.

use veld_source::Loc;

/// Fatal elaboration failures, each carrying a source location.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ElabError {
    /// A name could not be resolved in the current scope.
    #[error("no visible declaration for {name}")]
    UnresolvedName {
        /// The unresolved name.
        name: String,
        /// Where the reference appeared.
        loc: Loc,
    },

    /// A formal and its actual have incompatible types.
    #[error("type mismatch: {detail}")]
    TypeMismatch {
        /// What mismatched.
        detail: String,
        /// Where the binding appeared.
        loc: Loc,
    },

    /// A value violates the constraint of its type.
    #[error("value {value} outside range of {ty}")]
    ConstraintUnsatisfied {
        /// The offending value.
        value: i64,
        /// Name of the constrained type.
        ty: String,
        /// Where the value appeared.
        loc: Loc,
    },

    /// An entity transitively instantiates itself.
    #[error("circular instantiation of entity {name}")]
    CircularInstantiation {
        /// The entity forming the cycle.
        name: String,
        /// Where the instantiation appeared.
        loc: Loc,
    },

    /// A signal has several drivers but its type has no resolution.
    #[error("signal {name} has {drivers} drivers but an unresolved type")]
    UnresolvedMultipleDrivers {
        /// The signal's name.
        name: String,
        /// Number of drivers found.
        drivers: usize,
        /// Where the signal was declared.
        loc: Loc,
    },

    /// A construct the elaborator does not support.
    #[error("unsupported construct: {detail}")]
    Unsupported {
        /// What was unsupported.
        detail: String,
        /// Where it appeared.
        loc: Loc,
    },
}

impl ElabError {
    /// Returns the source location the error carries.
    pub fn loc(&self) -> Loc {
        match self {
            ElabError::UnresolvedName { loc, .. }
            | ElabError::TypeMismatch { loc, .. }
            | ElabError::ConstraintUnsatisfied { loc, .. }
            | ElabError::CircularInstantiation { loc, .. }
            | ElabError::UnresolvedMultipleDrivers { loc, .. }
            | ElabError::Unsupported { loc, .. } => *loc,
        }
    }
}

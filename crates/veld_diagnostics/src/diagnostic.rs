//! Structured diagnostic messages with severity, location, and hints.

use crate::severity::Severity;
use serde::{Deserialize, Serialize};
use veld_source::Loc;

/// A structured diagnostic message.
///
/// Each diagnostic has a severity, an optional source location, a primary
/// message, and zero or more hints providing extra context or suggested
/// actions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity level of this diagnostic.
    pub severity: Severity,
    /// The source location the issue was detected at, if known.
    pub loc: Option<Loc>,
    /// The main diagnostic message.
    pub message: String,
    /// Additional context lines attached to this diagnostic.
    pub hints: Vec<String>,
}

impl Diagnostic {
    /// Creates a new diagnostic with the given severity and message.
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            loc: None,
            message: message.into(),
            hints: Vec::new(),
        }
    }

    /// Creates an error diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    /// Creates a warning diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    /// Creates a note diagnostic.
    pub fn note(message: impl Into<String>) -> Self {
        Self::new(Severity::Note, message)
    }

    /// Creates a fatal diagnostic.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(Severity::Fatal, message)
    }

    /// Sets the source location.
    pub fn at(mut self, loc: Loc) -> Self {
        self.loc = Some(loc);
        self
    }

    /// Appends a hint line.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veld_source::FileId;

    #[test]
    fn create_error() {
        let diag = Diagnostic::error("no visible declaration for CLK");
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.message, "no visible declaration for CLK");
        assert!(diag.loc.is_none());
        assert!(diag.hints.is_empty());
    }

    #[test]
    fn builder_attaches_loc_and_hints() {
        let loc = Loc::new(FileId::from_raw(0), 12, 3, 5);
        let diag = Diagnostic::error("type mismatch in port map")
            .at(loc)
            .with_hint("formal CLK has type STD_LOGIC")
            .with_hint("actual COUNT has type INTEGER");
        assert_eq!(diag.loc, Some(loc));
        assert_eq!(diag.hints.len(), 2);
    }

    #[test]
    fn severity_constructors() {
        assert_eq!(Diagnostic::note("n").severity, Severity::Note);
        assert_eq!(Diagnostic::warning("w").severity, Severity::Warning);
        assert_eq!(Diagnostic::fatal("f").severity, Severity::Fatal);
    }

    #[test]
    fn serde_roundtrip() {
        let diag = Diagnostic::warning("unused signal S").at(Loc::DUMMY);
        let json = serde_json::to_string(&diag).unwrap();
        let back: Diagnostic = serde_json::from_str(&json).unwrap();
        assert_eq!(diag, back);
    }
}

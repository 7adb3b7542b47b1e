//! Thread-safe diagnostic accumulator with a queued hint chain.

use crate::diagnostic::Diagnostic;
use crate::severity::Severity;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// A thread-safe accumulator for diagnostics.
///
/// Multiple threads can emit diagnostics concurrently via
/// [`emit`](Self::emit). The error count is tracked atomically for fast
/// `has_errors` checks without locking the diagnostic vector.
///
/// Hints may be queued ahead of time with [`hint`](Self::hint); queued hints
/// are flushed onto the next emitted error-or-worse diagnostic, and
/// discarded if the surrounding operation completes without emitting one.
pub struct DiagnosticSink {
    diagnostics: Mutex<Vec<Diagnostic>>,
    pending_hints: Mutex<Vec<String>>,
    error_count: AtomicUsize,
}

impl DiagnosticSink {
    /// Creates a new empty diagnostic sink.
    pub fn new() -> Self {
        Self {
            diagnostics: Mutex::new(Vec::new()),
            pending_hints: Mutex::new(Vec::new()),
            error_count: AtomicUsize::new(0),
        }
    }

    /// Queues a hint to be attached to the next emitted error.
    pub fn hint(&self, hint: impl Into<String>) {
        self.pending_hints.lock().unwrap().push(hint.into());
    }

    /// Discards any queued hints.
    pub fn clear_hints(&self) {
        self.pending_hints.lock().unwrap().clear();
    }

    /// Emits a diagnostic into the sink.
    ///
    /// Error-or-worse diagnostics absorb any queued hints and bump the
    /// error count.
    pub fn emit(&self, mut diag: Diagnostic) {
        if diag.severity >= Severity::Error {
            let mut pending = self.pending_hints.lock().unwrap();
            diag.hints.extend(pending.drain(..));
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }
        self.diagnostics.lock().unwrap().push(diag);
    }

    /// Returns `true` if any error-severity diagnostics have been emitted.
    pub fn has_errors(&self) -> bool {
        self.error_count.load(Ordering::Relaxed) > 0
    }

    /// Returns the number of error-severity diagnostics emitted so far.
    pub fn error_count(&self) -> usize {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Takes all accumulated diagnostics, leaving the sink empty.
    ///
    /// The error count is not reset; it reflects the whole run.
    pub fn take_all(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.diagnostics.lock().unwrap())
    }

    /// Returns a snapshot of all accumulated diagnostics without draining.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.lock().unwrap().clone()
    }
}

impl Default for DiagnosticSink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sink() {
        let sink = DiagnosticSink::new();
        assert!(!sink.has_errors());
        assert_eq!(sink.error_count(), 0);
        assert!(sink.take_all().is_empty());
    }

    #[test]
    fn emit_error_counts() {
        let sink = DiagnosticSink::new();
        sink.emit(Diagnostic::error("bad"));
        sink.emit(Diagnostic::warning("iffy"));
        sink.emit(Diagnostic::error("worse"));
        assert!(sink.has_errors());
        assert_eq!(sink.error_count(), 2);
        assert_eq!(sink.diagnostics().len(), 3);
    }

    #[test]
    fn warnings_do_not_count_as_errors() {
        let sink = DiagnosticSink::new();
        sink.emit(Diagnostic::warning("only a warning"));
        assert!(!sink.has_errors());
    }

    #[test]
    fn queued_hints_attach_to_next_error() {
        let sink = DiagnosticSink::new();
        sink.hint("while elaborating instance U1");
        sink.hint("generic WIDTH bound to 8");
        sink.emit(Diagnostic::error("port COUNT not connected"));

        let diags = sink.take_all();
        assert_eq!(diags.len(), 1);
        assert_eq!(
            diags[0].hints,
            vec![
                "while elaborating instance U1".to_string(),
                "generic WIDTH bound to 8".to_string()
            ]
        );
    }

    #[test]
    fn hints_skip_warnings() {
        let sink = DiagnosticSink::new();
        sink.hint("context");
        sink.emit(Diagnostic::warning("unused"));
        sink.emit(Diagnostic::error("broken"));

        let diags = sink.take_all();
        assert!(diags[0].hints.is_empty());
        assert_eq!(diags[1].hints, vec!["context".to_string()]);
    }

    #[test]
    fn hints_flushed_only_once() {
        let sink = DiagnosticSink::new();
        sink.hint("context");
        sink.emit(Diagnostic::error("first"));
        sink.emit(Diagnostic::error("second"));

        let diags = sink.take_all();
        assert_eq!(diags[0].hints.len(), 1);
        assert!(diags[1].hints.is_empty());
    }

    #[test]
    fn clear_hints_discards() {
        let sink = DiagnosticSink::new();
        sink.hint("stale context");
        sink.clear_hints();
        sink.emit(Diagnostic::error("oops"));
        assert!(sink.take_all()[0].hints.is_empty());
    }

    #[test]
    fn take_all_drains() {
        let sink = DiagnosticSink::new();
        sink.emit(Diagnostic::note("info"));
        assert_eq!(sink.take_all().len(), 1);
        assert!(sink.take_all().is_empty());
    }

    #[test]
    fn concurrent_emit() {
        use std::sync::Arc;
        let sink = Arc::new(DiagnosticSink::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let sink = Arc::clone(&sink);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        sink.emit(Diagnostic::error("concurrent"));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(sink.error_count(), 400);
        assert_eq!(sink.diagnostics().len(), 400);
    }
}

//! Thread-safe collection point for diagnostics.

use crate::diagnostic::{Diagnostic, Severity};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Accumulates diagnostics from any thread.
///
/// The error count lives in an atomic so `has_errors` never takes the lock;
/// the test driver polls it after every file.
pub struct DiagnosticSink {
    diagnostics: Mutex<Vec<Diagnostic>>,
    errors: AtomicUsize,
}

impl DiagnosticSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self {
            diagnostics: Mutex::new(Vec::new()),
            errors: AtomicUsize::new(0),
        }
    }

    /// Records a diagnostic.
    pub fn emit(&self, diag: Diagnostic) {
        if diag.severity == Severity::Error {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
        self.diagnostics.lock().unwrap().push(diag);
    }

    /// Returns `true` if any error has been emitted.
    pub fn has_errors(&self) -> bool {
        self.errors.load(Ordering::Relaxed) > 0
    }

    /// Number of errors emitted so far.
    pub fn error_count(&self) -> usize {
        self.errors.load(Ordering::Relaxed)
    }

    /// Drains every collected diagnostic, leaving the sink empty.
    pub fn drain(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.diagnostics.lock().unwrap())
    }

    /// The first error-severity diagnostic, if any, without draining.
    pub fn first_error(&self) -> Option<Diagnostic> {
        self.diagnostics
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.severity == Severity::Error)
            .cloned()
    }
}

impl Default for DiagnosticSink {
    fn default() -> Self {
        Self::new()
    }
}

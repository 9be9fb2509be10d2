//! Diagnostic values: severity, code, message, and location.

use galena_source::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How serious a diagnostic is.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum Severity {
    /// Additional context attached to another diagnostic.
    Note,
    /// A suspicious construct that does not stop the run.
    Warning,
    /// A problem that makes the current evaluation fail.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Note => write!(f, "note"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A stable diagnostic code, displayed as `E` plus a zero-padded number.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct DiagCode(pub u16);

/// Codes emitted by the lexer and parser.
impl DiagCode {
    /// Malformed token or unexpected input at the lexical level.
    pub const LEX: DiagCode = DiagCode(100);
    /// Syntax error: the parser expected a different token.
    pub const SYNTAX: DiagCode = DiagCode(101);
    /// A recognized SystemVerilog construct outside the supported subset.
    pub const UNSUPPORTED: DiagCode = DiagCode(102);
    /// A port or signal declared twice.
    pub const REDECLARED: DiagCode = DiagCode(103);
}

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{:03}", self.0)
    }
}

/// A single structured diagnostic.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity of the problem.
    pub severity: Severity,
    /// Stable code identifying the class of problem.
    pub code: DiagCode,
    /// Human-readable, single-sentence message.
    pub message: String,
    /// Where in the source the problem was detected.
    pub span: Span,
    /// Extra context lines rendered as `note: …`.
    pub notes: Vec<String>,
}

impl Diagnostic {
    /// Creates an error diagnostic.
    pub fn error(code: DiagCode, message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            span,
            notes: Vec::new(),
        }
    }

    /// Creates a warning diagnostic.
    pub fn warning(code: DiagCode, message: impl Into<String>, span: Span) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
            span,
            notes: Vec::new(),
        }
    }

    /// Attaches a note.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

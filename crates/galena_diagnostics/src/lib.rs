//! Structured diagnostics for the Galena simulator.
//!
//! Parsing and resolution report problems as [`Diagnostic`] values collected
//! in a thread-safe [`DiagnosticSink`]; the CLI renders them with
//! [`render_terminal`]. Library crates never print.

#![warn(missing_docs)]

mod diagnostic;
mod render;
mod sink;

pub use diagnostic::{DiagCode, Diagnostic, Severity};
pub use render::render_terminal;
pub use sink::DiagnosticSink;

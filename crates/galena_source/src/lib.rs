//! Source file management for the Galena simulator.
//!
//! Owns the text of every loaded `.sv` and ROM data file and resolves
//! byte-offset spans back to `file:line:column` locations for error
//! reporting.

#![warn(missing_docs)]

mod db;
mod span;

pub use db::{ResolvedSpan, SourceDb, SourceFile};
pub use span::{FileId, Span};

//! Lexer and parser for the SystemVerilog subset accepted by Galena.
//!
//! The subset covers combinational and clocked modules built from
//! continuous assignments, `always_comb`/`always_ff` procedures, memory
//! arrays, and hierarchical instantiation. Everything else in the language
//! is *recognized* (the keyword table covers far more than the subset)
//! and reported as an unsupported construct rather than silently skipped.
//!
//! Entry point: [`parse_file`], which lexes and parses one source file into
//! a [`ast::SourceFile`]. Errors land in the caller's
//! [`DiagnosticSink`](galena_diagnostics::DiagnosticSink); an AST is always
//! produced so that tooling can inspect partial results, but a sink with
//! errors must be treated as a failed parse.

#![warn(missing_docs)]

pub mod ast;
mod decl;
mod expr;
mod lexer;
mod parser;
mod stmt;
pub mod token;

pub use lexer::lex;
pub use parser::Parser;

use galena_common::Interner;
use galena_diagnostics::DiagnosticSink;
use galena_source::FileId;

/// Lexes and parses `source`, reporting problems to `sink`.
pub fn parse_file(
    source: &str,
    file: FileId,
    interner: &Interner,
    sink: &DiagnosticSink,
) -> ast::SourceFile {
    let tokens = lexer::lex(source, file, sink);
    Parser::new(tokens, source, interner, sink).parse_source_file()
}

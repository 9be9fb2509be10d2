//! Evaluator error types.
//!
//! Every variant carries the module name and a `path:line:col` location
//! string so the driver can print a one-line summary. Test-case
//! mismatches are not errors; they are data returned by the facades.

use galena_resolve::ResolveError;

/// Errors raised while evaluating a module.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// The resolver failed to produce a module.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// A supplied input's width does not match the port declaration.
    #[error("module '{module}': input '{port}' is {given} bits wide, expected {expected} ({location})")]
    PortWidthMismatch {
        /// The module being evaluated.
        module: String,
        /// The offending input port.
        port: String,
        /// Width of the supplied value.
        given: u32,
        /// Width the port declares.
        expected: u32,
        /// `path:line:col` of the port declaration.
        location: String,
    },

    /// An identifier was read before anything bound it.
    #[error("module '{module}': undefined identifier '{name}' ({location})")]
    UndefinedIdentifier {
        /// The module being evaluated.
        module: String,
        /// The unresolved name.
        name: String,
        /// `path:line:col` of the reference.
        location: String,
    },

    /// A bit or range select reached outside its operand.
    #[error("module '{module}': {message} ({location})")]
    IndexOut {
        /// The module being evaluated.
        module: String,
        /// What went out of range.
        message: String,
        /// `path:line:col` of the select.
        location: String,
    },

    /// A width could not be established (unsized literal in a
    /// concatenation, replication overflow, …).
    #[error("module '{module}': {message} ({location})")]
    WidthMismatch {
        /// The module being evaluated.
        module: String,
        /// What is inconsistent.
        message: String,
        /// `path:line:col` of the expression.
        location: String,
    },

    /// Reserved: the subset has no division operator, so this is never
    /// emitted today. It exists so drivers matching on error kinds do not
    /// break if division is ever admitted.
    #[error("module '{module}': division by zero ({location})")]
    DivZero {
        /// The module being evaluated.
        module: String,
        /// `path:line:col` of the expression.
        location: String,
    },

    /// The dataflow fixpoint stopped making progress with outputs unbound.
    #[error("module '{module}': combinational cycle, outputs never settled: {outputs:?}")]
    CombinationalCycle {
        /// The module being evaluated.
        module: String,
        /// The outputs that never received a value.
        outputs: Vec<String>,
    },

    /// A construct that parses but cannot be evaluated in this position.
    #[error("module '{module}': {message} ({location})")]
    Unsupported {
        /// The module being evaluated.
        module: String,
        /// What was attempted.
        message: String,
        /// `path:line:col` of the construct.
        location: String,
    },
}

//! Resolver error types.

use std::io;
use std::path::PathBuf;

/// Errors raised while locating, parsing, or validating a module.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// No `<name>.sv` exists in the referrer's directory.
    #[error("module '{name}' not found: no {name}.sv in {}", dir.display())]
    ModuleNotFound {
        /// The referenced module name.
        name: String,
        /// The directory that was searched.
        dir: PathBuf,
    },

    /// A ROM primitive's data file is missing from every search location.
    #[error("ROM data file '{file}' for module '{module}' not found")]
    RomDataMissing {
        /// The ROM primitive module name.
        module: String,
        /// The data file name that was searched for.
        file: String,
    },

    /// A ROM data file exists but its contents are malformed.
    #[error("{}:{line}: {message}", path.display())]
    RomDataInvalid {
        /// The data file path.
        path: PathBuf,
        /// 1-based line number of the bad line.
        line: usize,
        /// What is wrong with it.
        message: String,
    },

    /// The source file failed to lex or parse. Carries the first error.
    #[error("{}:{line}:{col}: {message}", path.display())]
    Parse {
        /// The source file path.
        path: PathBuf,
        /// 1-based line of the first error.
        line: u32,
        /// 1-based column of the first error.
        col: u32,
        /// The first error's message.
        message: String,
    },

    /// The module parsed but violates a structural rule (bad range,
    /// re-declared port, undeclared non-ANSI port, …).
    #[error("module '{module}': {message}")]
    Invalid {
        /// The offending module's name.
        module: String,
        /// What is wrong with it.
        message: String,
    },

    /// The file defining the module could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// The path that failed.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

//! Module resolution for the Galena simulator.
//!
//! Given a module name and the directory of its referrer, the
//! [`ModuleCache`] finds `<name>.sv`, parses it once, runs the width
//! inference pass, detects ROM primitives, and memoizes the result by
//! absolute path and module name. The cache is safe to share across the
//! test driver's worker threads and exposes [`ModuleCache::clear`] so
//! edited modules take effect without a restart.

#![warn(missing_docs)]

mod cache;
mod error;
mod module;
mod rom;
mod widths;

pub use cache::ModuleCache;
pub use error::ResolveError;
pub use module::{MemoryInfo, ModuleInfo, Port, PortDirection};
pub use rom::{read_memory_file, RomData};

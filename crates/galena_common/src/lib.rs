//! Shared primitives for the Galena simulator.
//!
//! - [`Ident`] / [`Interner`]: interned identifiers with O(1) equality,
//!   used for every signal, port, and module name.
//! - [`Bits`]: the width-tagged bit-vector value that flows through the
//!   evaluators.

#![warn(missing_docs)]

mod bits;
mod ident;

pub use bits::{Bits, CompareOp, MAX_WIDTH};
pub use ident::{Ident, Interner};

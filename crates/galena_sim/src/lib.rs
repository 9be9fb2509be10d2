//! Evaluation engines for the Galena simulator.
//!
//! The crate is organized around the two ways a module is driven:
//!
//! - [`comb::evaluate`] drives combinational modules: outputs are a pure
//!   function of inputs, computed by a dataflow fixpoint that expands
//!   child instances recursively.
//! - [`SeqSim`] drives sequential modules: per-instance registers and
//!   memories carried across cycles, `always_ff` blocks triggered on
//!   rising clock edges with two-phase non-blocking commits.
//!
//! On top of those sit the facades the drivers call: truth-table
//! enumeration ([`table::enumerate`]), sequence stepping
//! ([`run_sequence`]), and the JSON test-case loader/runners
//! ([`testcase`]). Test mismatches are data ([`StepMismatch`]), never
//! errors; everything fatal is a [`SimError`].

#![warn(missing_docs)]

pub mod comb;
mod env;
mod error;
mod eval;
mod seq;
pub mod sequence;
pub mod table;
pub mod testcase;

pub use env::SignalEnv;
pub use error::SimError;
pub use eval::{eval_expr, EvalCtx, LvalueSlot};
pub use seq::SeqSim;
pub use sequence::{run_sequence, CaseResult, MemoryPreload, SequenceStep, StepMismatch};
pub use table::{enumerate, TruthTable};

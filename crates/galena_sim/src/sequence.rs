//! Sequential test stepping: drive a module through `(inputs → expected)`
//! sequences and collect mismatches as data.

use crate::error::SimError;
use crate::seq::SeqSim;
use galena_common::Bits;
use galena_resolve::{ModuleCache, ModuleInfo};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// One step of a sequence: named input values and expected outputs.
/// Inputs not mentioned default to zero; outputs not mentioned are not
/// checked.
#[derive(Clone, Debug, Default)]
pub struct SequenceStep {
    /// Input name → value for this step.
    pub inputs: HashMap<String, u64>,
    /// Output name → expected value after this step.
    pub expected: HashMap<String, u64>,
}

/// A memory preload: every instance of `module` gets `memory`
/// initialized from `words`.
pub struct MemoryPreload {
    /// The module whose instances are preloaded.
    pub module: String,
    /// The memory array inside that module.
    pub memory: String,
    /// Address → word contents.
    pub words: HashMap<u64, u64>,
}

/// An expectation that did not hold.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepMismatch {
    /// The checked output's name.
    pub signal: String,
    /// Zero-based index of the step (or combinational case).
    pub step_index: usize,
    /// The simulated value; `None` when the module has no such output.
    pub actual: Option<u64>,
    /// The value the test expected.
    pub expected: u64,
}

impl fmt::Display for StepMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.actual {
            Some(actual) => write!(
                f,
                "step {}: {} = {}, expected {}",
                self.step_index, self.signal, actual, self.expected
            ),
            None => write!(
                f,
                "step {}: output '{}' not found (expected {})",
                self.step_index, self.signal, self.expected
            ),
        }
    }
}

/// The outcome of one named sequence.
#[derive(Debug)]
pub struct CaseResult {
    /// The test case's name.
    pub name: String,
    /// How many steps ran.
    pub steps: usize,
    /// Every expectation that failed, in step order.
    pub mismatches: Vec<StepMismatch>,
}

impl CaseResult {
    /// `true` when every expectation held.
    pub fn passed(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Steps a sequential module through one named test sequence.
///
/// A fresh simulator (fresh state) is used per sequence; clock inputs are
/// stepped through [`SeqSim::tick`], so each step driving `clk = 1`
/// produces exactly one rising edge.
pub fn run_sequence(
    cache: &ModuleCache,
    top: Arc<ModuleInfo>,
    name: &str,
    steps: &[SequenceStep],
    preloads: &[MemoryPreload],
) -> Result<CaseResult, SimError> {
    let mut sim = SeqSim::new(cache, top);
    for preload in preloads {
        sim.preload_memory(&preload.module, &preload.memory, preload.words.clone());
    }

    let mut mismatches = Vec::new();
    for (index, step) in steps.iter().enumerate() {
        let mut inputs = HashMap::new();
        for port in sim.top().inputs() {
            let text = cache.interner().resolve(port.name);
            let value = step.inputs.get(text).copied().unwrap_or(0);
            inputs.insert(port.name, Bits::new(port.width, value));
        }

        let outputs = sim.tick(&inputs)?;

        for (signal, &expected) in &step.expected {
            let actual = sim
                .top()
                .outputs()
                .find(|p| cache.interner().resolve(p.name) == signal)
                .and_then(|p| outputs.get(&p.name))
                .map(|v| v.value());
            if actual != Some(expected) {
                mismatches.push(StepMismatch {
                    signal: signal.clone(),
                    step_index: index,
                    actual,
                    expected,
                });
            }
        }
    }

    mismatches.sort_by_key(|m| m.step_index);
    Ok(CaseResult {
        name: name.to_string(),
        steps: steps.len(),
        mismatches,
    })
}

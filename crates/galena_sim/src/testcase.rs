//! The JSON test-case model and runners.
//!
//! Combinational tests are an array of objects: every key is an input
//! value except `"expect"`, which maps outputs to expected values.
//! Sequential tests are an object with `"sequential": true`, optional
//! `"memory_files"` preloads, and named `"test_cases"` each holding a
//! `"sequence"` of `{inputs, expected}` steps.

use crate::comb;
use crate::error::SimError;
use crate::sequence::{self, CaseResult, MemoryPreload, SequenceStep, StepMismatch};
use galena_common::Bits;
use galena_resolve::{read_memory_file, ModuleCache, ModuleInfo};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// One combinational test case: input values plus expectations.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CombCase {
    /// Input name → value. Unlisted inputs default to zero.
    #[serde(flatten)]
    pub inputs: HashMap<String, u64>,
    /// Output name → expected value. Unlisted outputs are not checked.
    #[serde(default)]
    pub expect: HashMap<String, u64>,
}

/// A `memory_files` binding in a sequential test file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MemoryFileBinding {
    /// The module whose instances receive the preload.
    pub module: String,
    /// The memory array to initialize.
    pub memory: String,
    /// The data file, relative to the test file's directory.
    pub file: String,
}

/// One step of a sequential test case.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SeqStep {
    /// Input name → value for this step.
    #[serde(default)]
    pub inputs: HashMap<String, u64>,
    /// Output name → expected value after this step.
    #[serde(default)]
    pub expected: HashMap<String, u64>,
}

/// A named sequential test case.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SequentialCase {
    /// The case's name, used in reports.
    pub name: String,
    /// The steps, applied in order to a fresh simulator.
    pub sequence: Vec<SeqStep>,
}

/// A sequential test file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SequentialTests {
    /// Always `true`; distinguishes the layout from combinational files.
    pub sequential: bool,
    /// RAM/ROM preloads applied before each case.
    #[serde(default)]
    pub memory_files: Vec<MemoryFileBinding>,
    /// The named cases.
    pub test_cases: Vec<SequentialCase>,
}

/// Either layout of a test file.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TestFile {
    /// `{"sequential": true, …}`
    Sequential(SequentialTests),
    /// `[ {…, "expect": {…}}, … ]`
    Combinational(Vec<CombCase>),
}

/// Errors loading a test file, before any simulation runs.
#[derive(Debug, thiserror::Error)]
pub enum TestLoadError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The path that failed.
        path: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid test-case JSON.
    #[error("invalid test JSON in {path}: {source}")]
    Json {
        /// The path that failed.
        path: String,
        /// The underlying error.
        #[source]
        source: serde_json::Error,
    },
}

/// Loads and classifies a test file.
pub fn load_test_file(path: &Path) -> Result<TestFile, TestLoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| TestLoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| TestLoadError::Json {
        path: path.display().to_string(),
        source,
    })
}

/// Runs combinational cases against a module. Each case becomes a
/// [`CaseResult`] named by its position.
pub fn run_comb_tests(
    cache: &ModuleCache,
    module: &ModuleInfo,
    cases: &[CombCase],
) -> Result<Vec<CaseResult>, SimError> {
    let mut results = Vec::with_capacity(cases.len());

    for (index, case) in cases.iter().enumerate() {
        let mut inputs = HashMap::new();
        for port in module.inputs() {
            let text = cache.interner().resolve(port.name);
            let value = case.inputs.get(text).copied().unwrap_or(0);
            inputs.insert(port.name, Bits::new(port.width, value));
        }

        let outputs = comb::evaluate(cache, module, &inputs)?;

        let mut mismatches = Vec::new();
        for (signal, &expected) in &case.expect {
            let actual = module
                .outputs()
                .find(|p| cache.interner().resolve(p.name) == *signal)
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
        results.push(CaseResult {
            name: format!("case {}", index + 1),
            steps: 1,
            mismatches,
        });
    }

    Ok(results)
}

/// Runs a sequential test file against a module. `test_dir` anchors the
/// `memory_files` paths and the lookup of the modules they name.
pub fn run_seq_tests(
    cache: &ModuleCache,
    top: Arc<ModuleInfo>,
    tests: &SequentialTests,
    test_dir: &Path,
) -> Result<Vec<CaseResult>, SimError> {
    let mut preloads = Vec::with_capacity(tests.memory_files.len());
    for binding in &tests.memory_files {
        let holder = cache.resolve(&binding.module, test_dir)?;
        let memory = cache.interner().intern(&binding.memory);
        let Some(info) = holder.memories.get(&memory) else {
            return Err(SimError::Unsupported {
                module: binding.module.clone(),
                message: format!("no memory named '{}' to preload", binding.memory),
                location: holder.path.display().to_string(),
            });
        };
        let words = read_memory_file(&test_dir.join(&binding.file), info.width)?;
        preloads.push(MemoryPreload {
            module: binding.module.clone(),
            memory: binding.memory.clone(),
            words,
        });
    }

    let mut results = Vec::with_capacity(tests.test_cases.len());
    for case in &tests.test_cases {
        let steps: Vec<SequenceStep> = case
            .sequence
            .iter()
            .map(|s| SequenceStep {
                inputs: s.inputs.clone(),
                expected: s.expected.clone(),
            })
            .collect();
        results.push(sequence::run_sequence(
            cache,
            Arc::clone(&top),
            &case.name,
            &steps,
            &preloads,
        )?);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn write(dir: &Path, name: &str, text: &str) {
        std::fs::write(dir.join(name), text).unwrap();
    }

    #[test]
    fn parse_combinational_layout() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "t.json",
            r#"[
                {"inA": 0, "inB": 0, "expect": {"outY": 1}},
                {"inA": 1, "inB": 1, "expect": {"outY": 0}}
            ]"#,
        );
        match load_test_file(&dir.path().join("t.json")).unwrap() {
            TestFile::Combinational(cases) => {
                assert_eq!(cases.len(), 2);
                assert_eq!(cases[0].inputs["inA"], 0);
                assert_eq!(cases[1].expect["outY"], 0);
            }
            other => panic!("expected combinational, got {other:?}"),
        }
    }

    #[test]
    fn parse_sequential_layout() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "t.json",
            r#"{
                "sequential": true,
                "memory_files": [
                    {"module": "ram", "memory": "store", "file": "boot.txt"}
                ],
                "test_cases": [
                    {
                        "name": "count up",
                        "sequence": [
                            {"inputs": {"clk": 1, "reset": 1}, "expected": {"count": 0}},
                            {"inputs": {"clk": 1, "enable": 1}, "expected": {"count": 1}}
                        ]
                    }
                ]
            }"#,
        );
        match load_test_file(&dir.path().join("t.json")).unwrap() {
            TestFile::Sequential(tests) => {
                assert!(tests.sequential);
                assert_eq!(tests.memory_files.len(), 1);
                assert_eq!(tests.test_cases[0].sequence.len(), 2);
                assert_eq!(tests.test_cases[0].name, "count up");
            }
            other => panic!("expected sequential, got {other:?}"),
        }
    }

    #[test]
    fn invalid_json_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "t.json", "{nope");
        assert!(matches!(
            load_test_file(&dir.path().join("t.json")),
            Err(TestLoadError::Json { .. })
        ));
    }

    #[test]
    fn missing_file_is_a_load_error() {
        assert!(matches!(
            load_test_file(Path::new("/nonexistent/t.json")),
            Err(TestLoadError::Io { .. })
        ));
    }

    #[test]
    fn comb_tests_run_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "nand_gate.sv",
            "module nand_gate(input inA, input inB, output outY);
                assign outY = ~(inA & inB);
            endmodule",
        );
        let cache = ModuleCache::new();
        let module = cache.resolve("nand_gate", dir.path()).unwrap();

        let cases = vec![
            // inB omitted: defaults to zero.
            CombCase {
                inputs: HashMap::from([("inA".to_string(), 1)]),
                expect: HashMap::from([("outY".to_string(), 1)]),
            },
            CombCase {
                inputs: HashMap::from([("inA".to_string(), 1), ("inB".to_string(), 1)]),
                expect: HashMap::from([("outY".to_string(), 0)]),
            },
        ];
        let results = run_comb_tests(&cache, &module, &cases).unwrap();
        assert!(results.iter().all(CaseResult::passed));
    }

    #[test]
    fn comb_mismatch_reports_case_index() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "inv.sv",
            "module inv(input a, output y); assign y = ~a; endmodule",
        );
        let cache = ModuleCache::new();
        let module = cache.resolve("inv", dir.path()).unwrap();

        let cases = vec![CombCase {
            inputs: HashMap::from([("a".to_string(), 1)]),
            expect: HashMap::from([("y".to_string(), 1)]),
        }];
        let results = run_comb_tests(&cache, &module, &cases).unwrap();
        assert!(!results[0].passed());
        assert_eq!(results[0].mismatches[0].actual, Some(0));
    }

    #[test]
    fn seq_tests_with_memory_file() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "lut.sv",
            "module lut(input clk, input [1:0] addr, output logic [3:0] data);
                reg [3:0] table_mem [3:0];
                always_ff @(posedge clk) begin
                end
                assign data = table_mem[addr];
            endmodule",
        );
        write(dir.path(), "lut_data.txt", "1010\n1011\n1100\n1101\n");
        let cache = ModuleCache::new();
        let top = cache.resolve("lut", dir.path()).unwrap();

        let tests = SequentialTests {
            sequential: true,
            memory_files: vec![MemoryFileBinding {
                module: "lut".into(),
                memory: "table_mem".into(),
                file: "lut_data.txt".into(),
            }],
            test_cases: vec![SequentialCase {
                name: "read back".into(),
                sequence: vec![
                    SeqStep {
                        inputs: HashMap::from([("clk".to_string(), 1), ("addr".to_string(), 0)]),
                        expected: HashMap::from([("data".to_string(), 0b1010)]),
                    },
                    SeqStep {
                        inputs: HashMap::from([("clk".to_string(), 1), ("addr".to_string(), 3)]),
                        expected: HashMap::from([("data".to_string(), 0b1101)]),
                    },
                ],
            }],
        };
        let results = run_seq_tests(&cache, top, &tests, dir.path()).unwrap();
        assert!(results[0].passed(), "mismatches: {:?}", results[0].mismatches);
    }

    #[test]
    fn unknown_memory_binding_fails() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "plain.sv",
            "module plain(input clk, output logic q);
                always_ff @(posedge clk) begin q <= 1'b1; end
            endmodule",
        );
        write(dir.path(), "x.txt", "1\n");
        let cache = ModuleCache::new();
        let top = cache.resolve("plain", dir.path()).unwrap();

        let tests = SequentialTests {
            sequential: true,
            memory_files: vec![MemoryFileBinding {
                module: "plain".into(),
                memory: "ghost".into(),
                file: "x.txt".into(),
            }],
            test_cases: vec![],
        };
        let err = run_seq_tests(&cache, top, &tests, dir.path()).unwrap_err();
        assert!(err.to_string().contains("no memory named 'ghost'"));
    }

    #[test]
    fn test_file_serde_roundtrip() {
        let tests = SequentialTests {
            sequential: true,
            memory_files: vec![],
            test_cases: vec![SequentialCase {
                name: "n".into(),
                sequence: vec![SeqStep::default()],
            }],
        };
        let json = serde_json::to_string(&TestFile::Sequential(tests)).unwrap();
        match serde_json::from_str::<TestFile>(&json).unwrap() {
            TestFile::Sequential(back) => assert_eq!(back.test_cases.len(), 1),
            other => panic!("expected sequential, got {other:?}"),
        }
    }
}

//! `galena sim`: simulate one module and optionally check its tests.

use crate::{GlobalArgs, SimArgs};
use galena_resolve::ModuleCache;
use galena_sim::testcase::{self, TestFile};
use galena_sim::{table, CaseResult};
use std::error::Error;
use std::path::Path;

/// Runs the `sim` subcommand. Returns the process exit code.
pub fn run(args: &SimArgs, global: &GlobalArgs) -> Result<i32, Box<dyn Error>> {
    let cache = ModuleCache::global();
    if args.clear_cache {
        cache.clear();
        if !global.quiet {
            println!("Module cache cleared.");
        }
    }

    let path = Path::new(&args.file);
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| format!("cannot derive a module name from '{}'", args.file))?;

    let module = cache.resolve_file(path, name)?;

    if !global.quiet {
        let inputs: Vec<&str> = module
            .inputs()
            .map(|p| cache.interner().resolve(p.name))
            .collect();
        let outputs: Vec<&str> = module
            .outputs()
            .map(|p| cache.interner().resolve(p.name))
            .collect();
        println!("Module: {}", module.name_text);
        println!("Inputs: {inputs:?}");
        println!("Outputs: {outputs:?}");
    }

    let gates = cache.gate_cost(&module)?;
    println!("NAND gate count: {gates}");
    for report in cache.take_cost_cycle_reports() {
        eprintln!("warning: {report}");
    }

    if !args.no_table {
        if module.is_sequential {
            if !global.quiet {
                println!("(sequential module; no truth table)");
            }
        } else {
            let limit = args
                .max_combinations
                .unwrap_or(global.config.sim.max_combinations);
            let table = table::enumerate(cache, &module, limit)?;
            println!("{}", table.render());
        }
    }

    let Some(test_path) = &args.test else {
        return Ok(0);
    };
    let test_path = Path::new(test_path);
    let results = run_test_file(cache, &module, test_path)?;
    Ok(report_results(&results, global.quiet))
}

/// Loads a test file and runs it against the module with the matching
/// engine.
pub(crate) fn run_test_file(
    cache: &ModuleCache,
    module: &std::sync::Arc<galena_resolve::ModuleInfo>,
    test_path: &Path,
) -> Result<Vec<CaseResult>, Box<dyn Error>> {
    let test_dir = test_path.parent().unwrap_or_else(|| Path::new("."));
    match testcase::load_test_file(test_path)? {
        TestFile::Combinational(cases) => {
            Ok(testcase::run_comb_tests(cache, module, &cases)?)
        }
        TestFile::Sequential(tests) => Ok(testcase::run_seq_tests(
            cache,
            std::sync::Arc::clone(module),
            &tests,
            test_dir,
        )?),
    }
}

/// Prints per-case outcomes and returns the exit code.
pub(crate) fn report_results(results: &[CaseResult], quiet: bool) -> i32 {
    let mut passed = 0usize;
    for result in results {
        if result.passed() {
            passed += 1;
            if !quiet {
                println!("[PASS] {}", result.name);
            }
        } else {
            println!("[FAIL] {}", result.name);
            for mismatch in &result.mismatches {
                println!("       {mismatch}");
            }
        }
    }
    println!("Test results: {passed}/{} passed", results.len());
    if passed == results.len() {
        0
    } else {
        1
    }
}

//! `galena test`: discover and test every module under a path.
//!
//! Files are independent, so they run on worker threads sharing one
//! module cache; the cache serializes parse-and-insert internally.

use crate::{GlobalArgs, TestArgs};
use galena_resolve::ModuleCache;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// The outcome of testing one `.sv` file.
struct FileReport {
    path: PathBuf,
    gates: u64,
    cases_total: usize,
    cases_passed: usize,
    had_tests: bool,
    error: Option<String>,
}

impl FileReport {
    fn passed(&self) -> bool {
        self.error.is_none() && self.cases_passed == self.cases_total
    }
}

/// Runs the `test` subcommand. Returns the process exit code.
pub fn run(args: &TestArgs, global: &GlobalArgs) -> Result<i32, Box<dyn Error>> {
    let root = Path::new(&args.path);
    let mut files = find_sv_files(root)?;
    if let Some(filter) = &args.filter {
        files.retain(|f| f.to_string_lossy().contains(filter.as_str()));
    }
    if files.is_empty() {
        println!("No SystemVerilog files found under {}", root.display());
        return Ok(0);
    }
    println!("Found {} file(s) to test", files.len());

    let cache = ModuleCache::global();
    let max_rows = args
        .max_combinations
        .unwrap_or(global.config.sim.max_combinations);

    let jobs = args
        .jobs
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
        .clamp(1, files.len());

    let pending = Mutex::new(files.into_iter());
    let reports: Mutex<Vec<FileReport>> = Mutex::new(Vec::new());

    std::thread::scope(|scope| {
        for _ in 0..jobs {
            scope.spawn(|| loop {
                let Some(file) = pending.lock().unwrap().next() else {
                    return;
                };
                let report = test_one_file(cache, &file, max_rows);
                reports.lock().unwrap().push(report);
            });
        }
    });

    let mut reports = reports.into_inner().unwrap();
    reports.sort_by(|a, b| a.path.cmp(&b.path));

    let mut failed = 0usize;
    let mut total_cases = 0usize;
    let mut passed_cases = 0usize;
    let mut total_gates = 0u64;
    for report in &reports {
        total_cases += report.cases_total;
        passed_cases += report.cases_passed;
        total_gates += report.gates;
        let status = if report.passed() { "[PASS]" } else { "[FAIL]" };
        if !report.passed() {
            failed += 1;
        }
        if !global.quiet || !report.passed() {
            let tests = if report.had_tests {
                format!(" ({}/{} cases)", report.cases_passed, report.cases_total)
            } else {
                String::new()
            };
            println!("{status} {}{tests}", report.path.display());
            if let Some(error) = &report.error {
                println!("       {error}");
            }
        }
    }

    println!("{}", "=".repeat(50));
    println!("Files tested:     {}", reports.len());
    println!("Files failed:     {failed}");
    println!("Cases passed:     {passed_cases}/{total_cases}");
    println!("Total NAND gates: {total_gates}");
    for report in cache.take_cost_cycle_reports() {
        eprintln!("warning: {report}");
    }

    Ok(if failed == 0 { 0 } else { 1 })
}

/// Collects `.sv` files: the path itself, or a recursive directory walk,
/// sorted for stable output.
fn find_sv_files(root: &Path) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    if !root.is_dir() {
        return Err(format!("'{}' is not a file or directory", root.display()).into());
    }
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().is_some_and(|e| e == "sv") {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Tests one file: resolve, count gates, run its sibling `.json` if any,
/// and otherwise exercise combinational modules through a bounded
/// enumeration.
fn test_one_file(cache: &ModuleCache, file: &Path, max_rows: usize) -> FileReport {
    let mut report = FileReport {
        path: file.to_path_buf(),
        gates: 0,
        cases_total: 0,
        cases_passed: 0,
        had_tests: false,
        error: None,
    };

    let name = match file.file_stem().and_then(|s| s.to_str()) {
        Some(name) => name,
        None => {
            report.error = Some("cannot derive a module name".into());
            return report;
        }
    };
    let module = match cache.resolve_file(file, name) {
        Ok(module) => module,
        Err(e) => {
            report.error = Some(e.to_string());
            return report;
        }
    };
    match cache.gate_cost(&module) {
        Ok(gates) => report.gates = gates,
        Err(e) => {
            report.error = Some(e.to_string());
            return report;
        }
    }

    let json = file.with_extension("json");
    if json.is_file() {
        report.had_tests = true;
        match crate::sim::run_test_file(cache, &module, &json) {
            Ok(results) => {
                report.cases_total = results.len();
                report.cases_passed = results.iter().filter(|r| r.passed()).count();
            }
            Err(e) => report.error = Some(e.to_string()),
        }
        return report;
    }

    // No test file: for combinational modules, a bounded enumeration
    // still proves the module evaluates.
    if !module.is_sequential {
        if let Err(e) = galena_sim::table::enumerate(cache, &module, max_rows) {
            report.error = Some(e.to_string());
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_files_recursively_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("b.sv"), "module b; endmodule").unwrap();
        std::fs::write(dir.path().join("sub/a.sv"), "module a; endmodule").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not verilog").unwrap();

        let files = find_sv_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("b.sv"));
        assert!(files[1].ends_with("sub/a.sv"));
    }

    #[test]
    fn single_file_path_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("m.sv");
        std::fs::write(&file, "module m; endmodule").unwrap();
        let files = find_sv_files(&file).unwrap();
        assert_eq!(files, vec![file]);
    }

    #[test]
    fn missing_path_errors() {
        assert!(find_sv_files(Path::new("/nonexistent/designs")).is_err());
    }

    #[test]
    fn test_one_file_reports_parse_failure() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("bad.sv");
        std::fs::write(&file, "module bad(input a output y); endmodule").unwrap();

        let cache = ModuleCache::new();
        let report = test_one_file(&cache, &file, 16);
        assert!(!report.passed());
        assert!(report.error.is_some());
    }

    #[test]
    fn test_one_file_runs_sibling_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("inv.sv"),
            "module inv(input a, output y); assign y = ~a; endmodule",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("inv.json"),
            r#"[{"a": 0, "expect": {"y": 1}}, {"a": 1, "expect": {"y": 0}}]"#,
        )
        .unwrap();

        let cache = ModuleCache::new();
        let report = test_one_file(&cache, &dir.path().join("inv.sv"), 16);
        assert!(report.passed(), "error: {:?}", report.error);
        assert!(report.had_tests);
        assert_eq!(report.cases_passed, 2);
    }

    #[test]
    fn test_one_file_without_json_enumerates() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("inv.sv"),
            "module inv(input a, output y); assign y = ~a; endmodule",
        )
        .unwrap();

        let cache = ModuleCache::new();
        let report = test_one_file(&cache, &dir.path().join("inv.sv"), 16);
        assert!(report.passed());
        assert!(!report.had_tests);
    }
}

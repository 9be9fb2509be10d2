//! The process-wide module cache.
//!
//! Modules are memoized by the absolute path of their defining file plus
//! the module name, so two designs in different directories can both have
//! a `top` without colliding. Parse-and-insert happens under a lock; the
//! test driver's workers share one cache and only ever race on the map.

use crate::error::ResolveError;
use crate::module::{ModuleInfo, Port};
use crate::rom;
use crate::widths;
use galena_common::{Ident, Interner};
use galena_source::{FileId, SourceFile};
use galena_sv_parser::ast::ModuleItem;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::ThreadId;

type ModuleKey = (PathBuf, String);

/// Resolves and memoizes modules, their widths, their ROM contents, and
/// their primitive-gate counts.
pub struct ModuleCache {
    interner: Arc<Interner>,
    modules: Mutex<HashMap<ModuleKey, Arc<ModuleInfo>>>,
    costs: Mutex<HashMap<ModuleKey, u64>>,
    /// Files currently being loaded, keyed per thread: same-thread
    /// re-entry means an instance-graph cycle and is cut off; a different
    /// thread loading the same file is an ordinary race and both copies
    /// merge through the map insert.
    loading: Mutex<HashSet<(ThreadId, PathBuf)>>,
    cost_cycles: Mutex<Vec<String>>,
}

impl ModuleCache {
    /// Creates an empty cache with its own interner.
    pub fn new() -> Self {
        Self {
            interner: Arc::new(Interner::new()),
            modules: Mutex::new(HashMap::new()),
            costs: Mutex::new(HashMap::new()),
            loading: Mutex::new(HashSet::new()),
            cost_cycles: Mutex::new(Vec::new()),
        }
    }

    /// The process-wide cache shared by the CLI entry points.
    pub fn global() -> &'static ModuleCache {
        static GLOBAL: OnceLock<ModuleCache> = OnceLock::new();
        GLOBAL.get_or_init(ModuleCache::new)
    }

    /// The interner all cached ASTs were built with.
    pub fn interner(&self) -> &Interner {
        &self.interner
    }

    /// Drops every cached module and cost so edited files take effect.
    pub fn clear(&self) {
        self.modules.lock().unwrap().clear();
        self.costs.lock().unwrap().clear();
        self.cost_cycles.lock().unwrap().clear();
    }

    /// Resolves `name` relative to its referrer's directory.
    ///
    /// Looks for `<name>.sv` in `referrer_dir`, parses it on first use
    /// (caching every module the file defines), and returns the requested
    /// module.
    pub fn resolve(&self, name: &str, referrer_dir: &Path) -> Result<Arc<ModuleInfo>, ResolveError> {
        let file_path = referrer_dir.join(format!("{name}.sv"));
        if !file_path.is_file() {
            return Err(ResolveError::ModuleNotFound {
                name: name.to_string(),
                dir: referrer_dir.to_path_buf(),
            });
        }
        let canon = file_path
            .canonicalize()
            .map_err(|source| ResolveError::Io {
                path: file_path.clone(),
                source,
            })?;
        self.resolve_in_file(name, &canon)
    }

    /// Resolves a module from an explicit file path (the CLI's entry
    /// point for the top module).
    pub fn resolve_file(&self, path: &Path, name: &str) -> Result<Arc<ModuleInfo>, ResolveError> {
        let canon = path.canonicalize().map_err(|source| ResolveError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.resolve_in_file(name, &canon)
    }

    fn resolve_in_file(&self, name: &str, canon: &Path) -> Result<Arc<ModuleInfo>, ResolveError> {
        let key = (canon.to_path_buf(), name.to_string());
        if let Some(info) = self.modules.lock().unwrap().get(&key) {
            return Ok(Arc::clone(info));
        }

        let guard_key = (std::thread::current().id(), canon.to_path_buf());
        {
            let mut loading = self.loading.lock().unwrap();
            if !loading.insert(guard_key.clone()) {
                return Err(ResolveError::Invalid {
                    module: name.to_string(),
                    message: format!(
                        "recursive reference while loading {}",
                        canon.display()
                    ),
                });
            }
        }
        let result = self.load_file(canon);
        self.loading.lock().unwrap().remove(&guard_key);
        result?;

        self.modules
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| ResolveError::Invalid {
                module: name.to_string(),
                message: format!("{} does not define module '{name}'", canon.display()),
            })
    }

    /// Parses one file and caches every module it defines.
    fn load_file(&self, canon: &Path) -> Result<(), ResolveError> {
        let text = std::fs::read_to_string(canon).map_err(|source| ResolveError::Io {
            path: canon.to_path_buf(),
            source,
        })?;
        let source = Arc::new(SourceFile::new(
            FileId::from_raw(0),
            canon.to_path_buf(),
            text,
        ));

        let sink = galena_diagnostics::DiagnosticSink::new();
        let ast = galena_sv_parser::parse_file(
            &source.content,
            FileId::from_raw(0),
            &self.interner,
            &sink,
        );
        if let Some(first) = sink.first_error() {
            let (line, col) = if first.span.is_none() {
                (0, 0)
            } else {
                source.line_col(first.span.start)
            };
            return Err(ResolveError::Parse {
                path: canon.to_path_buf(),
                line,
                col,
                message: first.message,
            });
        }

        // Build base info for every module in the file.
        let mut infos = Vec::new();
        for module in ast.modules {
            let info = widths::build_module_info(
                module,
                &self.interner,
                canon.to_path_buf(),
                Arc::clone(&source),
            )?;
            infos.push(info);
        }

        // ROM primitives load their data file now, so a missing file
        // surfaces at resolve time.
        for info in &mut infos {
            let inputs = info.inputs().count();
            let outputs = info.outputs().count();
            if rom::is_rom_shape(&info.name_text, &info.ast, inputs, outputs) {
                let (addr_width, data_width) =
                    rom::rom_port_widths(&info.ports).expect("shape check counted the ports");
                let dir = canon.parent().unwrap_or_else(|| Path::new("."));
                info.rom = Some(rom::load_rom_data(
                    &info.name_text,
                    dir,
                    addr_width,
                    data_width,
                )?);
            }
        }

        // Instance-port width inference. Children in the same file are
        // looked up locally; others resolve through the cache, which may
        // recurse into further files. Missing children are skipped here
        // and reported when evaluation actually needs them.
        let local_ports: HashMap<Ident, Vec<Port>> = infos
            .iter()
            .map(|info| (info.name, info.ports.clone()))
            .collect();
        let dir = canon.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
        for info in &mut infos {
            let mut child_ports = local_ports.clone();
            for item in &info.ast.items {
                let ModuleItem::Instance(inst) = item else {
                    continue;
                };
                if child_ports.contains_key(&inst.module_name) {
                    continue;
                }
                let child_name = self.interner.resolve(inst.module_name).to_string();
                if let Ok(child) = self.resolve(&child_name, &dir) {
                    child_ports.insert(inst.module_name, child.ports.clone());
                }
            }
            widths::infer_instance_widths(info, &child_ports);
        }

        // Duplicate module names within one file are an authoring error;
        // a key already present in the map just means another worker
        // finished loading this file first.
        let mut names_in_file = HashSet::new();
        for info in &infos {
            if !names_in_file.insert(info.name) {
                return Err(ResolveError::Invalid {
                    module: info.name_text.clone(),
                    message: format!("defined more than once in {}", canon.display()),
                });
            }
        }

        let mut modules = self.modules.lock().unwrap();
        for info in infos {
            let key = (canon.to_path_buf(), info.name_text.clone());
            modules.entry(key).or_insert_with(|| Arc::new(info));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Primitive-gate counting
    // ------------------------------------------------------------------

    /// The memoized primitive-gate ("NAND") count of a module.
    ///
    /// `nand_gate` counts as exactly 1; any other module is the sum over
    /// its child instances; childless modules count 0. A cycle in the
    /// instance graph contributes 0 and is recorded for out-of-band
    /// reporting via [`ModuleCache::take_cost_cycle_reports`].
    pub fn gate_cost(&self, info: &ModuleInfo) -> Result<u64, ResolveError> {
        let mut visiting = Vec::new();
        self.cost_of(info, &mut visiting)
    }

    fn cost_of(
        &self,
        info: &ModuleInfo,
        visiting: &mut Vec<ModuleKey>,
    ) -> Result<u64, ResolveError> {
        let key = (info.path.clone(), info.name_text.clone());
        if let Some(&cost) = self.costs.lock().unwrap().get(&key) {
            return Ok(cost);
        }
        if info.name_text == "nand_gate" {
            self.costs.lock().unwrap().insert(key, 1);
            return Ok(1);
        }
        if visiting.contains(&key) {
            self.cost_cycles.lock().unwrap().push(format!(
                "instance cycle through module '{}' counted as 0 gates",
                info.name_text
            ));
            return Ok(0);
        }

        visiting.push(key.clone());
        let mut total = 0u64;
        let mut hit_cycle = false;
        for item in &info.ast.items {
            let ModuleItem::Instance(inst) = item else {
                continue;
            };
            let child_name = self.interner.resolve(inst.module_name).to_string();
            let child = self.resolve(&child_name, info.dir())?;
            let before = self.cost_cycles.lock().unwrap().len();
            total += self.cost_of(&child, visiting)?;
            if self.cost_cycles.lock().unwrap().len() > before {
                hit_cycle = true;
            }
        }
        visiting.pop();

        // A count computed through a cycle is not a real total; leave it
        // unmemoized so the report stays visible on recount.
        if !hit_cycle {
            self.costs.lock().unwrap().insert(key, total);
        }
        Ok(total)
    }

    /// Drains the instance-cycle reports accumulated by gate counting.
    pub fn take_cost_cycle_reports(&self) -> Vec<String> {
        std::mem::take(&mut *self.cost_cycles.lock().unwrap())
    }
}

impl Default for ModuleCache {
    fn default() -> Self {
        Self::new()
    }
}

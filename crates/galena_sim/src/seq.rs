//! The sequential evaluator: cycle-based stepping with per-instance state.
//!
//! A [`SeqSim`] owns the persistent state of every instance under the top
//! module, keyed by hierarchical instance path. One [`SeqSim::step`] is
//! one cycle, built from two environments:
//!
//! - the **sample environment**: inputs, this instance's registers, the
//!   pre-edge outputs of sequential children, and all combinational logic
//!   settled over them. Every clocked element (the module's own
//!   `always_ff` blocks and its sequential children) reads from this
//!   environment, which is what makes the clock edge simultaneous across
//!   the hierarchy.
//! - the **post environment**: rebuilt after the commit from the new
//!   register values and the children's post-edge outputs, re-settled,
//!   and used to read the module's outputs.
//!
//! `always_ff` execution follows the two-phase discipline: blocking
//! assignments land in a per-block shadow (visible only to later
//! statements of that block), non-blocking right-hand sides are all
//! evaluated against the sample state, and everything commits atomically.

use crate::comb;
use crate::env::SignalEnv;
use crate::error::SimError;
use crate::eval::{eval_expr, resolve_lvalue, store_env, EvalCtx, LvalueSlot};
use galena_common::{Bits, Ident};
use galena_resolve::{ModuleCache, ModuleInfo};
use galena_sv_parser::ast::{AlwaysFfBlock, Expr, ModuleItem, Statement};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

/// Persistent state of one module instance.
#[derive(Clone, Default)]
struct InstanceState {
    /// Current register values (targets of `always_ff` assignments).
    regs: HashMap<Ident, Bits>,
    /// Memory arrays, one dense vector per declared memory.
    mems: HashMap<Ident, Vec<Bits>>,
    /// Previous cycle's clock samples, per `always_ff` clock signal.
    prev_clocks: HashMap<Ident, bool>,
}

/// A pending memory preload from a test's `memory_files` binding.
struct Preload {
    module: String,
    memory: String,
    words: HashMap<u64, u64>,
}

/// Cycle-based simulator for one top module and everything beneath it.
pub struct SeqSim<'c> {
    cache: &'c ModuleCache,
    top: Arc<ModuleInfo>,
    states: HashMap<String, InstanceState>,
    preloads: Vec<Preload>,
    dropped_writes: u64,
    seq_deep: HashMap<(PathBuf, String), bool>,
    clock_sigs: HashMap<(PathBuf, String), Vec<Ident>>,
    /// The previous cycle's top-level input samples, for [`SeqSim::tick`].
    last_inputs: HashMap<Ident, Bits>,
}

impl<'c> SeqSim<'c> {
    /// Creates a simulator with empty state for `top`.
    pub fn new(cache: &'c ModuleCache, top: Arc<ModuleInfo>) -> Self {
        Self {
            cache,
            top,
            states: HashMap::new(),
            preloads: Vec::new(),
            dropped_writes: 0,
            seq_deep: HashMap::new(),
            clock_sigs: HashMap::new(),
            last_inputs: HashMap::new(),
        }
    }

    /// The top module being simulated.
    pub fn top(&self) -> &Arc<ModuleInfo> {
        &self.top
    }

    /// Registers a memory preload: every instance of `module` gets its
    /// `memory` array initialized from `words` when its state is created.
    /// Must be called before the first cycle.
    pub fn preload_memory(&mut self, module: &str, memory: &str, words: HashMap<u64, u64>) {
        self.preloads.push(Preload {
            module: module.to_string(),
            memory: memory.to_string(),
            words,
        });
    }

    /// Memory writes dropped because their address was out of range.
    pub fn dropped_writes(&self) -> u64 {
        self.dropped_writes
    }

    /// Discards all instance state, keeping preloads.
    pub fn reset(&mut self) {
        self.states.clear();
        self.last_inputs.clear();
        self.dropped_writes = 0;
    }

    /// Advances one cycle with the given top-level inputs.
    pub fn step(
        &mut self,
        inputs: &HashMap<Ident, Bits>,
    ) -> Result<HashMap<Ident, Bits>, SimError> {
        let top = Arc::clone(&self.top);
        let path = top.name_text.clone();
        let outputs = self.step_module(&path, &top, inputs, 0)?;
        self.last_inputs = inputs.clone();
        Ok(outputs)
    }

    /// Advances one test step, inserting an implicit low phase when a
    /// clock input is driven to 1 while its previous sample was already
    /// 1; each step with `clk = 1` then yields exactly one rising edge.
    pub fn tick(
        &mut self,
        inputs: &HashMap<Ident, Bits>,
    ) -> Result<HashMap<Ident, Bits>, SimError> {
        let clocks = self.clock_inputs();
        let needs_low = clocks.iter().any(|&clock| {
            inputs.get(&clock).is_some_and(Bits::is_true)
                && self.last_inputs.get(&clock).is_some_and(Bits::is_true)
        });
        if needs_low {
            let mut low = inputs.clone();
            for &clock in &clocks {
                if let Some(v) = low.get_mut(&clock) {
                    *v = Bits::zero(v.width());
                }
            }
            self.step(&low)?;
        }
        self.step(inputs)
    }

    /// The top-level input ports that drive a clock, directly in the top
    /// module's `always_ff` blocks or through instance connections
    /// anywhere below it.
    pub fn clock_inputs(&mut self) -> Vec<Ident> {
        let top = Arc::clone(&self.top);
        let signals = self.clock_signals(&top);
        top.inputs()
            .map(|p| p.name)
            .filter(|name| signals.contains(name))
            .collect()
    }

    /// The signals of `module` that act as clocks: named by its own
    /// `always_ff` blocks, or connected to a clock input of a child.
    fn clock_signals(&mut self, module: &Arc<ModuleInfo>) -> Vec<Ident> {
        let key = (module.path.clone(), module.name_text.clone());
        if let Some(cached) = self.clock_sigs.get(&key) {
            return cached.clone();
        }
        // Provisional empty entry cuts instance cycles.
        self.clock_sigs.insert(key.clone(), Vec::new());

        let mut signals = ff_clocks(module);
        for item in &module.ast.items {
            let ModuleItem::Instance(inst) = item else {
                continue;
            };
            let Ok(bound) = comb::bind_instance(self.cache, module, inst) else {
                continue;
            };
            let child_clocks = self.clock_signals(&bound.child);
            for (port, _, expr) in &bound.input_exprs {
                if !child_clocks.contains(port) {
                    continue;
                }
                if let Expr::Identifier { name, .. } = expr {
                    if !signals.contains(name) {
                        signals.push(*name);
                    }
                }
            }
        }
        self.clock_sigs.insert(key, signals.clone());
        signals
    }

    // ------------------------------------------------------------------
    // Core cycle
    // ------------------------------------------------------------------

    fn step_module(
        &mut self,
        path: &str,
        module: &Arc<ModuleInfo>,
        inputs: &HashMap<Ident, Bits>,
        depth: usize,
    ) -> Result<HashMap<Ident, Bits>, SimError> {
        // Modules with no clocked logic anywhere below are plain
        // combinational functions and hold no state.
        if !self.is_seq_deep(module)? {
            return comb::eval_module(self.cache, module, inputs, depth);
        }
        if depth > comb::MAX_DEPTH {
            return Err(SimError::CombinationalCycle {
                module: module.name_text.clone(),
                outputs: Vec::new(),
            });
        }

        self.ensure_state(path, module);

        // --- Sample environment: the pre-edge view -------------------
        let mut sample = SignalEnv::new();
        for port in module.inputs() {
            let value = self.checked_input(module, inputs, port.name)?;
            sample.bind(port.name, value);
        }
        for (name, value) in self.states[path].regs.clone() {
            sample.bind(name, value);
        }
        self.peek_children(path, module, &mut sample)?;
        self.settle(path, module, &mut sample)?;

        // --- Step sequential children from the sampled inputs --------
        let mut child_outputs: Vec<(usize, HashMap<Ident, Bits>)> = Vec::new();
        let mut inst_idx = 0usize;
        for item in &module.ast.items {
            let ModuleItem::Instance(inst) = item else {
                continue;
            };
            let idx = inst_idx;
            inst_idx += 1;
            let bound = comb::bind_instance(self.cache, module, inst)?;
            if !self.is_seq_deep(&bound.child)? {
                continue;
            }

            let mut child_inputs = HashMap::new();
            {
                let mems = &self.states[path].mems;
                let ctx = EvalCtx {
                    env: &sample,
                    module,
                    interner: self.cache.interner(),
                    mems: Some(mems),
                };
                for (port, width, expr) in &bound.input_exprs {
                    if !comb::expr_ready(expr, &sample, module) {
                        return Err(SimError::CombinationalCycle {
                            module: module.name_text.clone(),
                            outputs: vec![self.cache.interner().resolve(*port).to_string()],
                        });
                    }
                    child_inputs.insert(*port, eval_expr(&ctx, expr)?.resize(*width));
                }
            }

            let label = self.cache.interner().resolve(inst.instance_name);
            let child_path = format!("{path}.{label}");
            let outputs = self.step_module(&child_path, &bound.child, &child_inputs, depth + 1)?;
            child_outputs.push((idx, outputs));
        }

        // --- Edge detection and block execution ----------------------
        let mems = self.states[path].mems.clone();
        let mut blocking: Vec<(LvalueSlot, Bits)> = Vec::new();
        let mut staged: Vec<(LvalueSlot, Bits)> = Vec::new();
        let mut clock_samples: Vec<(Ident, bool)> = Vec::new();

        for ff in ff_blocks(module) {
            let current = sample.get(ff.clock).map(|v| v.is_true()).unwrap_or(false);
            let previous = self.states[path]
                .prev_clocks
                .get(&ff.clock)
                .copied()
                .unwrap_or(false);
            clock_samples.push((ff.clock, current));
            if !(current && !previous) {
                continue;
            }
            let mut shadow = sample.clone();
            self.exec_ff(
                &ff.body,
                &mut shadow,
                module,
                &mems,
                &mut blocking,
                &mut staged,
            )?;
        }

        // --- Commit: blocking results, then the non-blocking set -----
        let mut post = SignalEnv::new();
        for port in module.inputs() {
            post.bind(port.name, *inputs.get(&port.name).expect("validated above"));
        }
        for (name, value) in self.states[path].regs.clone() {
            post.bind(name, value);
        }
        {
            let state = self.states.get_mut(path).expect("state was ensured");
            for (slot, value) in blocking.into_iter().chain(staged) {
                match slot {
                    LvalueSlot::Mem { name, addr } => {
                        let Some(words) = state.mems.get_mut(&name) else {
                            continue;
                        };
                        if let Some(word) = words.get_mut(addr as usize) {
                            let w = word.width();
                            *word = value.resize(w);
                        } else {
                            // Out-of-range writes are dropped, but counted.
                            self.dropped_writes += 1;
                        }
                    }
                    slot => {
                        store_env(
                            &mut post,
                            module,
                            self.cache.interner(),
                            &slot,
                            value,
                            module.ast.span,
                        )?;
                    }
                }
            }
            for (clock, current) in clock_samples {
                state.prev_clocks.insert(clock, current);
            }
            for name in state.regs.keys().copied().collect::<Vec<_>>() {
                if let Some(v) = post.get(name) {
                    state.regs.insert(name, v);
                }
            }
        }

        // --- Post environment: outputs after the edge ----------------
        let mut inst_idx = 0usize;
        for item in &module.ast.items {
            let ModuleItem::Instance(inst) = item else {
                continue;
            };
            let idx = inst_idx;
            inst_idx += 1;
            let Some((_, outputs)) = child_outputs.iter().find(|(i, _)| *i == idx) else {
                continue;
            };
            let bound = comb::bind_instance(self.cache, module, inst)?;
            self.bind_child_outputs(module, &bound, outputs, &mut post, inst.span)?;
        }
        self.settle(path, module, &mut post)?;

        let mut outputs = HashMap::new();
        let mut missing = Vec::new();
        for port in module.outputs() {
            match post.get(port.name) {
                Some(v) => {
                    outputs.insert(port.name, v.resize(port.width));
                }
                None => missing.push(self.cache.interner().resolve(port.name).to_string()),
            }
        }
        if !missing.is_empty() {
            return Err(SimError::CombinationalCycle {
                module: module.name_text.clone(),
                outputs: missing,
            });
        }
        Ok(outputs)
    }

    fn checked_input(
        &self,
        module: &ModuleInfo,
        inputs: &HashMap<Ident, Bits>,
        name: Ident,
    ) -> Result<Bits, SimError> {
        let port = module.port(name).expect("caller iterates the port list");
        let mismatch = |given| SimError::PortWidthMismatch {
            module: module.name_text.clone(),
            port: self.cache.interner().resolve(name).to_string(),
            given,
            expected: port.width,
            location: module.locate(module.ast.span),
        };
        match inputs.get(&name) {
            Some(v) if v.width() == port.width => Ok(*v),
            Some(v) => Err(mismatch(v.width())),
            None => Err(mismatch(0)),
        }
    }

    /// Ready-gated fixpoint over assigns, `always_comb` blocks, and
    /// purely combinational children. Sequential children are never
    /// stepped here; their outputs come from peeking (sample phase) or
    /// from the recorded step results (post phase).
    fn settle(
        &mut self,
        path: &str,
        module: &Arc<ModuleInfo>,
        env: &mut SignalEnv,
    ) -> Result<(), SimError> {
        let mems = self.states[path].mems.clone();
        let instance_count = module
            .ast
            .items
            .iter()
            .filter(|i| matches!(i, ModuleItem::Instance(_)))
            .count();
        let mut child_inputs_seen: Vec<Option<Vec<Bits>>> = vec![None; instance_count];

        for _pass in 0..comb::MAX_PASSES {
            let mut changed = false;
            let mut inst_idx = 0usize;

            for item in &module.ast.items {
                match item {
                    ModuleItem::Assign(assign) => {
                        if !comb::expr_ready(&assign.value, env, module)
                            || !comb::lvalue_indices_ready(&assign.target, env, module)
                        {
                            continue;
                        }
                        let (value, slot) = {
                            let ctx = EvalCtx {
                                env,
                                module,
                                interner: self.cache.interner(),
                                mems: Some(&mems),
                            };
                            (
                                eval_expr(&ctx, &assign.value)?,
                                resolve_lvalue(&ctx, &assign.target)?,
                            )
                        };
                        changed |= store_env(
                            env,
                            module,
                            self.cache.interner(),
                            &slot,
                            value,
                            assign.span,
                        )?;
                    }
                    ModuleItem::AlwaysComb(block) => {
                        if comb::comb_ready(&block.body, env, module) {
                            changed |= comb::exec_blocking(
                                &block.body,
                                env,
                                module,
                                self.cache,
                                Some(&mems),
                            )?;
                        }
                    }
                    ModuleItem::Instance(inst) => {
                        let idx = inst_idx;
                        inst_idx += 1;
                        let bound = comb::bind_instance(self.cache, module, inst)?;
                        if self.is_seq_deep(&bound.child)? {
                            continue;
                        }
                        let ready = bound
                            .input_exprs
                            .iter()
                            .all(|(_, _, e)| comb::expr_ready(e, env, module));
                        if !ready {
                            continue;
                        }

                        let mut child_inputs = HashMap::new();
                        let mut snapshot = Vec::with_capacity(bound.input_exprs.len());
                        {
                            let ctx = EvalCtx {
                                env,
                                module,
                                interner: self.cache.interner(),
                                mems: Some(&mems),
                            };
                            for (port, width, expr) in &bound.input_exprs {
                                let v = eval_expr(&ctx, expr)?.resize(*width);
                                snapshot.push(v);
                                child_inputs.insert(*port, v);
                            }
                        }
                        if child_inputs_seen[idx].as_ref() == Some(&snapshot) {
                            continue;
                        }

                        let outputs =
                            comb::eval_module(self.cache, &bound.child, &child_inputs, 1)?;
                        child_inputs_seen[idx] = Some(snapshot);
                        self.bind_child_outputs(module, &bound, &outputs, env, inst.span)?;
                        changed = true;
                    }
                    _ => {}
                }
            }

            if !changed {
                return Ok(());
            }
        }

        Err(SimError::CombinationalCycle {
            module: module.name_text.clone(),
            outputs: module
                .outputs()
                .filter(|p| env.get(p.name).is_none())
                .map(|p| self.cache.interner().resolve(p.name).to_string())
                .collect(),
        })
    }

    fn bind_child_outputs(
        &self,
        module: &Arc<ModuleInfo>,
        bound: &comb::BoundInstance<'_>,
        outputs: &HashMap<Ident, Bits>,
        env: &mut SignalEnv,
        span: galena_source::Span,
    ) -> Result<(), SimError> {
        for (port, actual) in &bound.output_conns {
            let Some(value) = outputs.get(port) else {
                continue;
            };
            if !comb::lvalue_indices_ready(actual, env, module) {
                continue;
            }
            let slot = {
                let ctx = EvalCtx {
                    env,
                    module,
                    interner: self.cache.interner(),
                    mems: None,
                };
                resolve_lvalue(&ctx, actual)?
            };
            store_env(env, module, self.cache.interner(), &slot, *value, span)?;
        }
        Ok(())
    }

    /// Binds the pre-edge, state-derived outputs of sequential children
    /// into the parent environment without advancing them.
    fn peek_children(
        &mut self,
        path: &str,
        module: &Arc<ModuleInfo>,
        env: &mut SignalEnv,
    ) -> Result<(), SimError> {
        for item in &module.ast.items {
            let ModuleItem::Instance(inst) = item else {
                continue;
            };
            let bound = comb::bind_instance(self.cache, module, inst)?;
            if !self.is_seq_deep(&bound.child)? {
                continue;
            }
            let label = self.cache.interner().resolve(inst.instance_name);
            let child_path = format!("{path}.{label}");
            let peeked = self.peek_module(&child_path, &bound.child)?;
            self.bind_child_outputs(module, &bound, &peeked, env, inst.span)?;
        }
        Ok(())
    }

    /// Evaluates whatever of a sequential module's outputs can be derived
    /// from its stored registers alone, with no inputs and no state changes.
    fn peek_module(
        &mut self,
        path: &str,
        module: &Arc<ModuleInfo>,
    ) -> Result<HashMap<Ident, Bits>, SimError> {
        self.ensure_state(path, module);
        let mut env = SignalEnv::new();
        for (name, value) in self.states[path].regs.clone() {
            env.bind(name, value);
        }
        self.peek_children(path, module, &mut env)?;
        self.settle(path, module, &mut env)?;

        let mut outputs = HashMap::new();
        for port in module.outputs() {
            if let Some(v) = env.get(port.name) {
                outputs.insert(port.name, v.resize(port.width));
            }
        }
        Ok(outputs)
    }

    /// Executes one `always_ff` body against the block's shadow
    /// environment, recording blocking results and staging non-blocking
    /// assignments.
    fn exec_ff(
        &mut self,
        stmt: &Statement,
        shadow: &mut SignalEnv,
        module: &Arc<ModuleInfo>,
        mems: &HashMap<Ident, Vec<Bits>>,
        blocking: &mut Vec<(LvalueSlot, Bits)>,
        staged: &mut Vec<(LvalueSlot, Bits)>,
    ) -> Result<(), SimError> {
        match stmt {
            Statement::Blocking {
                target,
                value,
                span,
            } => {
                let (v, slot) = {
                    let ctx = EvalCtx {
                        env: shadow,
                        module,
                        interner: self.cache.interner(),
                        mems: Some(mems),
                    };
                    (eval_expr(&ctx, value)?, resolve_lvalue(&ctx, target)?)
                };
                store_env(shadow, module, self.cache.interner(), &slot, v, *span)?;
                blocking.push((slot, v));
                Ok(())
            }
            Statement::NonBlocking { target, value, .. } => {
                let (v, slot) = {
                    let ctx = EvalCtx {
                        env: shadow,
                        module,
                        interner: self.cache.interner(),
                        mems: Some(mems),
                    };
                    (eval_expr(&ctx, value)?, resolve_lvalue(&ctx, target)?)
                };
                staged.push((slot, v));
                Ok(())
            }
            Statement::Block { stmts, .. } => {
                for s in stmts {
                    self.exec_ff(s, shadow, module, mems, blocking, staged)?;
                }
                Ok(())
            }
            Statement::If {
                condition,
                then_stmt,
                else_stmt,
                ..
            } => {
                let taken = {
                    let ctx = EvalCtx {
                        env: shadow,
                        module,
                        interner: self.cache.interner(),
                        mems: Some(mems),
                    };
                    eval_expr(&ctx, condition)?.is_true()
                };
                if taken {
                    self.exec_ff(then_stmt, shadow, module, mems, blocking, staged)
                } else if let Some(else_stmt) = else_stmt {
                    self.exec_ff(else_stmt, shadow, module, mems, blocking, staged)
                } else {
                    Ok(())
                }
            }
            Statement::Case { subject, arms, .. } => {
                let selector = {
                    let ctx = EvalCtx {
                        env: shadow,
                        module,
                        interner: self.cache.interner(),
                        mems: Some(mems),
                    };
                    eval_expr(&ctx, subject)?
                };
                for arm in arms.iter().filter(|a| !a.is_default) {
                    for pattern in &arm.patterns {
                        let hit = {
                            let ctx = EvalCtx {
                                env: shadow,
                                module,
                                interner: self.cache.interner(),
                                mems: Some(mems),
                            };
                            let p = eval_expr(&ctx, pattern)?;
                            selector
                                .compare(&p, galena_common::CompareOp::Eq)
                                .is_true()
                        };
                        if hit {
                            return self.exec_ff(&arm.body, shadow, module, mems, blocking, staged);
                        }
                    }
                }
                if let Some(default) = arms.iter().find(|a| a.is_default) {
                    return self.exec_ff(&default.body, shadow, module, mems, blocking, staged);
                }
                Ok(())
            }
            Statement::Error(_) => unreachable!("error nodes do not survive resolution"),
        }
    }

    // ------------------------------------------------------------------
    // State management
    // ------------------------------------------------------------------

    fn ensure_state(&mut self, path: &str, module: &ModuleInfo) {
        if self.states.contains_key(path) {
            return;
        }
        let mut state = InstanceState::default();

        for target in ff_targets(module) {
            let width = module.width_of(target).unwrap_or(1);
            state.regs.insert(target, Bits::zero(width));
        }
        for (&name, mem) in &module.memories {
            let mut words = vec![Bits::zero(mem.width); mem.depth as usize];
            for preload in &self.preloads {
                if preload.module != module.name_text
                    || preload.memory != self.cache.interner().resolve(name)
                {
                    continue;
                }
                for (&addr, &value) in &preload.words {
                    if let Some(word) = words.get_mut(addr as usize) {
                        *word = Bits::new(mem.width, value);
                    } else {
                        self.dropped_writes += 1;
                    }
                }
            }
            state.mems.insert(name, words);
        }
        for ff in ff_blocks(module) {
            state.prev_clocks.insert(ff.clock, false);
        }

        self.states.insert(path.to_string(), state);
    }

    /// Whether a module or anything it instantiates contains `always_ff`.
    fn is_seq_deep(&mut self, module: &Arc<ModuleInfo>) -> Result<bool, SimError> {
        let key = (module.path.clone(), module.name_text.clone());
        if let Some(&v) = self.seq_deep.get(&key) {
            return Ok(v);
        }
        // Insert a provisional `false` to terminate instance cycles.
        self.seq_deep.insert(key.clone(), false);

        let mut result = module.is_sequential;
        if !result {
            for item in &module.ast.items {
                let ModuleItem::Instance(inst) = item else {
                    continue;
                };
                let child_name = self.cache.interner().resolve(inst.module_name).to_string();
                match self.cache.resolve(&child_name, module.dir()) {
                    Ok(child) => {
                        if self.is_seq_deep(&child)? {
                            result = true;
                            break;
                        }
                    }
                    // Unresolvable children surface when evaluation
                    // actually reaches them.
                    Err(_) => continue,
                }
            }
        }
        self.seq_deep.insert(key, result);
        Ok(result)
    }
}

/// The `always_ff` blocks of a module, in source order.
fn ff_blocks(module: &ModuleInfo) -> impl Iterator<Item = &AlwaysFfBlock> {
    module.ast.items.iter().filter_map(|item| match item {
        ModuleItem::AlwaysFf(ff) => Some(ff),
        _ => None,
    })
}

/// The clock signals named by a module's `always_ff` blocks.
fn ff_clocks(module: &ModuleInfo) -> Vec<Ident> {
    let mut clocks = Vec::new();
    for ff in ff_blocks(module) {
        if !clocks.contains(&ff.clock) {
            clocks.push(ff.clock);
        }
    }
    clocks
}

/// The state variables of a module: every non-memory signal assigned
/// anywhere inside its `always_ff` blocks.
fn ff_targets(module: &ModuleInfo) -> HashSet<Ident> {
    fn walk(stmt: &Statement, module: &ModuleInfo, out: &mut HashSet<Ident>) {
        match stmt {
            Statement::Blocking { target, .. } | Statement::NonBlocking { target, .. } => {
                for base in comb::lvalue_bases(target) {
                    if !module.memories.contains_key(&base) {
                        out.insert(base);
                    }
                }
            }
            Statement::Block { stmts, .. } => {
                for s in stmts {
                    walk(s, module, out);
                }
            }
            Statement::If {
                then_stmt,
                else_stmt,
                ..
            } => {
                walk(then_stmt, module, out);
                if let Some(e) = else_stmt {
                    walk(e, module, out);
                }
            }
            Statement::Case { arms, .. } => {
                for arm in arms {
                    walk(&arm.body, module, out);
                }
            }
            Statement::Error(_) => {}
        }
    }

    let mut out = HashSet::new();
    for ff in ff_blocks(module) {
        walk(&ff.body, module, &mut out);
    }
    out
}

//! The combinational evaluator: dataflow fixpoint over one module.
//!
//! There is no explicit dependency graph. Each pass walks the module's
//! continuous assignments, child instances, and `always_comb` blocks,
//! executing whichever items have all of their read signals bound. The
//! loop ends when a full pass changes nothing; outputs still unbound at
//! that point mean a combinational cycle (or an oscillation, caught by
//! the pass cap). Forward references therefore cost extra passes instead
//! of failing.

use crate::env::SignalEnv;
use crate::error::SimError;
use crate::eval::{collect_reads, eval_expr, resolve_lvalue, store_env, EvalCtx};
use galena_common::{Bits, Ident};
use galena_resolve::{ModuleCache, ModuleInfo, PortDirection};
use galena_sv_parser::ast::{
    AlwaysCombBlock, ContinuousAssign, Expr, Instantiation, ModuleItem, Statement,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Instance nesting deeper than this is treated as a cycle in the
/// instance graph.
pub(crate) const MAX_DEPTH: usize = 64;
/// Fixpoint passes beyond this mean the design oscillates.
pub(crate) const MAX_PASSES: usize = 1024;

/// Drives a combinational module: binds `inputs`, runs the fixpoint, and
/// returns the module's outputs.
///
/// Inputs must cover every input port with exactly the declared width;
/// anything else is a [`SimError::PortWidthMismatch`].
pub fn evaluate(
    cache: &ModuleCache,
    module: &ModuleInfo,
    inputs: &HashMap<Ident, Bits>,
) -> Result<HashMap<Ident, Bits>, SimError> {
    eval_module(cache, module, inputs, 0)
}

pub(crate) fn eval_module(
    cache: &ModuleCache,
    module: &ModuleInfo,
    inputs: &HashMap<Ident, Bits>,
    depth: usize,
) -> Result<HashMap<Ident, Bits>, SimError> {
    if depth > MAX_DEPTH {
        return Err(cycle_error(cache, module, &SignalEnv::new()));
    }

    // ROM primitives are pure lookups: data = rom[addr].
    if let Some(rom) = &module.rom {
        let addr_port = module
            .inputs()
            .next()
            .expect("ROM shape check requires one input");
        let data_port = module
            .outputs()
            .next()
            .expect("ROM shape check requires one output");
        let addr = checked_input(cache, module, inputs, addr_port.name)?;
        let word = rom.read(addr.value());
        return Ok(HashMap::from([(
            data_port.name,
            Bits::new(rom.data_width, word),
        )]));
    }

    let mut env = SignalEnv::new();
    for port in module.inputs() {
        let value = checked_input(cache, module, inputs, port.name)?;
        env.bind(port.name, value);
    }

    fixpoint(cache, module, &mut env, depth)?;

    let mut outputs = HashMap::new();
    let mut missing = Vec::new();
    for port in module.outputs() {
        match env.get(port.name) {
            Some(v) => {
                outputs.insert(port.name, v.resize(port.width));
            }
            None => missing.push(cache.interner().resolve(port.name).to_string()),
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
    cache: &ModuleCache,
    module: &ModuleInfo,
    inputs: &HashMap<Ident, Bits>,
    name: Ident,
) -> Result<Bits, SimError> {
    let port = module.port(name).expect("caller iterates the port list");
    let mismatch = |given| SimError::PortWidthMismatch {
        module: module.name_text.clone(),
        port: cache.interner().resolve(name).to_string(),
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

fn cycle_error(cache: &ModuleCache, module: &ModuleInfo, env: &SignalEnv) -> SimError {
    let outputs = module
        .outputs()
        .filter(|p| env.get(p.name).is_none())
        .map(|p| cache.interner().resolve(p.name).to_string())
        .collect();
    SimError::CombinationalCycle {
        module: module.name_text.clone(),
        outputs,
    }
}

/// Runs the dataflow fixpoint over assigns, instances, and `always_comb`
/// blocks until a full pass binds nothing new.
pub(crate) fn fixpoint(
    cache: &ModuleCache,
    module: &ModuleInfo,
    env: &mut SignalEnv,
    depth: usize,
) -> Result<(), SimError> {
    let mut assigns: Vec<&ContinuousAssign> = Vec::new();
    let mut instances: Vec<&Instantiation> = Vec::new();
    let mut combs: Vec<&AlwaysCombBlock> = Vec::new();
    for item in &module.ast.items {
        match item {
            ModuleItem::Assign(a) => assigns.push(a),
            ModuleItem::Instance(i) => instances.push(i),
            ModuleItem::AlwaysComb(c) => combs.push(c),
            _ => {}
        }
    }

    let mut last_child_inputs: Vec<Option<Vec<Bits>>> = vec![None; instances.len()];

    for _pass in 0..MAX_PASSES {
        let mut changed = false;

        for assign in &assigns {
            if !expr_ready(&assign.value, env, module)
                || !lvalue_indices_ready(&assign.target, env, module)
            {
                continue;
            }
            let (value, slot) = {
                let ctx = EvalCtx {
                    env,
                    module,
                    interner: cache.interner(),
                    mems: None,
                };
                (
                    eval_expr(&ctx, &assign.value)?,
                    resolve_lvalue(&ctx, &assign.target)?,
                )
            };
            changed |= store_env(env, module, cache.interner(), &slot, value, assign.span)?;
        }

        for (idx, inst) in instances.iter().enumerate() {
            let bound = bind_instance(cache, module, inst)?;
            if bound.child.is_sequential {
                return Err(SimError::Unsupported {
                    module: module.name_text.clone(),
                    message: format!(
                        "instance '{}' is sequential; combinational evaluation cannot drive it",
                        cache.interner().resolve(inst.instance_name)
                    ),
                    location: module.locate(inst.span),
                });
            }
            let ready = bound
                .input_exprs
                .iter()
                .all(|(_, _, e)| expr_ready(e, env, module));
            if !ready {
                continue;
            }

            let mut child_inputs = HashMap::new();
            let mut snapshot = Vec::with_capacity(bound.input_exprs.len());
            {
                let ctx = EvalCtx {
                    env,
                    module,
                    interner: cache.interner(),
                    mems: None,
                };
                for (port, width, expr) in &bound.input_exprs {
                    let v = eval_expr(&ctx, expr)?.resize(*width);
                    snapshot.push(v);
                    child_inputs.insert(*port, v);
                }
            }
            if last_child_inputs[idx].as_ref() == Some(&snapshot) {
                continue;
            }

            let child_outputs = eval_module(cache, &bound.child, &child_inputs, depth + 1)?;

            let mut all_bound = true;
            for (port, actual) in &bound.output_conns {
                let Some(value) = child_outputs.get(port) else {
                    continue;
                };
                if !lvalue_indices_ready(actual, env, module) {
                    all_bound = false;
                    continue;
                }
                let slot = {
                    let ctx = EvalCtx {
                        env,
                        module,
                        interner: cache.interner(),
                        mems: None,
                    };
                    resolve_lvalue(&ctx, actual)?
                };
                changed |= store_env(env, module, cache.interner(), &slot, *value, inst.span)?;
            }
            // Only memoize the input snapshot once every output landed, so
            // an output behind a not-yet-ready index retries next pass.
            if all_bound {
                last_child_inputs[idx] = Some(snapshot);
            }
            changed = true;
        }

        for comb in &combs {
            if !comb_ready(&comb.body, env, module) {
                continue;
            }
            changed |= exec_blocking(&comb.body, env, module, cache, None)?;
        }

        if !changed {
            return Ok(());
        }
    }

    Err(cycle_error(cache, module, env))
}

/// A child instance with its connections matched against the child's
/// port list.
pub(crate) struct BoundInstance<'a> {
    /// The resolved child module.
    pub child: Arc<ModuleInfo>,
    /// `(port, port width, driving expression)` for each input port.
    pub input_exprs: Vec<(Ident, u32, &'a Expr)>,
    /// `(port, receiving lvalue)` for each connected output port.
    pub output_conns: Vec<(Ident, &'a Expr)>,
}

/// Resolves an instantiation's child module and matches named or
/// positional connections to its ports.
pub(crate) fn bind_instance<'a>(
    cache: &ModuleCache,
    module: &ModuleInfo,
    inst: &'a Instantiation,
) -> Result<BoundInstance<'a>, SimError> {
    let child_name = cache.interner().resolve(inst.module_name).to_string();
    let child = cache.resolve(&child_name, module.dir())?;

    let mut input_exprs = Vec::new();
    let mut output_conns = Vec::new();

    for (idx, conn) in inst.connections.iter().enumerate() {
        let port = match conn.formal {
            Some(formal) => child.port(formal).ok_or_else(|| SimError::Unsupported {
                module: module.name_text.clone(),
                message: format!(
                    "instance '{}' connects unknown port '{}' of '{}'",
                    cache.interner().resolve(inst.instance_name),
                    cache.interner().resolve(formal),
                    child_name,
                ),
                location: module.locate(conn.span),
            })?,
            None => child.ports.get(idx).ok_or_else(|| SimError::Unsupported {
                module: module.name_text.clone(),
                message: format!(
                    "instance '{}' has more positional connections than '{}' has ports",
                    cache.interner().resolve(inst.instance_name),
                    child_name,
                ),
                location: module.locate(conn.span),
            })?,
        };
        match port.direction {
            PortDirection::Input => input_exprs.push((port.name, port.width, &conn.actual)),
            PortDirection::Output => output_conns.push((port.name, &conn.actual)),
        }
    }

    Ok(BoundInstance {
        child,
        input_exprs,
        output_conns,
    })
}

/// `true` when every signal the expression reads is bound.
pub(crate) fn expr_ready(expr: &Expr, env: &SignalEnv, module: &ModuleInfo) -> bool {
    let mut reads = HashSet::new();
    collect_reads(expr, module, &mut reads);
    reads.into_iter().all(|name| env.is_bound(name))
}

/// `true` when the index/range expressions of an lvalue are bound. The
/// base signal itself may be unbound; storing creates it.
pub(crate) fn lvalue_indices_ready(target: &Expr, env: &SignalEnv, module: &ModuleInfo) -> bool {
    match target {
        Expr::Identifier { .. } => true,
        Expr::Index { index, .. } => expr_ready(index, env, module),
        Expr::RangeSelect { msb, lsb, .. } => {
            expr_ready(msb, env, module) && expr_ready(lsb, env, module)
        }
        Expr::Concat { elements, .. } => elements
            .iter()
            .all(|e| lvalue_indices_ready(e, env, module)),
        _ => true,
    }
}

/// Executes a statement tree with blocking semantics, binding into `env`.
/// Returns `true` if any binding changed. Non-blocking assignments are
/// rejected; they belong to `always_ff`.
pub(crate) fn exec_blocking(
    stmt: &Statement,
    env: &mut SignalEnv,
    module: &ModuleInfo,
    cache: &ModuleCache,
    mems: Option<&HashMap<Ident, Vec<Bits>>>,
) -> Result<bool, SimError> {
    match stmt {
        Statement::Blocking {
            target,
            value,
            span,
        } => {
            let (v, slot) = {
                let ctx = EvalCtx {
                    env,
                    module,
                    interner: cache.interner(),
                    mems,
                };
                (eval_expr(&ctx, value)?, resolve_lvalue(&ctx, target)?)
            };
            store_env(env, module, cache.interner(), &slot, v, *span)
        }
        Statement::NonBlocking { span, .. } => Err(SimError::Unsupported {
            module: module.name_text.clone(),
            message: "non-blocking assignment outside `always_ff`".into(),
            location: module.locate(*span),
        }),
        Statement::Block { stmts, .. } => {
            let mut changed = false;
            for s in stmts {
                changed |= exec_blocking(s, env, module, cache, mems)?;
            }
            Ok(changed)
        }
        Statement::If {
            condition,
            then_stmt,
            else_stmt,
            ..
        } => {
            let taken = {
                let ctx = EvalCtx {
                    env,
                    module,
                    interner: cache.interner(),
                    mems,
                };
                eval_expr(&ctx, condition)?.is_true()
            };
            if taken {
                exec_blocking(then_stmt, env, module, cache, mems)
            } else if let Some(else_stmt) = else_stmt {
                exec_blocking(else_stmt, env, module, cache, mems)
            } else {
                Ok(false)
            }
        }
        Statement::Case { subject, arms, .. } => {
            let selector = {
                let ctx = EvalCtx {
                    env,
                    module,
                    interner: cache.interner(),
                    mems,
                };
                eval_expr(&ctx, subject)?
            };
            // Non-default arms in source order, then default.
            for arm in arms.iter().filter(|a| !a.is_default) {
                for pattern in &arm.patterns {
                    let hit = {
                        let ctx = EvalCtx {
                            env,
                            module,
                            interner: cache.interner(),
                            mems,
                        };
                        let p = eval_expr(&ctx, pattern)?;
                        selector.compare(&p, galena_common::CompareOp::Eq).is_true()
                    };
                    if hit {
                        return exec_blocking(&arm.body, env, module, cache, mems);
                    }
                }
            }
            if let Some(default) = arms.iter().find(|a| a.is_default) {
                return exec_blocking(&default.body, env, module, cache, mems);
            }
            Ok(false)
        }
        Statement::Error(_) => unreachable!("error nodes do not survive resolution"),
    }
}

/// `true` when every signal the block reads before assigning it locally
/// is bound in the environment.
pub(crate) fn comb_ready(body: &Statement, env: &SignalEnv, module: &ModuleInfo) -> bool {
    let mut assigned = HashSet::new();
    let mut reads = HashSet::new();
    free_reads(body, module, &mut assigned, &mut reads);
    reads.into_iter().all(|name| env.is_bound(name))
}

/// Collects the identifiers a statement tree reads before any local
/// assignment covers them. Branch-assigned names count as assigned only
/// when every branch assigns them.
pub(crate) fn free_reads(
    stmt: &Statement,
    module: &ModuleInfo,
    assigned: &mut HashSet<Ident>,
    reads: &mut HashSet<Ident>,
) {
    let mut note_expr = |expr: &Expr, assigned: &HashSet<Ident>, reads: &mut HashSet<Ident>| {
        let mut r = HashSet::new();
        collect_reads(expr, module, &mut r);
        for name in r {
            if !assigned.contains(&name) {
                reads.insert(name);
            }
        }
    };

    match stmt {
        Statement::Blocking { target, value, .. }
        | Statement::NonBlocking { target, value, .. } => {
            note_expr(value, assigned, reads);
            lvalue_index_reads(target, module, assigned, reads);
            for base in lvalue_bases(target) {
                assigned.insert(base);
            }
        }
        Statement::Block { stmts, .. } => {
            for s in stmts {
                free_reads(s, module, assigned, reads);
            }
        }
        Statement::If {
            condition,
            then_stmt,
            else_stmt,
            ..
        } => {
            note_expr(condition, assigned, reads);
            let mut then_assigned = assigned.clone();
            free_reads(then_stmt, module, &mut then_assigned, reads);
            let mut else_assigned = assigned.clone();
            if let Some(else_stmt) = else_stmt {
                free_reads(else_stmt, module, &mut else_assigned, reads);
            }
            for name in then_assigned.intersection(&else_assigned) {
                assigned.insert(*name);
            }
        }
        Statement::Case { subject, arms, .. } => {
            note_expr(subject, assigned, reads);
            let mut common: Option<HashSet<Ident>> = None;
            let has_default = arms.iter().any(|a| a.is_default);
            for arm in arms {
                for p in &arm.patterns {
                    note_expr(p, assigned, reads);
                }
                let mut arm_assigned = assigned.clone();
                free_reads(&arm.body, module, &mut arm_assigned, reads);
                common = Some(match common {
                    None => arm_assigned,
                    Some(prev) => prev.intersection(&arm_assigned).copied().collect(),
                });
            }
            // Without a default, some selector value assigns nothing.
            if has_default {
                if let Some(common) = common {
                    for name in common {
                        assigned.insert(name);
                    }
                }
            }
        }
        Statement::Error(_) => {}
    }
}

fn lvalue_index_reads(
    target: &Expr,
    module: &ModuleInfo,
    assigned: &HashSet<Ident>,
    reads: &mut HashSet<Ident>,
) {
    let mut note = |expr: &Expr| {
        let mut r = HashSet::new();
        collect_reads(expr, module, &mut r);
        for name in r {
            if !assigned.contains(&name) {
                reads.insert(name);
            }
        }
    };
    match target {
        Expr::Index { index, .. } => note(index),
        Expr::RangeSelect { msb, lsb, .. } => {
            note(msb);
            note(lsb);
        }
        Expr::Concat { elements, .. } => {
            for e in elements {
                lvalue_index_reads(e, module, assigned, reads);
            }
        }
        _ => {}
    }
}

/// The base signal names an lvalue writes.
pub(crate) fn lvalue_bases(target: &Expr) -> Vec<Ident> {
    match target {
        Expr::Identifier { name, .. } => vec![*name],
        Expr::Index { base, .. } | Expr::RangeSelect { base, .. } => lvalue_bases(base),
        Expr::Concat { elements, .. } => elements.iter().flat_map(lvalue_bases).collect(),
        _ => Vec::new(),
    }
}

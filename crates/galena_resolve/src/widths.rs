//! The per-load width inference pass.
//!
//! Runs once when a file is parsed: constant-folds declaration ranges,
//! builds the resolved port list (merging non-ANSI header names with body
//! declarations), collects memory shapes, and propagates net widths from
//! declarations and assignment right-hand sides. Instance-port inference
//! runs afterwards in the cache, where child modules are reachable.

use crate::error::ResolveError;
use crate::module::{MemoryInfo, ModuleInfo, Port, PortDirection};
use galena_common::{Ident, Interner};
use galena_source::SourceFile;
use galena_sv_parser::ast::{
    Direction, Expr, ModuleDecl, ModuleItem, PortStyle, Range, UnaryOp,
};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

/// Builds the resolved view of one parsed module.
pub(crate) fn build_module_info(
    ast: ModuleDecl,
    interner: &Interner,
    path: PathBuf,
    source: Arc<SourceFile>,
) -> Result<ModuleInfo, ResolveError> {
    let name_text = interner.resolve(ast.name).to_string();

    // --- Ports -------------------------------------------------------
    let mut ports: Vec<Port> = Vec::new();
    let mut seen: HashSet<Ident> = HashSet::new();

    fn push_port(
        ports: &mut Vec<Port>,
        seen: &mut HashSet<Ident>,
        port: Port,
        module: &str,
        interner: &Interner,
    ) -> Result<(), ResolveError> {
        if !seen.insert(port.name) {
            return Err(ResolveError::Invalid {
                module: module.to_string(),
                message: format!("port '{}' re-declared", interner.resolve(port.name)),
            });
        }
        ports.push(port);
        Ok(())
    }

    match ast.port_style {
        PortStyle::Ansi | PortStyle::Empty => {
            for decl in &ast.ports {
                let width = decl_width(decl.range.as_ref(), &name_text)?;
                for &name in &decl.names {
                    push_port(
                        &mut ports,
                        &mut seen,
                        Port {
                            name,
                            direction: direction_of(decl.direction),
                            width,
                            signed: decl.signed,
                        },
                        &name_text,
                        interner,
                    )?;
                }
            }
            for item in &ast.items {
                if let ModuleItem::Port(_) = item {
                    return Err(ResolveError::Invalid {
                        module: name_text,
                        message: "body port declaration in a module with an ANSI header".into(),
                    });
                }
            }
        }
        PortStyle::NonAnsi => {
            // Collect body declarations, then emit in header order.
            let mut decls: HashMap<Ident, Port> = HashMap::new();
            for item in &ast.items {
                if let ModuleItem::Port(decl) = item {
                    let width = decl_width(decl.range.as_ref(), &name_text)?;
                    for &name in &decl.names {
                        let port = Port {
                            name,
                            direction: direction_of(decl.direction),
                            width,
                            signed: decl.signed,
                        };
                        if decls.insert(name, port).is_some() {
                            return Err(ResolveError::Invalid {
                                module: name_text,
                                message: format!(
                                    "port '{}' re-declared",
                                    interner.resolve(name)
                                ),
                            });
                        }
                    }
                }
            }
            for &name in &ast.port_names {
                let port = decls.remove(&name).ok_or_else(|| ResolveError::Invalid {
                    module: name_text.clone(),
                    message: format!(
                        "port '{}' is listed in the header but never declared",
                        interner.resolve(name)
                    ),
                })?;
                push_port(&mut ports, &mut seen, port, &name_text, interner)?;
            }
            if let Some((&name, _)) = decls.iter().next() {
                return Err(ResolveError::Invalid {
                    module: name_text,
                    message: format!(
                        "'{}' is declared as a port but not listed in the header",
                        interner.resolve(name)
                    ),
                });
            }
        }
    }

    // --- Nets and memories -------------------------------------------
    let mut net_widths: HashMap<Ident, u32> = HashMap::new();
    let mut signed_nets: HashSet<Ident> = HashSet::new();
    let mut memories: HashMap<Ident, MemoryInfo> = HashMap::new();

    for port in &ports {
        net_widths.insert(port.name, port.width);
        if port.signed {
            signed_nets.insert(port.name);
        }
    }

    for item in &ast.items {
        let ModuleItem::Net(decl) = item else {
            continue;
        };
        let width = decl_width(decl.range.as_ref(), &name_text)?;
        for decl_name in &decl.names {
            match decl_name.dims.len() {
                0 => {
                    // A re-declaration of a port name keeps the port width.
                    net_widths.entry(decl_name.name).or_insert(width);
                }
                1 => {
                    let (depth_msb, depth_lsb) = fold_range(&decl_name.dims[0], &name_text)?;
                    if depth_lsb != 0 {
                        return Err(ResolveError::Invalid {
                            module: name_text,
                            message: "memory dimensions must end at 0".into(),
                        });
                    }
                    memories.insert(
                        decl_name.name,
                        MemoryInfo {
                            width,
                            depth: depth_msb + 1,
                        },
                    );
                }
                _ => {
                    return Err(ResolveError::Invalid {
                        module: name_text,
                        message: format!(
                            "memory '{}' has more than one dimension",
                            interner.resolve(decl_name.name)
                        ),
                    });
                }
            }
            if decl.signed {
                signed_nets.insert(decl_name.name);
            }
        }
    }

    // --- Width propagation from assignment right-hand sides ----------
    let declared: HashSet<Ident> = net_widths.keys().copied().collect();
    loop {
        let mut changed = false;
        for item in &ast.items {
            let ModuleItem::Assign(assign) = item else {
                continue;
            };
            match &assign.target {
                Expr::Identifier { name, .. } if !net_widths.contains_key(name) => {
                    if let Some(w) = static_width(&assign.value, &net_widths, &memories) {
                        net_widths.insert(*name, w);
                        changed = true;
                    }
                }
                // A slice target implies the net is at least msb+1 wide.
                // Declared widths are never widened.
                Expr::RangeSelect { base, msb, .. } => {
                    if let (Expr::Identifier { name, .. }, Some(m)) =
                        (base.as_ref(), const_fold(msb))
                    {
                        if declared.contains(name) {
                            continue;
                        }
                        let need = (m + 1).min(64) as u32;
                        let entry = net_widths.entry(*name).or_insert(0);
                        if *entry < need {
                            *entry = need;
                            changed = true;
                        }
                    }
                }
                _ => {}
            }
        }
        if !changed {
            break;
        }
    }
    net_widths.retain(|_, w| *w > 0);

    let is_sequential = ast
        .items
        .iter()
        .any(|item| matches!(item, ModuleItem::AlwaysFf(_)));

    Ok(ModuleInfo {
        name: ast.name,
        name_text,
        path,
        source,
        ast,
        ports,
        net_widths,
        signed_nets,
        memories,
        is_sequential,
        rom: None,
    })
}

/// Second inference stage: nets driven by child-instance outputs take the
/// child port's width. `child_ports` maps a child module name to its
/// resolved port list; unknown children are skipped and their widths are
/// settled at evaluation time.
pub(crate) fn infer_instance_widths(
    info: &mut ModuleInfo,
    child_ports: &HashMap<Ident, Vec<Port>>,
) {
    let mut inferred: Vec<(Ident, u32)> = Vec::new();

    for item in &info.ast.items {
        let ModuleItem::Instance(inst) = item else {
            continue;
        };
        let Some(ports) = child_ports.get(&inst.module_name) else {
            continue;
        };
        for (idx, conn) in inst.connections.iter().enumerate() {
            let port = match conn.formal {
                Some(formal) => ports.iter().find(|p| p.name == formal),
                None => ports.get(idx),
            };
            let Some(port) = port else { continue };
            if port.direction != PortDirection::Output {
                continue;
            }
            if let Expr::Identifier { name, .. } = &conn.actual {
                if !info.net_widths.contains_key(name) {
                    inferred.push((*name, port.width));
                }
            }
        }
    }

    for (name, width) in inferred {
        info.net_widths.entry(name).or_insert(width);
    }
}

fn direction_of(dir: Direction) -> PortDirection {
    match dir {
        Direction::Input => PortDirection::Input,
        Direction::Output => PortDirection::Output,
    }
}

/// Folds a declaration range to its width, requiring `[msb:0]` form.
fn decl_width(range: Option<&Range>, module: &str) -> Result<u32, ResolveError> {
    let Some(range) = range else { return Ok(1) };
    let (msb, lsb) = fold_range(range, module)?;
    if lsb != 0 {
        return Err(ResolveError::Invalid {
            module: module.to_string(),
            message: format!("declaration range [{msb}:{lsb}] must end at 0"),
        });
    }
    let width = msb + 1;
    if width > 64 {
        return Err(ResolveError::Invalid {
            module: module.to_string(),
            message: format!("width {width} exceeds the 64-bit limit"),
        });
    }
    Ok(width as u32)
}

fn fold_range(range: &Range, module: &str) -> Result<(u64, u64), ResolveError> {
    let err = || ResolveError::Invalid {
        module: module.to_string(),
        message: "range bounds must be constant expressions".to_string(),
    };
    let msb = const_fold(&range.msb).ok_or_else(err)?;
    let lsb = const_fold(&range.lsb).ok_or_else(err)?;
    if msb < lsb {
        return Err(ResolveError::Invalid {
            module: module.to_string(),
            message: format!("ascending range [{msb}:{lsb}] is not supported"),
        });
    }
    Ok((msb, lsb))
}

/// Constant-folds a literal-only expression, as allowed in range bounds
/// and replication counts. Returns `None` for anything non-constant.
pub(crate) fn const_fold(expr: &Expr) -> Option<u64> {
    use galena_sv_parser::ast::BinaryOp;
    match expr {
        Expr::Literal { value, .. } => Some(*value),
        Expr::Paren { inner, .. } => const_fold(inner),
        Expr::Unary {
            op: UnaryOp::Neg, ..
        } => None,
        Expr::Binary {
            left, op, right, ..
        } => {
            let l = const_fold(left)?;
            let r = const_fold(right)?;
            match op {
                BinaryOp::Add => l.checked_add(r),
                BinaryOp::Sub => l.checked_sub(r),
                BinaryOp::Mul => l.checked_mul(r),
                BinaryOp::Shl => l.checked_shl(r.try_into().ok()?),
                BinaryOp::Shr => l.checked_shr(r.try_into().ok()?),
                _ => None,
            }
        }
        _ => None,
    }
}

/// The statically known width of an expression, following the value
/// model's propagation rules. `None` when it depends on a net whose width
/// is not yet known.
pub(crate) fn static_width(
    expr: &Expr,
    widths: &HashMap<Ident, u32>,
    memories: &HashMap<Ident, MemoryInfo>,
) -> Option<u32> {
    use galena_sv_parser::ast::BinaryOp;
    match expr {
        Expr::Literal { width, .. } => Some(width.unwrap_or(32)),
        Expr::Identifier { name, .. } => widths.get(name).copied(),
        Expr::Paren { inner, .. } => static_width(inner, widths, memories),
        Expr::Unary { op, operand, .. } => match op {
            UnaryOp::LogNot => Some(1),
            UnaryOp::BitNot | UnaryOp::Neg => static_width(operand, widths, memories),
        },
        Expr::Binary {
            left, op, right, ..
        } => match op {
            BinaryOp::LogAnd
            | BinaryOp::LogOr
            | BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge => Some(1),
            BinaryOp::Shl | BinaryOp::Shr => static_width(left, widths, memories),
            _ => {
                let l = static_width(left, widths, memories)?;
                let r = static_width(right, widths, memories)?;
                Some(l.max(r))
            }
        },
        Expr::Ternary {
            then_expr,
            else_expr,
            ..
        } => {
            let t = static_width(then_expr, widths, memories)?;
            let e = static_width(else_expr, widths, memories)?;
            Some(t.max(e))
        }
        Expr::Concat { elements, .. } => {
            let mut total = 0u32;
            for e in elements {
                total += static_width(e, widths, memories)?;
            }
            Some(total)
        }
        Expr::Repeat {
            count, elements, ..
        } => {
            let n = const_fold(count)? as u32;
            let mut total = 0u32;
            for e in elements {
                total += static_width(e, widths, memories)?;
            }
            total.checked_mul(n)
        }
        Expr::Index { base, .. } => {
            if let Expr::Identifier { name, .. } = base.as_ref() {
                if let Some(mem) = memories.get(name) {
                    return Some(mem.width);
                }
            }
            Some(1)
        }
        Expr::RangeSelect { msb, lsb, .. } => {
            let m = const_fold(msb)?;
            let l = const_fold(lsb)?;
            if m >= l {
                Some((m - l + 1) as u32)
            } else {
                None
            }
        }
        Expr::Error(_) => None,
    }
}

//! Pure expression evaluation and lvalue resolution.
//!
//! [`eval_expr`] maps an AST expression and a [`SignalEnv`] to a
//! width-correct [`Bits`] with no side effects. Lvalues resolve to
//! [`LvalueSlot`]s (whole signal, bit range, or memory word) that the
//! combinational and sequential engines store through.

use crate::env::SignalEnv;
use crate::error::SimError;
use galena_common::{Bits, CompareOp, Ident, Interner, MAX_WIDTH};
use galena_resolve::ModuleInfo;
use galena_source::Span;
use galena_sv_parser::ast::{BinaryOp, Expr, UnaryOp};
use std::collections::{HashMap, HashSet};

/// Everything an expression needs to evaluate: the environment, the
/// module's width/signedness tables, and (in sequential context) the
/// instance's memory arrays.
pub struct EvalCtx<'a> {
    /// Current signal bindings.
    pub env: &'a SignalEnv,
    /// The module being evaluated.
    pub module: &'a ModuleInfo,
    /// Resolves identifiers for error messages.
    pub interner: &'a Interner,
    /// Memory arrays of this instance, when evaluating sequentially.
    pub mems: Option<&'a HashMap<Ident, Vec<Bits>>>,
}

impl EvalCtx<'_> {
    fn name_of(&self, ident: Ident) -> String {
        self.interner.resolve(ident).to_string()
    }

    fn undefined(&self, name: Ident, span: Span) -> SimError {
        SimError::UndefinedIdentifier {
            module: self.module.name_text.clone(),
            name: self.name_of(name),
            location: self.module.locate(span),
        }
    }

    fn index_out(&self, message: String, span: Span) -> SimError {
        SimError::IndexOut {
            module: self.module.name_text.clone(),
            message,
            location: self.module.locate(span),
        }
    }

    fn width_err(&self, message: String, span: Span) -> SimError {
        SimError::WidthMismatch {
            module: self.module.name_text.clone(),
            message,
            location: self.module.locate(span),
        }
    }

    fn unsupported(&self, message: String, span: Span) -> SimError {
        SimError::Unsupported {
            module: self.module.name_text.clone(),
            message,
            location: self.module.locate(span),
        }
    }
}

/// Evaluates an expression to a width-correct value.
pub fn eval_expr(ctx: &EvalCtx<'_>, expr: &Expr) -> Result<Bits, SimError> {
    match expr {
        Expr::Literal { width, value, span } => match width {
            Some(w) => Ok(Bits::new(*w, *value)),
            None => {
                if *value >= (1u64 << 32) {
                    return Err(ctx.width_err(
                        format!("unsized literal {value} does not fit in 32 bits"),
                        *span,
                    ));
                }
                Ok(Bits::new(32, *value))
            }
        },

        Expr::Identifier { name, span } => {
            if ctx.module.memories.contains_key(name) {
                return Err(ctx.width_err(
                    format!("memory '{}' referenced without an index", ctx.name_of(*name)),
                    *span,
                ));
            }
            ctx.env.get(*name).ok_or_else(|| ctx.undefined(*name, *span))
        }

        Expr::Unary { op, operand, .. } => {
            let v = eval_expr(ctx, operand)?;
            Ok(match op {
                UnaryOp::BitNot => !&v,
                UnaryOp::LogNot => Bits::bit(!v.is_true()),
                UnaryOp::Neg => Bits::zero(v.width()).sub(&v),
            })
        }

        Expr::Binary {
            left, op, right, ..
        } => {
            let a = eval_expr(ctx, left)?;
            let b = eval_expr(ctx, right)?;
            let signed = is_signed_expr(left, ctx.module) && is_signed_expr(right, ctx.module);
            let cmp = |op: CompareOp| {
                if signed {
                    a.compare_signed(&b, op)
                } else {
                    a.compare(&b, op)
                }
            };
            Ok(match op {
                BinaryOp::BitAnd => &a & &b,
                BinaryOp::BitOr => &a | &b,
                BinaryOp::BitXor => &a ^ &b,
                BinaryOp::LogAnd => Bits::bit(a.is_true() && b.is_true()),
                BinaryOp::LogOr => Bits::bit(a.is_true() || b.is_true()),
                BinaryOp::Eq => cmp(CompareOp::Eq),
                BinaryOp::Ne => cmp(CompareOp::Ne),
                BinaryOp::Lt => cmp(CompareOp::Lt),
                BinaryOp::Le => cmp(CompareOp::Le),
                BinaryOp::Gt => cmp(CompareOp::Gt),
                BinaryOp::Ge => cmp(CompareOp::Ge),
                BinaryOp::Shl => a.shl(b.value()),
                BinaryOp::Shr => a.shr(b.value()),
                BinaryOp::Add => a.add(&b),
                BinaryOp::Sub => a.sub(&b),
                BinaryOp::Mul => a.mul(&b),
            })
        }

        Expr::Ternary {
            condition,
            then_expr,
            else_expr,
            ..
        } => {
            let c = eval_expr(ctx, condition)?;
            let t = eval_expr(ctx, then_expr)?;
            let e = eval_expr(ctx, else_expr)?;
            let width = t.width().max(e.width());
            Ok(if c.is_true() { t } else { e }.resize(width))
        }

        Expr::Concat { elements, span } => {
            let mut parts = Vec::with_capacity(elements.len());
            for element in elements {
                if let Expr::Literal { width: None, .. } = element {
                    return Err(ctx.width_err(
                        "unsized literal in concatenation has unknown width".into(),
                        element.span(),
                    ));
                }
                parts.push(eval_expr(ctx, element)?);
            }
            Bits::concat(&parts).ok_or_else(|| {
                ctx.width_err(
                    format!("concatenation exceeds {MAX_WIDTH} bits"),
                    *span,
                )
            })
        }

        Expr::Repeat {
            count,
            elements,
            span,
        } => {
            let n = eval_expr(ctx, count)?.value();
            let mut parts = Vec::with_capacity(elements.len());
            for element in elements {
                if let Expr::Literal { width: None, .. } = element {
                    return Err(ctx.width_err(
                        "unsized literal in replication has unknown width".into(),
                        element.span(),
                    ));
                }
                parts.push(eval_expr(ctx, element)?);
            }
            let unit = Bits::concat(&parts)
                .ok_or_else(|| ctx.width_err("replication unit is empty or too wide".into(), *span))?;
            let n = u32::try_from(n)
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| ctx.width_err(format!("bad replication count {n}"), *span))?;
            unit.replicate(n).ok_or_else(|| {
                ctx.width_err(format!("replication exceeds {MAX_WIDTH} bits"), *span)
            })
        }

        Expr::Index { base, index, span } => {
            // A memory read: base names a memory array of this module.
            if let Expr::Identifier { name, .. } = base.as_ref() {
                if let Some(mem) = ctx.module.memories.get(name) {
                    let addr = eval_expr(ctx, index)?.value();
                    let word = ctx
                        .mems
                        .and_then(|bank| bank.get(name))
                        .and_then(|words| words.get(addr as usize))
                        .copied();
                    // Out-of-range reads (and reads outside sequential
                    // state) yield zero.
                    return Ok(word.unwrap_or_else(|| Bits::zero(mem.width)));
                }
            }
            let v = eval_expr(ctx, base)?;
            let i = eval_expr(ctx, index)?.value();
            u32::try_from(i)
                .ok()
                .and_then(|i| v.select_bit(i))
                .ok_or_else(|| {
                    ctx.index_out(
                        format!("bit {i} out of range for a {}-bit value", v.width()),
                        *span,
                    )
                })
        }

        Expr::RangeSelect {
            base, msb, lsb, span,
        } => {
            let v = eval_expr(ctx, base)?;
            let hi = eval_expr(ctx, msb)?.value();
            let lo = eval_expr(ctx, lsb)?.value();
            let (hi, lo) = match (u32::try_from(hi), u32::try_from(lo)) {
                (Ok(hi), Ok(lo)) => (hi, lo),
                _ => {
                    return Err(ctx.index_out(format!("range [{hi}:{lo}] is malformed"), *span));
                }
            };
            v.select_range(hi, lo).ok_or_else(|| {
                ctx.index_out(
                    format!(
                        "range [{hi}:{lo}] out of range for a {}-bit value",
                        v.width()
                    ),
                    *span,
                )
            })
        }

        Expr::Paren { inner, .. } => eval_expr(ctx, inner),

        // The resolver refuses files with parse errors, so error nodes
        // never reach evaluation.
        Expr::Error(_) => unreachable!("error nodes do not survive resolution"),
    }
}

/// Whether an expression is treated as signed for comparison purposes:
/// an identifier declared `signed`, possibly through parentheses,
/// complement/negation, or arithmetic of two signed operands.
pub(crate) fn is_signed_expr(expr: &Expr, module: &ModuleInfo) -> bool {
    match expr {
        Expr::Identifier { name, .. } => module.is_signed(*name),
        Expr::Paren { inner, .. } => is_signed_expr(inner, module),
        Expr::Unary {
            op: UnaryOp::BitNot | UnaryOp::Neg,
            operand,
            ..
        } => is_signed_expr(operand, module),
        Expr::Binary {
            left,
            op: BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul,
            right,
            ..
        } => is_signed_expr(left, module) && is_signed_expr(right, module),
        _ => false,
    }
}

/// Collects the identifiers an expression reads from the environment.
/// Memory names are skipped because memory words live in sequential state, not
/// the environment, but their address expressions are walked.
pub(crate) fn collect_reads(expr: &Expr, module: &ModuleInfo, out: &mut HashSet<Ident>) {
    match expr {
        Expr::Literal { .. } | Expr::Error(_) => {}
        Expr::Identifier { name, .. } => {
            if !module.memories.contains_key(name) {
                out.insert(*name);
            }
        }
        Expr::Unary { operand, .. } => collect_reads(operand, module, out),
        Expr::Binary { left, right, .. } => {
            collect_reads(left, module, out);
            collect_reads(right, module, out);
        }
        Expr::Ternary {
            condition,
            then_expr,
            else_expr,
            ..
        } => {
            collect_reads(condition, module, out);
            collect_reads(then_expr, module, out);
            collect_reads(else_expr, module, out);
        }
        Expr::Concat { elements, .. } => {
            for e in elements {
                collect_reads(e, module, out);
            }
        }
        Expr::Repeat {
            count, elements, ..
        } => {
            collect_reads(count, module, out);
            for e in elements {
                collect_reads(e, module, out);
            }
        }
        Expr::Index { base, index, .. } => {
            collect_reads(base, module, out);
            collect_reads(index, module, out);
        }
        Expr::RangeSelect {
            base, msb, lsb, ..
        } => {
            collect_reads(base, module, out);
            collect_reads(msb, module, out);
            collect_reads(lsb, module, out);
        }
        Expr::Paren { inner, .. } => collect_reads(inner, module, out),
    }
}

// ----------------------------------------------------------------------
// Lvalues
// ----------------------------------------------------------------------

/// A resolved assignment destination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LvalueSlot {
    /// The whole signal.
    Whole(Ident),
    /// Bits `[hi:lo]` of a signal.
    BitRange {
        /// The signal.
        name: Ident,
        /// High bit, inclusive.
        hi: u32,
        /// Low bit, inclusive.
        lo: u32,
    },
    /// One word of a memory array.
    Mem {
        /// The memory.
        name: Ident,
        /// The word address, already evaluated.
        addr: u64,
    },
    /// A concatenation of destinations, MSB first.
    Concat(Vec<LvalueSlot>),
}

/// Resolves an assignment target to a slot, evaluating any index
/// expressions against the current environment.
pub(crate) fn resolve_lvalue(ctx: &EvalCtx<'_>, target: &Expr) -> Result<LvalueSlot, SimError> {
    match target {
        Expr::Identifier { name, span } => {
            if ctx.module.memories.contains_key(name) {
                return Err(ctx.unsupported(
                    format!("memory '{}' assigned without an index", ctx.name_of(*name)),
                    *span,
                ));
            }
            Ok(LvalueSlot::Whole(*name))
        }
        Expr::Index { base, index, span } => {
            let Expr::Identifier { name, .. } = base.as_ref() else {
                return Err(ctx.unsupported("nested select target".into(), *span));
            };
            let i = eval_expr(ctx, index)?.value();
            if ctx.module.memories.contains_key(name) {
                return Ok(LvalueSlot::Mem { name: *name, addr: i });
            }
            let i = u32::try_from(i)
                .map_err(|_| ctx.index_out(format!("bit index {i} is out of range"), *span))?;
            Ok(LvalueSlot::BitRange {
                name: *name,
                hi: i,
                lo: i,
            })
        }
        Expr::RangeSelect {
            base, msb, lsb, span,
        } => {
            let Expr::Identifier { name, .. } = base.as_ref() else {
                return Err(ctx.unsupported("nested select target".into(), *span));
            };
            let hi = eval_expr(ctx, msb)?.value();
            let lo = eval_expr(ctx, lsb)?.value();
            match (u32::try_from(hi), u32::try_from(lo)) {
                (Ok(hi), Ok(lo)) if hi >= lo => Ok(LvalueSlot::BitRange {
                    name: *name,
                    hi,
                    lo,
                }),
                _ => Err(ctx.index_out(format!("range [{hi}:{lo}] is malformed"), *span)),
            }
        }
        Expr::Concat { elements, .. } => {
            let mut slots = Vec::with_capacity(elements.len());
            for e in elements {
                slots.push(resolve_lvalue(ctx, e)?);
            }
            Ok(LvalueSlot::Concat(slots))
        }
        other => Err(ctx.unsupported(
            "expression is not assignable".into(),
            other.span(),
        )),
    }
}

/// The width a slot covers, where statically known. `None` means the
/// target net adopts the width of the assigned value.
pub(crate) fn slot_width(
    slot: &LvalueSlot,
    module: &ModuleInfo,
) -> Option<u32> {
    match slot {
        LvalueSlot::Whole(name) => module.width_of(*name),
        LvalueSlot::BitRange { hi, lo, .. } => Some(hi - lo + 1),
        LvalueSlot::Mem { name, .. } => module.memories.get(name).map(|m| m.width),
        LvalueSlot::Concat(slots) => {
            let mut total = 0;
            for s in slots {
                total += slot_width(s, module)?;
            }
            Some(total)
        }
    }
}

/// Stores `value` through `slot` into the environment.
///
/// Memory slots are rejected; memory writes commit through sequential
/// state, not the environment. Returns `true` when a binding changed.
pub(crate) fn store_env(
    env: &mut SignalEnv,
    module: &ModuleInfo,
    interner: &Interner,
    slot: &LvalueSlot,
    value: Bits,
    span: Span,
) -> Result<bool, SimError> {
    match slot {
        LvalueSlot::Whole(name) => {
            let value = match module.width_of(*name) {
                Some(w) => value.resize(w),
                None => value,
            };
            Ok(env.bind(*name, value))
        }
        LvalueSlot::BitRange { name, hi, lo } => {
            let width = module
                .width_of(*name)
                .or_else(|| env.get(*name).map(|v| v.width()))
                .unwrap_or(hi + 1);
            if *hi >= width {
                return Err(SimError::IndexOut {
                    module: module.name_text.clone(),
                    message: format!(
                        "bit {hi} out of range for {width}-bit signal '{}'",
                        interner.resolve(*name)
                    ),
                    location: module.locate(span),
                });
            }
            let current = env.get(*name).unwrap_or_else(|| Bits::zero(width));
            let slice_w = hi - lo + 1;
            let keep_mask = if slice_w == 64 {
                u64::MAX
            } else {
                ((1u64 << slice_w) - 1) << lo
            };
            let merged =
                (current.value() & !keep_mask) | ((value.resize(slice_w).value()) << lo);
            Ok(env.bind(*name, Bits::new(width, merged)))
        }
        LvalueSlot::Mem { name, .. } => Err(SimError::Unsupported {
            module: module.name_text.clone(),
            message: format!(
                "memory '{}' written outside an `always_ff` non-blocking assignment",
                interner.resolve(*name)
            ),
            location: module.locate(span),
        }),
        LvalueSlot::Concat(slots) => {
            // Split MSB-first: walk from the last (lowest) slot upward.
            let mut changed = false;
            let mut remaining = value.value();
            for s in slots.iter().rev() {
                let w = slot_width(s, module).ok_or_else(|| SimError::WidthMismatch {
                    module: module.name_text.clone(),
                    message: "concatenation target has a component of unknown width".into(),
                    location: module.locate(span),
                })?;
                let part = Bits::new(w, remaining);
                remaining = if w == 64 { 0 } else { remaining >> w };
                changed |= store_env(env, module, interner, s, part, span)?;
            }
            Ok(changed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use galena_resolve::ModuleCache;
    use galena_sv_parser::ast::ModuleItem;
    use std::sync::Arc;

    /// Builds a module around `body`, binds the given signals, and
    /// evaluates the right-hand side of the module's first assign.
    fn eval_rhs(
        header: &str,
        body: &str,
        bindings: &[(&str, u32, u64)],
    ) -> Result<Bits, SimError> {
        let dir = tempfile::tempdir().unwrap();
        let text = format!("module t({header});\n{body}\nendmodule\n");
        std::fs::write(dir.path().join("t.sv"), text).unwrap();

        let cache = ModuleCache::new();
        let module = cache.resolve("t", dir.path()).unwrap();
        let mut env = SignalEnv::new();
        for (name, width, value) in bindings {
            env.bind(cache.interner().intern(name), Bits::new(*width, *value));
        }

        let assign = module
            .ast
            .items
            .iter()
            .find_map(|item| match item {
                ModuleItem::Assign(a) => Some(a.value.clone()),
                _ => None,
            })
            .expect("module has an assign");

        let ctx = EvalCtx {
            env: &env,
            module: &module,
            interner: cache.interner(),
            mems: None,
        };
        eval_expr(&ctx, &assign)
    }

    #[test]
    fn nand_of_bits() {
        let v = eval_rhs(
            "input a, input b, output y",
            "assign y = ~(a & b);",
            &[("a", 1, 1), ("b", 1, 1)],
        )
        .unwrap();
        assert_eq!(v.value(), 0);
        let v = eval_rhs(
            "input a, input b, output y",
            "assign y = ~(a & b);",
            &[("a", 1, 1), ("b", 1, 0)],
        )
        .unwrap();
        assert_eq!(v.value(), 1);
    }

    #[test]
    fn add_takes_wider_width() {
        let v = eval_rhs(
            "input [7:0] a, input [3:0] b, output [7:0] y",
            "assign y = a + b;",
            &[("a", 8, 250), ("b", 4, 10)],
        )
        .unwrap();
        assert_eq!(v.width(), 8);
        assert_eq!(v.value(), (250 + 10) % 256);
    }

    #[test]
    fn ternary_widens_to_both_branches() {
        let v = eval_rhs(
            "input s, input [3:0] a, input [7:0] b, output [7:0] y",
            "assign y = s ? a : b;",
            &[("s", 1, 1), ("a", 4, 0xF), ("b", 8, 0xAA)],
        )
        .unwrap();
        assert_eq!(v.width(), 8);
        assert_eq!(v.value(), 0xF);
    }

    #[test]
    fn concat_and_replication() {
        let v = eval_rhs(
            "input [3:0] a, output [7:0] y",
            "assign y = {a, 4'b0011};",
            &[("a", 4, 0xA)],
        )
        .unwrap();
        assert_eq!(v.value(), 0xA3);

        let v = eval_rhs("output [3:0] y", "assign y = {4{1'b1}};", &[]).unwrap();
        assert_eq!(v.width(), 4);
        assert_eq!(v.value(), 15);
    }

    #[test]
    fn unsized_literal_in_concat_rejected() {
        let err = eval_rhs("input a, output y", "assign y = {a, 3};", &[("a", 1, 1)])
            .unwrap_err();
        assert!(matches!(err, SimError::WidthMismatch { .. }));
    }

    #[test]
    fn bit_select_boundary() {
        let ok = eval_rhs(
            "input [7:0] a, output y",
            "assign y = a[7];",
            &[("a", 8, 0x80)],
        )
        .unwrap();
        assert_eq!(ok.value(), 1);

        let err = eval_rhs(
            "input [7:0] a, output y",
            "assign y = a[8];",
            &[("a", 8, 0x80)],
        )
        .unwrap_err();
        assert!(matches!(err, SimError::IndexOut { .. }));
    }

    #[test]
    fn undefined_identifier() {
        let err = eval_rhs("input a, output y", "assign y = a & ghost;", &[("a", 1, 1)])
            .unwrap_err();
        match err {
            SimError::UndefinedIdentifier { name, .. } => assert_eq!(name, "ghost"),
            other => panic!("expected undefined identifier, got {other}"),
        }
    }

    #[test]
    fn signed_comparison_with_declared_signed() {
        // -1 < 1 signed, but 255 > 1 unsigned.
        let v = eval_rhs(
            "input signed [7:0] a, input signed [7:0] b, output y",
            "assign y = a < b;",
            &[("a", 8, 0xFF), ("b", 8, 1)],
        )
        .unwrap();
        assert_eq!(v.value(), 1);

        let v = eval_rhs(
            "input [7:0] a, input [7:0] b, output y",
            "assign y = a < b;",
            &[("a", 8, 0xFF), ("b", 8, 1)],
        )
        .unwrap();
        assert_eq!(v.value(), 0);
    }

    #[test]
    fn logical_ops_are_single_bit() {
        let v = eval_rhs(
            "input [3:0] a, input [3:0] b, output y",
            "assign y = a && !b;",
            &[("a", 4, 6), ("b", 4, 0)],
        )
        .unwrap();
        assert_eq!(v.width(), 1);
        assert_eq!(v.value(), 1);
    }

    #[test]
    fn evaluation_is_deterministic() {
        for _ in 0..3 {
            let v = eval_rhs(
                "input [7:0] a, output [7:0] y",
                "assign y = (a * 8'd3) ^ {2{a[3:0]}};",
                &[("a", 8, 0x5C)],
            )
            .unwrap();
            let again = eval_rhs(
                "input [7:0] a, output [7:0] y",
                "assign y = (a * 8'd3) ^ {2{a[3:0]}};",
                &[("a", 8, 0x5C)],
            )
            .unwrap();
            assert_eq!(v, again);
        }
    }

    #[test]
    fn store_bit_range_merges() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("t.sv"),
            "module t(input [7:0] a, output [7:0] y);\nassign y = a;\nendmodule\n",
        )
        .unwrap();
        let cache = ModuleCache::new();
        let module = cache.resolve("t", dir.path()).unwrap();
        let y = cache.interner().intern("y");

        let mut env = SignalEnv::new();
        env.bind(y, Bits::new(8, 0b1111_0000));
        let slot = LvalueSlot::BitRange { name: y, hi: 3, lo: 0 };
        let changed = store_env(
            &mut env,
            &module,
            cache.interner(),
            &slot,
            Bits::new(4, 0b0101),
            Span::NONE,
        )
        .unwrap();
        assert!(changed);
        assert_eq!(env.get(y).unwrap().value(), 0b1111_0101);
    }

    #[test]
    fn store_concat_splits_msb_first() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("t.sv"),
            "module t(input a, output c, output [3:0] s);\nassign s = {4{a}};\nendmodule\n",
        )
        .unwrap();
        let cache = ModuleCache::new();
        let module = cache.resolve("t", dir.path()).unwrap();
        let c = cache.interner().intern("c");
        let s = cache.interner().intern("s");

        let mut env = SignalEnv::new();
        let slot = LvalueSlot::Concat(vec![
            LvalueSlot::Whole(c),
            LvalueSlot::Whole(s),
        ]);
        // {c, s} = 5'b1_0110
        store_env(
            &mut env,
            &module,
            cache.interner(),
            &slot,
            Bits::new(5, 0b1_0110),
            Span::NONE,
        )
        .unwrap();
        assert_eq!(env.get(c).unwrap().value(), 1);
        assert_eq!(env.get(s).unwrap().value(), 0b0110);
    }
}

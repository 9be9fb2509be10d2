//! Pratt expression parser for the subset.
//!
//! Binding powers mirror SystemVerilog precedence:
//!
//! | BP (L,R) | Operators |
//! |----------|-----------|
//! | (1,2)    | `\|\|` |
//! | (3,4)    | `&&` |
//! | (5,6)    | `\|` |
//! | (7,8)    | `^` |
//! | (9,10)   | `&` |
//! | (11,12)  | `==` `!=` |
//! | (13,14)  | `<` `<=` `>` `>=` |
//! | (15,16)  | `<<` `>>` |
//! | (17,18)  | `+` `-` |
//! | (19,20)  | `*` |
//! | prefix 23 | `~` `!` `-` `+` |
//!
//! Ternary `? :` binds loosest and right-associates. `/`, `%`, `**`,
//! arithmetic shifts, and reduction/XNOR operators are recognized and
//! rejected as unsupported.

use crate::ast::*;
use crate::parser::Parser;
use crate::token::Tok;

fn infix_binding_power(op: BinaryOp) -> (u8, u8) {
    match op {
        BinaryOp::LogOr => (1, 2),
        BinaryOp::LogAnd => (3, 4),
        BinaryOp::BitOr => (5, 6),
        BinaryOp::BitXor => (7, 8),
        BinaryOp::BitAnd => (9, 10),
        BinaryOp::Eq | BinaryOp::Ne => (11, 12),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => (13, 14),
        BinaryOp::Shl | BinaryOp::Shr => (15, 16),
        BinaryOp::Add | BinaryOp::Sub => (17, 18),
        BinaryOp::Mul => (19, 20),
    }
}

impl Parser<'_> {
    /// Parses an expression.
    pub fn parse_expr(&mut self) -> Expr {
        self.parse_expr_bp(0)
    }

    pub(crate) fn parse_expr_bp(&mut self, min_bp: u8) -> Expr {
        let lhs = self.parse_prefix_expr();
        self.continue_expr_bp(lhs, min_bp)
    }

    /// Continues Pratt parsing from an already-parsed left-hand side.
    pub(crate) fn continue_expr_bp(&mut self, mut lhs: Expr, min_bp: u8) -> Expr {
        loop {
            if self.at_eof() {
                return lhs;
            }

            // Ternary binds loosest and right-associates.
            if self.at(Tok::Question) && min_bp == 0 {
                self.advance();
                let then_expr = self.parse_expr_bp(0);
                self.expect(Tok::Colon);
                let else_expr = self.parse_expr_bp(0);
                let span = lhs.span().cover(else_expr.span());
                lhs = Expr::Ternary {
                    condition: Box::new(lhs),
                    then_expr: Box::new(then_expr),
                    else_expr: Box::new(else_expr),
                    span,
                };
                continue;
            }

            if self.at(Tok::LBracket) {
                lhs = self.parse_postfix_index(lhs);
                continue;
            }

            if let Some(feature) = unsupported_infix(self.current()) {
                let span = self.current_span();
                self.unsupported(feature, span);
                self.advance();
                let _ = self.parse_expr_bp(21);
                return Expr::Error(span);
            }

            let op = match binary_op(self.current()) {
                Some(op) => op,
                None => return lhs,
            };
            let (l_bp, r_bp) = infix_binding_power(op);
            if l_bp < min_bp {
                return lhs;
            }
            self.advance();

            let rhs = self.parse_expr_bp(r_bp);
            let span = lhs.span().cover(rhs.span());
            lhs = Expr::Binary {
                left: Box::new(lhs),
                op,
                right: Box::new(rhs),
                span,
            };
        }
    }

    fn parse_prefix_expr(&mut self) -> Expr {
        let start = self.current_span();

        let unary = match self.current() {
            Tok::Tilde => Some(UnaryOp::BitNot),
            Tok::Bang => Some(UnaryOp::LogNot),
            Tok::Minus => Some(UnaryOp::Neg),
            _ => None,
        };
        if let Some(op) = unary {
            self.advance();
            let operand = self.parse_expr_bp(23);
            let span = start.cover(operand.span());
            return Expr::Unary {
                op,
                operand: Box::new(operand),
                span,
            };
        }
        // Unary plus is the identity.
        if self.at(Tok::Plus) {
            self.advance();
            return self.parse_expr_bp(23);
        }
        // Reduction operators are outside the subset.
        if matches!(
            self.current(),
            Tok::Amp | Tok::Pipe | Tok::Caret | Tok::TildeAmp | Tok::TildePipe | Tok::TildeCaret
        ) {
            self.unsupported("reduction operators", start);
            self.advance();
            let _ = self.parse_expr_bp(23);
            return Expr::Error(start);
        }

        match self.current() {
            Tok::IntLiteral | Tok::SizedLiteral => self.parse_literal(),
            Tok::LParen => {
                self.advance();
                let inner = self.parse_expr();
                self.expect(Tok::RParen);
                let span = start.cover(self.prev_span());
                Expr::Paren {
                    inner: Box::new(inner),
                    span,
                }
            }
            Tok::LBrace => self.parse_concat_or_repeat(),
            Tok::Identifier => {
                let name = self.expect_ident();
                Expr::Identifier { name, span: start }
            }
            Tok::SystemIdent => {
                self.unsupported("system functions", start);
                self.advance();
                Expr::Error(start)
            }
            _ => {
                self.error("expected expression");
                let span = self.current_span();
                self.advance();
                Expr::Error(span)
            }
        }
    }

    /// Decodes the current literal token into an [`Expr::Literal`].
    fn parse_literal(&mut self) -> Expr {
        let span = self.current_span();
        let text = self.current_text();
        let expr = match decode_literal(text) {
            Ok((width, value)) => Expr::Literal { width, value, span },
            Err(msg) => {
                self.error(&msg);
                Expr::Error(span)
            }
        };
        self.advance();
        expr
    }

    /// Parses `{a, b}` or `{N{a}}` after seeing `{`.
    pub(crate) fn parse_concat_or_repeat(&mut self) -> Expr {
        let start = self.current_span();
        self.expect(Tok::LBrace);

        if self.at(Tok::RBrace) {
            self.error("empty concatenation");
            self.advance();
            return Expr::Error(start);
        }

        let first = self.parse_expr();

        if self.at(Tok::LBrace) {
            // Replication: {count{elem, …}}
            self.advance();
            let mut elements = vec![self.parse_expr()];
            while self.eat(Tok::Comma) {
                elements.push(self.parse_expr());
            }
            self.expect(Tok::RBrace);
            self.expect(Tok::RBrace);
            let span = start.cover(self.prev_span());
            return Expr::Repeat {
                count: Box::new(first),
                elements,
                span,
            };
        }

        let mut elements = vec![first];
        while self.eat(Tok::Comma) {
            elements.push(self.parse_expr());
        }
        self.expect(Tok::RBrace);
        let span = start.cover(self.prev_span());
        Expr::Concat { elements, span }
    }

    /// Parses `[index]` or `[msb:lsb]` after an expression.
    pub(crate) fn parse_postfix_index(&mut self, base: Expr) -> Expr {
        let start = base.span();
        self.expect(Tok::LBracket);

        // Parse the first bound tightly enough to stop before `+`/`-`,
        // so part-selects can be detected and rejected by name.
        let first = self.parse_expr_bp(18);

        if matches!(self.current(), Tok::Plus | Tok::Minus) && self.peek_kind(1) == Tok::Colon {
            let span = self.current_span();
            self.unsupported("part selects (`+:`/`-:`)", span);
            while !self.at_eof() && !self.at(Tok::RBracket) {
                self.advance();
            }
            self.eat(Tok::RBracket);
            return Expr::Error(span);
        }

        let first = self.continue_expr_bp(first, 0);

        if self.eat(Tok::Colon) {
            let lsb = self.parse_expr();
            self.expect(Tok::RBracket);
            let span = start.cover(self.prev_span());
            Expr::RangeSelect {
                base: Box::new(base),
                msb: Box::new(first),
                lsb: Box::new(lsb),
                span,
            }
        } else {
            self.expect(Tok::RBracket);
            let span = start.cover(self.prev_span());
            Expr::Index {
                base: Box::new(base),
                index: Box::new(first),
                span,
            }
        }
    }
}

fn binary_op(tok: Tok) -> Option<BinaryOp> {
    Some(match tok {
        Tok::PipePipe => BinaryOp::LogOr,
        Tok::AmpAmp => BinaryOp::LogAnd,
        Tok::Pipe => BinaryOp::BitOr,
        Tok::Caret => BinaryOp::BitXor,
        Tok::Amp => BinaryOp::BitAnd,
        Tok::EqEq => BinaryOp::Eq,
        Tok::BangEq => BinaryOp::Ne,
        Tok::Lt => BinaryOp::Lt,
        Tok::Le => BinaryOp::Le,
        Tok::Gt => BinaryOp::Gt,
        Tok::Ge => BinaryOp::Ge,
        Tok::Shl => BinaryOp::Shl,
        Tok::Shr => BinaryOp::Shr,
        Tok::Plus => BinaryOp::Add,
        Tok::Minus => BinaryOp::Sub,
        Tok::Star => BinaryOp::Mul,
        _ => return None,
    })
}

fn unsupported_infix(tok: Tok) -> Option<&'static str> {
    Some(match tok {
        Tok::Slash | Tok::Percent => "`/` and `%` operators",
        Tok::StarStar => "the `**` operator",
        Tok::AShl | Tok::AShr => "arithmetic shifts",
        Tok::TildeCaret | Tok::TildeAmp | Tok::TildePipe => "XNOR and reduction operators",
        _ => return None,
    })
}

/// Decodes a literal token's text into `(width, value)`.
///
/// `width` is `None` for unsized decimals. Underscore separators are
/// ignored. Sized literals wider than 64 bits are rejected, and values are
/// masked to the declared width.
pub(crate) fn decode_literal(text: &str) -> Result<(Option<u32>, u64), String> {
    let clean: String = text.chars().filter(|c| *c != '_').collect();

    let Some(tick) = clean.find('\'') else {
        let value = clean
            .parse::<u64>()
            .map_err(|_| format!("integer literal '{text}' does not fit in 64 bits"))?;
        return Ok((None, value));
    };

    let width = if tick == 0 {
        None
    } else {
        let w = clean[..tick]
            .parse::<u32>()
            .map_err(|_| format!("bad width in literal '{text}'"))?;
        if !(1..=64).contains(&w) {
            return Err(format!("literal width {w} out of range 1..=64"));
        }
        Some(w)
    };

    let rest = &clean[tick + 1..];
    let (base, digits) = rest.split_at(1);
    if digits.is_empty() {
        return Err(format!("literal '{text}' has no digits"));
    }
    let radix = match base.chars().next().unwrap().to_ascii_lowercase() {
        'b' => 2,
        'o' => 8,
        'd' => 10,
        'h' => 16,
        other => return Err(format!("unknown literal base '{other}'")),
    };
    let value = u64::from_str_radix(digits, radix)
        .map_err(|_| format!("bad digits in literal '{text}'"))?;

    let masked = match width {
        Some(64) | None => value,
        Some(w) => value & ((1u64 << w) - 1),
    };
    Ok((width, masked))
}

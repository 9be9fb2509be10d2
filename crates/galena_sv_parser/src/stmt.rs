//! Statement parsing for procedural blocks.

use crate::ast::*;
use crate::parser::Parser;
use crate::token::Tok;

impl Parser<'_> {
    /// Parses one statement inside an `always_comb`/`always_ff` body.
    pub(crate) fn parse_statement(&mut self) -> Statement {
        match self.current() {
            Tok::Begin => self.parse_block(),
            Tok::If => self.parse_if(),
            Tok::Case => self.parse_case(),
            Tok::Identifier | Tok::LBrace => self.parse_assignment(),
            // A lone `;` is an empty statement.
            Tok::Semicolon => {
                let span = self.current_span();
                self.advance();
                Statement::Block {
                    stmts: Vec::new(),
                    span,
                }
            }
            Tok::SystemIdent => {
                let span = self.current_span();
                self.unsupported("system tasks", span);
                self.recover_to_semicolon();
                Statement::Error(span)
            }
            tok => {
                let span = self.current_span();
                if let Some(feature) = tok.unsupported_feature() {
                    self.unsupported(feature, span);
                } else {
                    self.error("expected statement");
                }
                self.recover_to_semicolon();
                Statement::Error(span)
            }
        }
    }

    fn parse_block(&mut self) -> Statement {
        let start = self.current_span();
        self.expect(Tok::Begin);
        // Optional label: begin : name
        if self.eat(Tok::Colon) {
            let _ = self.expect_ident();
        }

        let mut stmts = Vec::new();
        while !self.at(Tok::End) && !self.at_eof() {
            stmts.push(self.parse_statement());
        }
        self.expect(Tok::End);
        if self.eat(Tok::Colon) {
            let _ = self.expect_ident();
        }
        let span = start.cover(self.prev_span());
        Statement::Block { stmts, span }
    }

    fn parse_if(&mut self) -> Statement {
        let start = self.current_span();
        self.expect(Tok::If);
        self.expect(Tok::LParen);
        let condition = self.parse_expr();
        self.expect(Tok::RParen);

        let then_stmt = self.parse_statement();
        let else_stmt = if self.eat(Tok::Else) {
            Some(Box::new(self.parse_statement()))
        } else {
            None
        };

        let span = start.cover(self.prev_span());
        Statement::If {
            condition,
            then_stmt: Box::new(then_stmt),
            else_stmt,
            span,
        }
    }

    fn parse_case(&mut self) -> Statement {
        let start = self.current_span();
        self.expect(Tok::Case);
        self.expect(Tok::LParen);
        let subject = self.parse_expr();
        self.expect(Tok::RParen);

        let mut arms = Vec::new();
        while !self.at(Tok::Endcase) && !self.at_eof() {
            arms.push(self.parse_case_arm());
        }
        self.expect(Tok::Endcase);
        let span = start.cover(self.prev_span());
        Statement::Case {
            subject,
            arms,
            span,
        }
    }

    fn parse_case_arm(&mut self) -> CaseArm {
        let start = self.current_span();

        if self.eat(Tok::Default) {
            self.eat(Tok::Colon);
            let body = self.parse_statement();
            let span = start.cover(self.prev_span());
            return CaseArm {
                patterns: Vec::new(),
                is_default: true,
                body,
                span,
            };
        }

        let mut patterns = vec![self.parse_expr()];
        while self.eat(Tok::Comma) {
            patterns.push(self.parse_expr());
        }
        self.expect(Tok::Colon);
        let body = self.parse_statement();
        let span = start.cover(self.prev_span());
        CaseArm {
            patterns,
            is_default: false,
            body,
            span,
        }
    }

    /// Parses `lvalue = expr;` or `lvalue <= expr;`.
    ///
    /// The lvalue is parsed with a restricted grammar (names, selects,
    /// concatenations) so that the `<=` of a non-blocking assignment is
    /// never consumed as a comparison.
    fn parse_assignment(&mut self) -> Statement {
        let start = self.current_span();
        let target = self.parse_lvalue();

        let blocking = if self.eat(Tok::Equals) {
            true
        } else if self.eat(Tok::Le) {
            false
        } else {
            self.expected("'=' or '<='");
            self.recover_to_semicolon();
            return Statement::Error(start);
        };

        let value = self.parse_expr();
        self.expect(Tok::Semicolon);
        let span = start.cover(self.prev_span());

        if blocking {
            Statement::Blocking {
                target,
                value,
                span,
            }
        } else {
            Statement::NonBlocking {
                target,
                value,
                span,
            }
        }
    }

    /// Parses an assignment target: a name with optional bit/range/memory
    /// selects, or a concatenation of such targets.
    pub(crate) fn parse_lvalue(&mut self) -> Expr {
        let start = self.current_span();

        if self.at(Tok::LBrace) {
            self.advance();
            let mut elements = vec![self.parse_lvalue()];
            while self.eat(Tok::Comma) {
                elements.push(self.parse_lvalue());
            }
            self.expect(Tok::RBrace);
            let span = start.cover(self.prev_span());
            return Expr::Concat { elements, span };
        }

        if !self.at(Tok::Identifier) {
            self.expected("assignment target");
            let span = self.current_span();
            self.advance();
            return Expr::Error(span);
        }

        let name = self.expect_ident();
        let mut lv = Expr::Identifier { name, span: start };
        while self.at(Tok::LBracket) {
            lv = self.parse_postfix_index(lv);
        }
        lv
    }
}

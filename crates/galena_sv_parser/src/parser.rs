//! Parser infrastructure and module-header parsing.
//!
//! [`Parser`] owns the token stream and provides the primitive operations
//! (advance, expect, eat, recovery) used by the item, statement, and
//! expression parsers in the sibling modules.

use crate::ast::*;
use crate::token::{Tok, Token};
use galena_common::{Ident, Interner};
use galena_diagnostics::{DiagCode, Diagnostic, DiagnosticSink};
use galena_source::Span;

/// Recursive-descent parser for the simulated subset.
pub struct Parser<'src> {
    pub(crate) tokens: Vec<Token>,
    pub(crate) pos: usize,
    pub(crate) source: &'src str,
    pub(crate) interner: &'src Interner,
    pub(crate) sink: &'src DiagnosticSink,
}

impl<'src> Parser<'src> {
    /// Creates a parser over `tokens`, which must have been lexed from
    /// `source`.
    pub fn new(
        tokens: Vec<Token>,
        source: &'src str,
        interner: &'src Interner,
        sink: &'src DiagnosticSink,
    ) -> Self {
        Self {
            tokens,
            pos: 0,
            source,
            interner,
            sink,
        }
    }

    // ------------------------------------------------------------------
    // Primitives
    // ------------------------------------------------------------------

    pub(crate) fn current(&self) -> Tok {
        self.tokens[self.pos].kind
    }

    pub(crate) fn current_span(&self) -> Span {
        self.tokens[self.pos].span
    }

    pub(crate) fn current_text(&self) -> &'src str {
        let span = self.current_span();
        &self.source[span.start as usize..span.end as usize]
    }

    pub(crate) fn at(&self, kind: Tok) -> bool {
        self.current() == kind
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.current() == Tok::Eof
    }

    pub(crate) fn prev_span(&self) -> Span {
        if self.pos > 0 {
            self.tokens[self.pos - 1].span
        } else {
            self.current_span()
        }
    }

    pub(crate) fn advance(&mut self) {
        if !self.at_eof() {
            self.pos += 1;
        }
    }

    pub(crate) fn eat(&mut self, kind: Tok) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, kind: Tok) {
        if !self.eat(kind) {
            self.expected(&format!("{kind:?}"));
        }
    }

    pub(crate) fn expect_ident(&mut self) -> Ident {
        if self.at(Tok::Identifier) {
            let ident = self.interner.intern(self.current_text());
            self.advance();
            ident
        } else {
            self.expected("identifier");
            self.interner.intern("<missing>")
        }
    }

    pub(crate) fn peek_kind(&self, offset: usize) -> Tok {
        self.tokens
            .get(self.pos + offset)
            .map(|t| t.kind)
            .unwrap_or(Tok::Eof)
    }

    // ------------------------------------------------------------------
    // Errors and recovery
    // ------------------------------------------------------------------

    pub(crate) fn error(&self, msg: &str) {
        self.sink.emit(Diagnostic::error(
            DiagCode::SYNTAX,
            msg,
            self.current_span(),
        ));
    }

    pub(crate) fn expected(&self, what: &str) {
        self.error(&format!("expected {what}, found {:?}", self.current()));
    }

    /// Reports a recognized-but-unsupported construct by name.
    pub(crate) fn unsupported(&self, feature: &str, span: Span) {
        self.sink.emit(Diagnostic::error(
            DiagCode::UNSUPPORTED,
            format!("{feature} are not supported by the simulator"),
            span,
        ));
    }

    /// Skips to just past the next semicolon.
    pub(crate) fn recover_to_semicolon(&mut self) {
        while !self.at_eof() && !self.at(Tok::Semicolon) {
            self.advance();
        }
        self.eat(Tok::Semicolon);
    }

    // ------------------------------------------------------------------
    // Top level
    // ------------------------------------------------------------------

    /// Parses a whole source file: a sequence of module declarations.
    pub fn parse_source_file(&mut self) -> SourceFile {
        let start = self.current_span();
        let mut modules = Vec::new();

        while !self.at_eof() {
            match self.current() {
                Tok::Module => modules.push(self.parse_module()),
                tok => {
                    if let Some(feature) = tok.unsupported_feature() {
                        self.unsupported(feature, self.current_span());
                    } else {
                        self.error("expected 'module'");
                    }
                    self.advance();
                    self.recover_to_module();
                }
            }
        }

        let span = if modules.is_empty() {
            start
        } else {
            start.cover(self.prev_span())
        };
        SourceFile { modules, span }
    }

    fn recover_to_module(&mut self) {
        while !self.at_eof() && !self.at(Tok::Module) {
            self.advance();
        }
    }

    /// Parses one `module … endmodule` declaration.
    fn parse_module(&mut self) -> ModuleDecl {
        let start = self.current_span();
        self.expect(Tok::Module);
        let name = self.expect_ident();

        if self.at(Tok::Hash) {
            self.unsupported("parameters", self.current_span());
            self.skip_balanced_parens_after_hash();
        }

        let (port_style, ports, port_names) = if self.at(Tok::LParen) {
            self.parse_port_list()
        } else {
            (PortStyle::Empty, Vec::new(), Vec::new())
        };

        self.expect(Tok::Semicolon);

        let items = self.parse_module_items();

        self.expect(Tok::Endmodule);
        // Optional end label: endmodule : name
        if self.eat(Tok::Colon) {
            let _ = self.expect_ident();
        }
        let span = start.cover(self.prev_span());

        ModuleDecl {
            name,
            port_style,
            ports,
            port_names,
            items,
            span,
        }
    }

    fn skip_balanced_parens_after_hash(&mut self) {
        self.advance(); // #
        if !self.at(Tok::LParen) {
            return;
        }
        let mut depth = 0usize;
        while !self.at_eof() {
            match self.current() {
                Tok::LParen => depth += 1,
                Tok::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        return;
                    }
                }
                _ => {}
            }
            self.advance();
        }
    }

    // ------------------------------------------------------------------
    // Port lists
    // ------------------------------------------------------------------

    /// Parses the header port list, detecting ANSI vs non-ANSI style.
    fn parse_port_list(&mut self) -> (PortStyle, Vec<PortDecl>, Vec<Ident>) {
        self.expect(Tok::LParen);

        if self.at(Tok::RParen) {
            self.advance();
            return (PortStyle::Empty, Vec::new(), Vec::new());
        }

        let is_ansi = self.current().is_direction() || self.current().is_net_kind();
        if is_ansi {
            let ports = self.parse_ansi_port_list();
            self.expect(Tok::RParen);
            (PortStyle::Ansi, ports, Vec::new())
        } else {
            let names = self.parse_identifier_list();
            self.expect(Tok::RParen);
            (PortStyle::NonAnsi, Vec::new(), names)
        }
    }

    /// Parses ANSI port declarations with direction inheritance
    /// (`input a, b, output y` gives `b` the input direction).
    fn parse_ansi_port_list(&mut self) -> Vec<PortDecl> {
        let mut ports = Vec::new();
        let mut current_dir = Direction::Input;

        loop {
            let start = self.current_span();

            let dir = match self.current() {
                Tok::Input => {
                    self.advance();
                    current_dir = Direction::Input;
                    Direction::Input
                }
                Tok::Output => {
                    self.advance();
                    current_dir = Direction::Output;
                    Direction::Output
                }
                Tok::Inout => {
                    self.unsupported("`inout` ports", self.current_span());
                    self.advance();
                    current_dir
                }
                _ => current_dir,
            };

            // Optional net kind keyword.
            if self.current().is_net_kind() {
                self.advance();
            }
            let signed = self.eat(Tok::Signed);
            let range = if self.at(Tok::LBracket) {
                Some(self.parse_range())
            } else {
                None
            };

            let mut names = vec![self.expect_ident()];
            while self.at(Tok::Comma) {
                // A direction or net-kind keyword after the comma starts a
                // new declaration group.
                let next = self.peek_kind(1);
                if next.is_direction() || next.is_net_kind() {
                    break;
                }
                self.advance();
                names.push(self.expect_ident());
            }

            let span = start.cover(self.prev_span());
            ports.push(PortDecl {
                direction: dir,
                signed,
                range,
                names,
                span,
            });

            if !self.eat(Tok::Comma) {
                break;
            }
        }

        ports
    }

    /// Parses `[ expr : expr ]`.
    pub(crate) fn parse_range(&mut self) -> Range {
        let start = self.current_span();
        self.expect(Tok::LBracket);
        let msb = self.parse_expr();
        self.expect(Tok::Colon);
        let lsb = self.parse_expr();
        self.expect(Tok::RBracket);
        let span = start.cover(self.prev_span());
        Range { msb, lsb, span }
    }

    /// Parses `ident {, ident}`.
    pub(crate) fn parse_identifier_list(&mut self) -> Vec<Ident> {
        let mut names = vec![self.expect_ident()];
        while self.eat(Tok::Comma) {
            names.push(self.expect_ident());
        }
        names
    }
}

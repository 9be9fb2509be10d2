//! Module-item parsing: declarations, assignments, procedures, instances.

use crate::ast::*;
use crate::parser::Parser;
use crate::token::Tok;

impl Parser<'_> {
    /// Parses module items until `endmodule` or end of file.
    pub(crate) fn parse_module_items(&mut self) -> Vec<ModuleItem> {
        let mut items = Vec::new();
        while !self.at(Tok::Endmodule) && !self.at_eof() {
            self.parse_module_item(&mut items);
        }
        items
    }

    fn parse_module_item(&mut self, items: &mut Vec<ModuleItem>) {
        match self.current() {
            Tok::Wire | Tok::Logic | Tok::Reg => {
                if let Some(decl) = self.parse_net_decl() {
                    items.push(ModuleItem::Net(decl));
                }
            }
            Tok::Input | Tok::Output => {
                if let Some(decl) = self.parse_body_port_decl() {
                    items.push(ModuleItem::Port(decl));
                }
            }
            Tok::Inout => {
                self.unsupported("`inout` ports", self.current_span());
                self.recover_to_semicolon();
            }
            Tok::Assign => items.push(ModuleItem::Assign(self.parse_continuous_assign())),
            Tok::AlwaysComb => {
                let start = self.current_span();
                self.advance();
                let body = self.parse_statement();
                let span = start.cover(self.prev_span());
                items.push(ModuleItem::AlwaysComb(AlwaysCombBlock { body, span }));
            }
            Tok::AlwaysFf => {
                if let Some(block) = self.parse_always_ff() {
                    items.push(ModuleItem::AlwaysFf(block));
                }
            }
            Tok::Identifier => {
                let next = self.peek_kind(1);
                if next == Tok::Hash {
                    self.unsupported("parameters", self.current_span());
                    self.recover_to_semicolon();
                } else if next == Tok::Identifier && self.peek_kind(2) == Tok::LParen {
                    self.parse_instantiation(items);
                } else {
                    self.error("expected module item");
                    self.recover_to_semicolon();
                }
            }
            tok => {
                if let Some(feature) = tok.unsupported_feature() {
                    self.unsupported(feature, self.current_span());
                } else {
                    self.error("expected module item");
                }
                self.recover_to_semicolon();
            }
        }
    }

    /// Parses `wire|logic|reg [signed] [range] name {dims} {, name {dims}};`
    fn parse_net_decl(&mut self) -> Option<NetDecl> {
        let start = self.current_span();
        let kind = match self.current() {
            Tok::Wire => NetKind::Wire,
            Tok::Logic => NetKind::Logic,
            Tok::Reg => NetKind::Reg,
            _ => unreachable!("caller checked for a net keyword"),
        };
        self.advance();

        let signed = self.eat(Tok::Signed);
        let range = if self.at(Tok::LBracket) {
            Some(self.parse_range())
        } else {
            None
        };

        let mut names = vec![self.parse_decl_name()?];
        while self.eat(Tok::Comma) {
            names.push(self.parse_decl_name()?);
        }
        self.expect(Tok::Semicolon);
        let span = start.cover(self.prev_span());

        Some(NetDecl {
            kind,
            signed,
            range,
            names,
            span,
        })
    }

    /// Parses one declared name with optional unpacked dimensions.
    fn parse_decl_name(&mut self) -> Option<DeclName> {
        let start = self.current_span();
        let name = self.expect_ident();

        let mut dims = Vec::new();
        while self.at(Tok::LBracket) {
            dims.push(self.parse_range());
        }

        if self.at(Tok::Equals) {
            self.unsupported("declaration initializers", self.current_span());
            self.recover_to_semicolon();
            return None;
        }

        let span = start.cover(self.prev_span());
        Some(DeclName { name, dims, span })
    }

    /// Parses a non-ANSI port declaration in the module body.
    fn parse_body_port_decl(&mut self) -> Option<PortDecl> {
        let start = self.current_span();
        let direction = match self.current() {
            Tok::Input => Direction::Input,
            Tok::Output => Direction::Output,
            _ => unreachable!("caller checked for a direction keyword"),
        };
        self.advance();

        if self.current().is_net_kind() {
            self.advance();
        }
        let signed = self.eat(Tok::Signed);
        let range = if self.at(Tok::LBracket) {
            Some(self.parse_range())
        } else {
            None
        };

        let names = self.parse_identifier_list();
        self.expect(Tok::Semicolon);
        let span = start.cover(self.prev_span());

        Some(PortDecl {
            direction,
            signed,
            range,
            names,
            span,
        })
    }

    /// Parses `assign lvalue = expr;`
    fn parse_continuous_assign(&mut self) -> ContinuousAssign {
        let start = self.current_span();
        self.expect(Tok::Assign);
        let target = self.parse_lvalue();
        self.expect(Tok::Equals);
        let value = self.parse_expr();
        self.expect(Tok::Semicolon);
        let span = start.cover(self.prev_span());
        ContinuousAssign {
            target,
            value,
            span,
        }
    }

    /// Parses `always_ff @(posedge clock) <statement>`.
    ///
    /// Only a single positive-edge clock is in the subset; `negedge`,
    /// `@*`, and multi-signal sensitivity lists are reported by name.
    fn parse_always_ff(&mut self) -> Option<AlwaysFfBlock> {
        let start = self.current_span();
        self.expect(Tok::AlwaysFf);
        self.expect(Tok::At);
        self.expect(Tok::LParen);

        if self.at(Tok::Negedge) {
            self.unsupported("negative-edge clocking", self.current_span());
            self.recover_always_ff_header();
            let _ = self.parse_statement();
            return None;
        }
        if self.at(Tok::Star) {
            self.unsupported("`@(*)` sensitivity on `always_ff`", self.current_span());
            self.recover_always_ff_header();
            let _ = self.parse_statement();
            return None;
        }
        self.expect(Tok::Posedge);
        let clock = self.expect_ident();

        if self.at(Tok::Or) || self.at(Tok::Comma) {
            self.unsupported(
                "multi-signal sensitivity lists",
                self.current_span(),
            );
            self.recover_always_ff_header();
            let _ = self.parse_statement();
            return None;
        }
        self.expect(Tok::RParen);

        let body = self.parse_statement();
        let span = start.cover(self.prev_span());
        Some(AlwaysFfBlock { clock, body, span })
    }

    fn recover_always_ff_header(&mut self) {
        while !self.at_eof() && !self.at(Tok::RParen) {
            self.advance();
        }
        self.eat(Tok::RParen);
    }

    /// Parses `Type label (connections) {, label (connections)};`
    ///
    /// Each label becomes its own [`ModuleItem::Instance`].
    fn parse_instantiation(&mut self, items: &mut Vec<ModuleItem>) {
        let start = self.current_span();
        let module_name = self.expect_ident();

        loop {
            let inst_start = self.current_span();
            let instance_name = self.expect_ident();
            let connections = self.parse_connection_list();
            let span = start.cover(inst_start).cover(self.prev_span());
            items.push(ModuleItem::Instance(Instantiation {
                module_name,
                instance_name,
                connections,
                span,
            }));
            if !self.eat(Tok::Comma) {
                break;
            }
        }
        self.expect(Tok::Semicolon);
    }

    /// Parses `( .port(expr), … )` or `( expr, … )`.
    ///
    /// Named and positional connections cannot be mixed; the first token
    /// decides the style.
    fn parse_connection_list(&mut self) -> Vec<Connection> {
        self.expect(Tok::LParen);
        let mut connections = Vec::new();

        if self.at(Tok::RParen) {
            self.advance();
            return connections;
        }

        let named = self.at(Tok::Dot);
        loop {
            let start = self.current_span();
            if named {
                self.expect(Tok::Dot);
                let formal = self.expect_ident();
                self.expect(Tok::LParen);
                let actual = self.parse_expr();
                self.expect(Tok::RParen);
                let span = start.cover(self.prev_span());
                connections.push(Connection {
                    formal: Some(formal),
                    actual,
                    span,
                });
            } else {
                let actual = self.parse_expr();
                let span = start.cover(self.prev_span());
                connections.push(Connection {
                    formal: None,
                    actual,
                    span,
                });
            }
            if !self.eat(Tok::Comma) {
                break;
            }
        }
        self.expect(Tok::RParen);
        connections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer;
    use crate::Parser;
    use galena_common::Interner;
    use galena_diagnostics::{DiagCode, Diagnostic, DiagnosticSink};
    use galena_source::FileId;

    fn parse(source: &str) -> (SourceFile, Vec<Diagnostic>) {
        let interner = Interner::new();
        let sink = DiagnosticSink::new();
        let tokens = lexer::lex(source, FileId::from_raw(0), &sink);
        let mut parser = Parser::new(tokens, source, &interner, &sink);
        let ast = parser.parse_source_file();
        (ast, sink.drain())
    }

    fn items_of(source: &str) -> Vec<ModuleItem> {
        let (ast, diags) = parse(source);
        assert!(
            diags.is_empty(),
            "unexpected diagnostics: {:?}",
            diags.iter().map(|d| &d.message).collect::<Vec<_>>()
        );
        ast.modules.into_iter().next().unwrap().items
    }

    #[test]
    fn wire_declarations() {
        let items = items_of("module m; wire a, b; wire [3:0] bus; endmodule");
        assert_eq!(items.len(), 2);
        match &items[0] {
            ModuleItem::Net(d) => {
                assert_eq!(d.kind, NetKind::Wire);
                assert_eq!(d.names.len(), 2);
                assert!(d.range.is_none());
            }
            other => panic!("expected net, got {other:?}"),
        }
        match &items[1] {
            ModuleItem::Net(d) => assert!(d.range.is_some()),
            other => panic!("expected net, got {other:?}"),
        }
    }

    #[test]
    fn memory_declaration() {
        let items = items_of("module m; reg [7:0] mem [255:0]; endmodule");
        match &items[0] {
            ModuleItem::Net(d) => {
                assert_eq!(d.kind, NetKind::Reg);
                assert!(d.range.is_some());
                assert_eq!(d.names[0].dims.len(), 1);
            }
            other => panic!("expected net, got {other:?}"),
        }
    }

    #[test]
    fn signed_logic() {
        let items = items_of("module m; logic signed [7:0] acc; endmodule");
        match &items[0] {
            ModuleItem::Net(d) => {
                assert_eq!(d.kind, NetKind::Logic);
                assert!(d.signed);
            }
            other => panic!("expected net, got {other:?}"),
        }
    }

    #[test]
    fn continuous_assign() {
        let items = items_of("module m; assign outY = ~(inA & inB); endmodule");
        assert!(matches!(items[0], ModuleItem::Assign(_)));
    }

    #[test]
    fn assign_to_slice_and_concat() {
        let items = items_of(
            "module m;
                assign out[7:4] = hi;
                assign {c, s} = a + b;
            endmodule",
        );
        match &items[0] {
            ModuleItem::Assign(a) => assert!(matches!(a.target, Expr::RangeSelect { .. })),
            other => panic!("expected assign, got {other:?}"),
        }
        match &items[1] {
            ModuleItem::Assign(a) => assert!(matches!(a.target, Expr::Concat { .. })),
            other => panic!("expected assign, got {other:?}"),
        }
    }

    #[test]
    fn always_comb_block() {
        let items = items_of(
            "module m;
                always_comb begin
                    y = a & b;
                end
            endmodule",
        );
        assert!(matches!(items[0], ModuleItem::AlwaysComb(_)));
    }

    #[test]
    fn always_ff_posedge() {
        let items = items_of(
            "module m;
                always_ff @(posedge clk) begin
                    q <= d;
                end
            endmodule",
        );
        match &items[0] {
            ModuleItem::AlwaysFf(ff) => {
                // The clock name round-trips through the interner; just
                // check the body parsed.
                assert!(matches!(ff.body, Statement::Block { .. }));
            }
            other => panic!("expected always_ff, got {other:?}"),
        }
    }

    #[test]
    fn named_instantiation() {
        let items = items_of(
            "module m;
                half_adder ha1 (.a(x), .b(y), .sum(s), .carry(c));
            endmodule",
        );
        match &items[0] {
            ModuleItem::Instance(inst) => {
                assert_eq!(inst.connections.len(), 4);
                assert!(inst.connections.iter().all(|c| c.formal.is_some()));
            }
            other => panic!("expected instance, got {other:?}"),
        }
    }

    #[test]
    fn positional_instantiation() {
        let items = items_of("module m; nand_gate g1 (a, b, y); endmodule");
        match &items[0] {
            ModuleItem::Instance(inst) => {
                assert_eq!(inst.connections.len(), 3);
                assert!(inst.connections.iter().all(|c| c.formal.is_none()));
            }
            other => panic!("expected instance, got {other:?}"),
        }
    }

    #[test]
    fn multiple_instances_one_statement() {
        let items = items_of("module m; inv u1 (a, x), u2 (b, y); endmodule");
        assert_eq!(items.len(), 2);
        assert!(matches!(items[0], ModuleItem::Instance(_)));
        assert!(matches!(items[1], ModuleItem::Instance(_)));
    }

    #[test]
    fn connection_exprs_may_slice() {
        let items = items_of("module m; full_adder fa (.a(A[0]), .b(B[3:0]), .s(S)); endmodule");
        match &items[0] {
            ModuleItem::Instance(inst) => {
                assert!(matches!(inst.connections[0].actual, Expr::Index { .. }));
                assert!(matches!(
                    inst.connections[1].actual,
                    Expr::RangeSelect { .. }
                ));
            }
            other => panic!("expected instance, got {other:?}"),
        }
    }

    #[test]
    fn negedge_rejected() {
        let (_, diags) = parse(
            "module m; always_ff @(negedge clk) begin q <= d; end endmodule",
        );
        assert!(diags
            .iter()
            .any(|d| d.code == DiagCode::UNSUPPORTED && d.message.contains("negative-edge")));
    }

    #[test]
    fn multi_signal_sensitivity_rejected() {
        let (_, diags) = parse(
            "module m; always_ff @(posedge clk or posedge rst) begin q <= d; end endmodule",
        );
        assert!(diags
            .iter()
            .any(|d| d.message.contains("multi-signal sensitivity")));
    }

    #[test]
    fn initial_block_rejected() {
        let (_, diags) = parse("module m; initial begin end endmodule");
        assert!(diags
            .iter()
            .any(|d| d.code == DiagCode::UNSUPPORTED && d.message.contains("`initial`")));
    }

    #[test]
    fn generate_rejected() {
        let (_, diags) = parse("module m; generate endgenerate endmodule");
        assert!(diags
            .iter()
            .any(|d| d.message.contains("`generate` constructs")));
    }

    #[test]
    fn typedef_rejected() {
        let (_, diags) = parse("module m; typedef logic [7:0] byte_t; endmodule");
        assert!(diags.iter().any(|d| d.message.contains("`typedef`")));
    }

    #[test]
    fn parameter_override_rejected() {
        let (_, diags) = parse("module m; adder #(8) a1 (x, y, z); endmodule");
        assert!(diags
            .iter()
            .any(|d| d.code == DiagCode::UNSUPPORTED && d.message.contains("parameters")));
    }

    #[test]
    fn initializer_rejected() {
        let (_, diags) = parse("module m; reg [3:0] q = 4'd5; endmodule");
        assert!(diags
            .iter()
            .any(|d| d.message.contains("declaration initializers")));
    }

    #[test]
    fn full_round_trip_module() {
        let items = items_of(
            "module full_adder(input A, input B, input Cin,
                               output Sum, output Cout);
                wire s1, c1, c2;
                half_adder ha1 (.a(A), .b(B), .sum(s1), .carry(c1));
                half_adder ha2 (.a(s1), .b(Cin), .sum(Sum), .carry(c2));
                assign Cout = c1 | c2;
            endmodule",
        );
        assert_eq!(items.len(), 4);
    }
}

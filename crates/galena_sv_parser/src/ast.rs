//! AST for the simulated subset.
//!
//! Every node carries a [`Span`]. Statements and expressions have `Error`
//! variants produced during error recovery; module items do not: an item
//! that fails to parse is reported and dropped, and the sink's error count
//! marks the file as unusable.

use galena_common::Ident;
use galena_source::Span;
use serde::{Deserialize, Serialize};

/// A parsed source file: one or more module declarations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    /// The modules declared in the file, in order.
    pub modules: Vec<ModuleDecl>,
    /// Span covering the whole file.
    pub span: Span,
}

/// A module declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleDecl {
    /// The module name.
    pub name: Ident,
    /// Whether ports were declared in the header (ANSI) or the body.
    pub port_style: PortStyle,
    /// ANSI-style port declarations from the header.
    pub ports: Vec<PortDecl>,
    /// Non-ANSI port names listed in the header, in declaration order.
    pub port_names: Vec<Ident>,
    /// Body items.
    pub items: Vec<ModuleItem>,
    /// Source span.
    pub span: Span,
}

/// How the module's ports were declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortStyle {
    /// `module m(input a, output [3:0] y);`
    Ansi,
    /// `module m(a, y); input a; output [3:0] y;`
    NonAnsi,
    /// `module m;` or `module m();`
    Empty,
}

/// A port declaration, from the header (ANSI) or the body (non-ANSI).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortDecl {
    /// Input or output. `inout` is rejected before construction.
    pub direction: Direction,
    /// Whether the port is declared `signed`.
    pub signed: bool,
    /// Optional `[msb:lsb]` range; absent means scalar.
    pub range: Option<Range>,
    /// One or more names sharing this declaration.
    pub names: Vec<Ident>,
    /// Source span.
    pub span: Span,
}

/// Port direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// `input`
    Input,
    /// `output`
    Output,
}

/// A `[msb:lsb]` range. Bounds are expressions syntactically, but the
/// subset has no parameters, so the resolver constant-folds them to
/// integers during width inference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Range {
    /// The most-significant-bit bound.
    pub msb: Expr,
    /// The least-significant-bit bound.
    pub lsb: Expr,
    /// Source span.
    pub span: Span,
}

/// An item in a module body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ModuleItem {
    /// A net or variable declaration (`wire`, `logic`, `reg`), possibly
    /// with array dimensions (a memory).
    Net(NetDecl),
    /// A non-ANSI port declaration in the body.
    Port(PortDecl),
    /// A continuous assignment.
    Assign(ContinuousAssign),
    /// An `always_comb` procedure.
    AlwaysComb(AlwaysCombBlock),
    /// An `always_ff` procedure.
    AlwaysFf(AlwaysFfBlock),
    /// A child module instantiation.
    Instance(Instantiation),
}

/// The declared kind of a net or variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetKind {
    /// `wire`
    Wire,
    /// `logic`
    Logic,
    /// `reg`
    Reg,
}

/// A net/variable declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetDecl {
    /// The declaring keyword.
    pub kind: NetKind,
    /// Whether declared `signed`.
    pub signed: bool,
    /// Optional element range `[msb:lsb]`.
    pub range: Option<Range>,
    /// Declared names, each with optional memory dimensions.
    pub names: Vec<DeclName>,
    /// Source span.
    pub span: Span,
}

/// One declared name, with optional unpacked dimensions
/// (`reg [7:0] mem [255:0]` has one dimension).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeclName {
    /// The name.
    pub name: Ident,
    /// Unpacked array dimensions; one entry per `[hi:lo]` suffix.
    pub dims: Vec<Range>,
    /// Source span.
    pub span: Span,
}

/// `assign lvalue = expr;`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContinuousAssign {
    /// The driven lvalue (whole signal, bit, range, or concatenation).
    pub target: Expr,
    /// The driving expression.
    pub value: Expr,
    /// Source span.
    pub span: Span,
}

/// `always_comb <statement>`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlwaysCombBlock {
    /// The body, usually a `begin … end` block.
    pub body: Statement,
    /// Source span.
    pub span: Span,
}

/// `always_ff @(posedge clock) <statement>`; only single positive-edge
/// clocking is in the subset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlwaysFfBlock {
    /// The clock signal name.
    pub clock: Ident,
    /// The body.
    pub body: Statement,
    /// Source span.
    pub span: Span,
}

/// `Type label ( .port(expr), … );` or `Type label ( e1, e2, … );`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instantiation {
    /// The child module's type name.
    pub module_name: Ident,
    /// The instance label.
    pub instance_name: Ident,
    /// Port connections, named or positional.
    pub connections: Vec<Connection>,
    /// Source span.
    pub span: Span,
}

/// One port connection in an instantiation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    /// The formal port name for `.port(expr)` form; `None` when positional.
    pub formal: Option<Ident>,
    /// The connected expression.
    pub actual: Expr,
    /// Source span.
    pub span: Span,
}

/// A statement inside a procedural block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Statement {
    /// Blocking assignment `lvalue = expr;`
    Blocking {
        /// The assigned lvalue.
        target: Expr,
        /// The assigned value.
        value: Expr,
        /// Source span.
        span: Span,
    },
    /// Non-blocking assignment `lvalue <= expr;`
    NonBlocking {
        /// The assigned lvalue.
        target: Expr,
        /// The assigned value.
        value: Expr,
        /// Source span.
        span: Span,
    },
    /// `begin … end`
    Block {
        /// The statements in order.
        stmts: Vec<Statement>,
        /// Source span.
        span: Span,
    },
    /// `if (cond) … else …`
    If {
        /// The guard.
        condition: Expr,
        /// Taken when the guard is truthy.
        then_stmt: Box<Statement>,
        /// Taken otherwise, if present.
        else_stmt: Option<Box<Statement>>,
        /// Source span.
        span: Span,
    },
    /// `case (expr) … endcase`
    Case {
        /// The selector.
        subject: Expr,
        /// Arms in source order; `default` matches anything.
        arms: Vec<CaseArm>,
        /// Source span.
        span: Span,
    },
    /// Error-recovery placeholder.
    Error(Span),
}

/// One arm of a `case` statement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseArm {
    /// Match values; empty for `default`.
    pub patterns: Vec<Expr>,
    /// Whether this is the `default` arm.
    pub is_default: bool,
    /// The arm body.
    pub body: Statement,
    /// Source span.
    pub span: Span,
}

/// An expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expr {
    /// A numeric literal. `width` is `None` for unsized decimals, which
    /// default to 32 bits and narrow to the assignment context.
    Literal {
        /// Declared width, if the literal was sized.
        width: Option<u32>,
        /// The decoded value.
        value: u64,
        /// Source span.
        span: Span,
    },
    /// A signal reference.
    Identifier {
        /// The referenced name.
        name: Ident,
        /// Source span.
        span: Span,
    },
    /// A unary operation.
    Unary {
        /// The operator.
        op: UnaryOp,
        /// The operand.
        operand: Box<Expr>,
        /// Source span.
        span: Span,
    },
    /// A binary operation.
    Binary {
        /// Left operand.
        left: Box<Expr>,
        /// The operator.
        op: BinaryOp,
        /// Right operand.
        right: Box<Expr>,
        /// Source span.
        span: Span,
    },
    /// `cond ? then : else`
    Ternary {
        /// The guard.
        condition: Box<Expr>,
        /// Value when truthy.
        then_expr: Box<Expr>,
        /// Value when falsy.
        else_expr: Box<Expr>,
        /// Source span.
        span: Span,
    },
    /// `{a, b, …}`: first element in the high bits.
    Concat {
        /// The concatenated elements, MSB first.
        elements: Vec<Expr>,
        /// Source span.
        span: Span,
    },
    /// `{N{a, …}}`
    Repeat {
        /// The replication count (must fold to a constant).
        count: Box<Expr>,
        /// The replicated elements.
        elements: Vec<Expr>,
        /// Source span.
        span: Span,
    },
    /// `base[index]`: bit select, or memory read when `base` names a
    /// memory array.
    Index {
        /// The indexed expression.
        base: Box<Expr>,
        /// The index expression.
        index: Box<Expr>,
        /// Source span.
        span: Span,
    },
    /// `base[msb:lsb]`
    RangeSelect {
        /// The sliced expression.
        base: Box<Expr>,
        /// High bound.
        msb: Box<Expr>,
        /// Low bound.
        lsb: Box<Expr>,
        /// Source span.
        span: Span,
    },
    /// A parenthesized expression.
    Paren {
        /// The inner expression.
        inner: Box<Expr>,
        /// Source span.
        span: Span,
    },
    /// Error-recovery placeholder.
    Error(Span),
}

impl Expr {
    /// The span of this expression.
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal { span, .. }
            | Expr::Identifier { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Ternary { span, .. }
            | Expr::Concat { span, .. }
            | Expr::Repeat { span, .. }
            | Expr::Index { span, .. }
            | Expr::RangeSelect { span, .. }
            | Expr::Paren { span, .. } => *span,
            Expr::Error(span) => *span,
        }
    }
}

/// Unary operators in the subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    /// `~`: bitwise complement.
    BitNot,
    /// `!`: logical negation, single-bit result.
    LogNot,
    /// `-`: arithmetic negation, wraps at the operand width.
    Neg,
}

/// Binary operators in the subset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    /// `&`
    BitAnd,
    /// `|`
    BitOr,
    /// `^`
    BitXor,
    /// `&&`
    LogAnd,
    /// `||`
    LogOr,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
}

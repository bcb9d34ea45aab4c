//! Statement AST nodes.

use crate::common::Span;
use crate::decl::LocalId;
use crate::expr::ExprId;

/// Reference to a statement in the translation unit's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StmtId(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

/// The init clause of a `for` statement.
#[derive(Debug, Clone, PartialEq)]
pub enum ForInit {
    /// `for (int i = 0; ...)` — one `Decl` statement per declarator,
    /// scoped to the loop.
    Decls(Vec<StmtId>),
    Expr(ExprId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// `{ ... }` — owns a scope; local declarations inside it end their
    /// visibility when the block ends.
    Compound(Vec<StmtId>),
    /// Declaration-as-statement. Multi-declarator declarations produce one
    /// of these per declarator. The initializer, if any, runs at the point
    /// of declaration.
    Decl {
        local: LocalId,
        init: Option<ExprId>,
    },
    Expr(ExprId),
    /// `;` with no expression.
    Empty,
    If {
        cond: ExprId,
        then_stmt: StmtId,
        else_stmt: Option<StmtId>,
    },
    While {
        cond: ExprId,
        body: StmtId,
    },
    DoWhile {
        body: StmtId,
        cond: ExprId,
    },
    For {
        init: Option<ForInit>,
        cond: Option<ExprId>,
        step: Option<ExprId>,
        body: StmtId,
    },
    Break,
    Continue,
    Return(Option<ExprId>),
    /// `name: stmt`.
    Labeled { name: String, stmt: StmtId },
}

//! Declarations: functions, locals, and the translation unit.

use crate::common::Span;
use crate::expr::{Expr, ExprId};
use crate::stmt::{Stmt, StmtId};
use crate::types::{TypeId, TypeTable};

/// Reference to a function in the translation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncId(pub u32);

/// Reference to an addressable object within one function: a parameter, a
/// local variable, or a compound-literal temporary. The IR emitter turns
/// each of these into one stack slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalId(pub u32);

/// An addressable object in a function.
#[derive(Debug, Clone, PartialEq)]
pub struct Local {
    pub name: String,
    pub ty: TypeId,
    pub span: Span,
    pub is_param: bool,
}

/// A function declaration, possibly with a definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub ret: TypeId,
    /// Declared parameter types, known from the first declaration on.
    pub param_types: Vec<TypeId>,
    /// Parameter locals, in declaration order. Always a prefix of
    /// `locals`; empty until the function is defined.
    pub params: Vec<LocalId>,
    /// All addressable objects of the function, parameters first.
    pub locals: Vec<Local>,
    /// `None` for a forward declaration that never got a definition.
    pub body: Option<StmtId>,
    pub span: Span,
}

impl Function {
    pub fn local(&self, id: LocalId) -> &Local {
        &self.locals[id.0 as usize]
    }

    pub fn is_defined(&self) -> bool {
        self.body.is_some()
    }
}

/// A fully analyzed translation unit: the arenas plus the type table.
#[derive(Debug)]
pub struct TranslationUnit {
    pub types: TypeTable,
    pub exprs: Vec<Expr>,
    pub stmts: Vec<Stmt>,
    pub functions: Vec<Function>,
}

impl TranslationUnit {
    pub fn new() -> Self {
        Self {
            types: TypeTable::new(),
            exprs: Vec::new(),
            stmts: Vec::new(),
            functions: Vec::new(),
        }
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.0 as usize]
    }

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.0 as usize]
    }

    pub fn function(&self, id: FuncId) -> &Function {
        &self.functions[id.0 as usize]
    }

    pub fn add_expr(&mut self, expr: Expr) -> ExprId {
        let id = ExprId(self.exprs.len() as u32);
        self.exprs.push(expr);
        id
    }

    pub fn add_stmt(&mut self, stmt: Stmt) -> StmtId {
        let id = StmtId(self.stmts.len() as u32);
        self.stmts.push(stmt);
        id
    }
}

impl Default for TranslationUnit {
    fn default() -> Self {
        Self::new()
    }
}

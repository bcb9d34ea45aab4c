//! ecc AST — typed abstract syntax tree and C type table.
//!
//! This crate defines the data the rest of the compiler operates on:
//! spans, C types (interned into a `TypeTable`), expressions, statements,
//! and declarations. It contains NO logic beyond construction and lookup —
//! purely data structures. Every other compiler crate depends on this one.
//!
//! Nodes are arena-allocated: expressions and statements live in `Vec`s on
//! the translation unit and reference each other by `u32` ids. Parent links
//! are ids, never references, so the whole tree is plain owned data.

pub mod common;
pub mod decl;
pub mod expr;
pub mod stmt;
pub mod types;

pub use common::Span;
pub use decl::{Function, FuncId, Local, LocalId, TranslationUnit};
pub use expr::{Expr, ExprId, ExprKind, ValueCategory};
pub use stmt::{Stmt, StmtId, StmtKind};
pub use types::{ArrayExtent, CType, StructDef, StructField, StructId, TypeId, TypeTable};

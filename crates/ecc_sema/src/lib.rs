//! ecc semantic analysis — parse tree to typed AST.
//!
//! Walks the concrete parse tree, resolves names through the scope stack,
//! types every expression (applying the C99 promotion and conversion
//! rules), discriminates lvalues from rvalues, and produces the arena
//! `TranslationUnit` the IR emitter consumes.
//!
//! Constructs the grammar accepts but the compiler does not support
//! (`switch`, pointers taken with `&`, `sizeof`, varargs, globals, ...)
//! are rejected here with `UnsupportedConstruct`; everything that gets
//! past this pass is emittable.

mod constants;
mod expr;
mod lower;
mod scope;

#[cfg(test)]
mod tests;

use ecc_ast::{Span, TranslationUnit};
use ecc_parser::Parse;

pub use scope::{Binding, Scopes};

/// Kinds of semantic errors (the front-end portion of the compile error
/// taxonomy).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemaErrorKind {
    UndeclaredIdentifier,
    Redeclaration,
    TypeMismatch,
    NotAnLvalue,
    BreakOutsideLoop,
    ContinueOutsideLoop,
    ReturnTypeMismatch,
    UnsupportedConstruct,
}

#[derive(Debug, Clone)]
pub struct SemaError {
    pub kind: SemaErrorKind,
    pub span: Span,
    pub message: String,
}

impl SemaError {
    pub fn new(kind: SemaErrorKind, span: Span, message: impl Into<String>) -> Self {
        Self {
            kind,
            span,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}..{}] {}", self.span.start, self.span.end, self.message)
    }
}

/// Analyze a parsed translation unit. All errors are collected; the typed
/// AST is returned only when there are none.
pub fn analyze(parse: &Parse) -> Result<TranslationUnit, Vec<SemaError>> {
    lower::Sema::new(parse).run()
}

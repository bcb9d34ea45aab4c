//! The compile-call error surface.
//!
//! Every stage's errors map into one taxonomy; a compile either returns
//! a usable library handle or a non-empty list of these.

use ecc_ast::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileErrorKind {
    LexError,
    SyntaxError,
    UndeclaredIdentifier,
    Redeclaration,
    TypeMismatch,
    NotAnLvalue,
    BreakOutsideLoop,
    ContinueOutsideLoop,
    ReturnTypeMismatch,
    UnsupportedConstruct,
    UnsupportedOperation,
    BackendError,
}

#[derive(Debug, Clone)]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub span: Span,
    pub message: String,
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}..{}] {:?}: {}",
            self.span.start, self.span.end, self.kind, self.message
        )
    }
}

impl From<ecc_parser::ParseError> for CompileError {
    fn from(e: ecc_parser::ParseError) -> Self {
        CompileError {
            kind: match e.kind {
                ecc_parser::ParseErrorKind::LexError => CompileErrorKind::LexError,
                ecc_parser::ParseErrorKind::SyntaxError => CompileErrorKind::SyntaxError,
            },
            span: Span::new(e.span.start, e.span.end),
            message: e.message,
        }
    }
}

impl From<ecc_sema::SemaError> for CompileError {
    fn from(e: ecc_sema::SemaError) -> Self {
        use ecc_sema::SemaErrorKind as S;
        CompileError {
            kind: match e.kind {
                S::UndeclaredIdentifier => CompileErrorKind::UndeclaredIdentifier,
                S::Redeclaration => CompileErrorKind::Redeclaration,
                S::TypeMismatch => CompileErrorKind::TypeMismatch,
                S::NotAnLvalue => CompileErrorKind::NotAnLvalue,
                S::BreakOutsideLoop => CompileErrorKind::BreakOutsideLoop,
                S::ContinueOutsideLoop => CompileErrorKind::ContinueOutsideLoop,
                S::ReturnTypeMismatch => CompileErrorKind::ReturnTypeMismatch,
                S::UnsupportedConstruct => CompileErrorKind::UnsupportedConstruct,
            },
            span: e.span,
            message: e.message,
        }
    }
}

impl From<ecc_ir::EmitError> for CompileError {
    fn from(e: ecc_ir::EmitError) -> Self {
        CompileError {
            kind: CompileErrorKind::UnsupportedOperation,
            span: e.span,
            message: e.message,
        }
    }
}

impl From<ecc_jit::BackendError> for CompileError {
    fn from(e: ecc_jit::BackendError) -> Self {
        CompileError {
            kind: CompileErrorKind::BackendError,
            span: Span::dummy(),
            message: e.message,
        }
    }
}

//! ecc IR — snippet library and LLVM textual IR emission.
//!
//! Takes the typed AST and produces one self-contained IR module per
//! compile: the user's functions, `declare`s for referenced externals,
//! and every pre-generated snippet the functions call, spliced in exactly
//! once. The module is plain text; nothing here talks to LLVM, which
//! keeps the emitter testable without a back-end.

pub mod emit;
pub mod func;
pub mod snippets;

#[cfg(test)]
mod tests;

pub use emit::{emit_module, float_literal, llvm_type_of, EmitError};
pub use func::FuncBuilder;
pub use snippets::{snippet_symbol, Snippet, SnippetRegistry};

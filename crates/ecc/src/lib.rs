//! ecc — an embedded C99 JIT compiler.
//!
//! Compiles a fragment of C99 source text to LLVM IR, JITs it in
//! process, and exposes every defined function as a dynamically invocable
//! value:
//!
//! ```no_run
//! let lib = ecc::compile("float f2pow2(int a) { return 2.0f * (a * a); }").unwrap();
//! let result = lib.call("f2pow2", &[ecc::Value::Int(2)]).unwrap();
//! assert_eq!(result, ecc::Value::Float(8.0));
//! ```
//!
//! The pipeline: grammar-table Earley parse → typed AST with scoped name
//! resolution and C99 conversions → textual IR built on a pre-generated
//! snippet catalogue → MCJIT. A compile either returns a usable library
//! handle or a non-empty list of errors; nothing partial survives.

mod error;

pub use ecc_jit::{CallError, Library, Value};
pub use error::{CompileError, CompileErrorKind};

/// Run the front end only: source text to a verified-shape IR module
/// (user functions, external declares, referenced snippets). Useful for
/// inspecting the emitted IR without a back-end in the loop.
pub fn generate_ir(source: &str) -> Result<String, Vec<CompileError>> {
    let parse = ecc_parser::parse(source).map_err(|e| vec![CompileError::from(e)])?;
    let tu = ecc_sema::analyze(&parse)
        .map_err(|errors| errors.into_iter().map(CompileError::from).collect::<Vec<_>>())?;
    ecc_ir::emit_module(&tu).map_err(|e| vec![CompileError::from(e)])
}

/// Compile a translation unit and hand back a library of callable
/// functions.
pub fn compile(source: &str) -> Result<Library, Vec<CompileError>> {
    let parse = ecc_parser::parse(source).map_err(|e| vec![CompileError::from(e)])?;
    let tu = ecc_sema::analyze(&parse)
        .map_err(|errors| errors.into_iter().map(CompileError::from).collect::<Vec<_>>())?;
    let mut ir = ecc_ir::emit_module(&tu).map_err(|e| vec![CompileError::from(e)])?;

    // The host-call thunks ride along in the same module.
    ir.push('\n');
    ir.push_str(&ecc_jit::thunk_module_text(&tu));

    let engine = ecc_jit::JitEngine::compile(&ir).map_err(|e| vec![CompileError::from(e)])?;
    Library::bind(&tu, engine).map_err(|e| vec![CompileError::from(e)])
}

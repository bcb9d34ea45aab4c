//! The execution engine: IR text in, native function addresses out.

use inkwell::context::Context;
use inkwell::execution_engine::ExecutionEngine;
use inkwell::memory_buffer::MemoryBuffer;
use inkwell::module::Module;
use inkwell::passes::PassBuilderOptions;
use inkwell::targets::{CodeModel, InitializationConfig, RelocMode, Target, TargetMachine};
use inkwell::OptimizationLevel;

/// The back-end refused the module or a lookup.
#[derive(Debug, Clone)]
pub struct BackendError {
    pub message: String,
}

impl BackendError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "backend: {}", self.message)
    }
}

/// An MCJIT execution engine holding one compiled module.
///
/// The engine and module borrow the context; the context is boxed so its
/// address is stable, and the borrows are extended to `'static` on that
/// basis. Field order keeps the drops sound: engine and module go before
/// the context they borrow.
#[derive(Debug)]
pub struct JitEngine {
    engine: ExecutionEngine<'static>,
    _module: Module<'static>,
    ir_optimized: String,
    _context: Box<Context>,
}

impl JitEngine {
    /// Parse, verify, optimize, and JIT-compile a textual IR module.
    pub fn compile(ir: &str) -> Result<JitEngine, BackendError> {
        Target::initialize_native(&InitializationConfig::default())
            .map_err(BackendError::new)?;

        let context = Box::new(Context::create());
        // SAFETY: the context lives in a stable heap allocation owned by
        // the returned JitEngine, and every borrower is dropped first.
        let ctx: &'static Context =
            unsafe { std::mem::transmute::<&Context, &'static Context>(context.as_ref()) };

        let buffer = MemoryBuffer::create_from_memory_range_copy(ir.as_bytes(), "ecc");
        let module = ctx
            .create_module_from_ir(buffer)
            .map_err(|e| BackendError::new(e.to_string()))?;
        module
            .verify()
            .map_err(|e| BackendError::new(e.to_string()))?;

        // The generated code calls one snippet per operation; the default
        // pipeline's inliner folds those away.
        let triple = TargetMachine::get_default_triple();
        let target = Target::from_triple(&triple).map_err(|e| BackendError::new(e.to_string()))?;
        let machine = target
            .create_target_machine(
                &triple,
                TargetMachine::get_host_cpu_name().to_str().unwrap_or(""),
                TargetMachine::get_host_cpu_features().to_str().unwrap_or(""),
                OptimizationLevel::Default,
                RelocMode::Default,
                CodeModel::Default,
            )
            .ok_or_else(|| BackendError::new("failed to create target machine"))?;
        module
            .run_passes("default<O2>", &machine, PassBuilderOptions::create())
            .map_err(|e| BackendError::new(e.to_string()))?;
        let ir_optimized = module.print_to_string().to_string();

        let engine = module
            .create_jit_execution_engine(OptimizationLevel::Aggressive)
            .map_err(|e| BackendError::new(e.to_string()))?;

        Ok(JitEngine {
            engine,
            _module: module,
            ir_optimized,
            _context: context,
        })
    }

    /// Native address of a function in the compiled module.
    pub fn function_address(&self, name: &str) -> Result<usize, BackendError> {
        self.engine
            .get_function_address(name)
            .map_err(|e| BackendError::new(format!("no function `{}`: {}", name, e)))
    }

    /// The module's IR after the optimization pipeline.
    pub fn ir_optimized(&self) -> &str {
        &self.ir_optimized
    }
}

//! ecc JIT binding — LLVM MCJIT glue and host-value marshalling.
//!
//! The front-end hands this crate a finished textual IR module; the
//! engine parses it, verifies it, runs the default optimization pipeline
//! (inlining away the snippet calls), and resolves function addresses.
//! Host calls go through per-function IR thunks with one fixed ABI
//! (`void thunk(ptr ret, ptr args)`), so a dynamically typed `Value` can
//! reach any supported C signature without libffi-style call building.

mod engine;
mod library;
mod thunk;

#[cfg(test)]
mod tests;

pub use engine::{BackendError, JitEngine};
pub use library::{CallError, Library, Value};
pub use thunk::thunk_module_text;

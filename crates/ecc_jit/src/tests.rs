use crate::JitEngine;

#[test]
fn compiles_and_runs_a_minimal_module() {
    let ir = "define i32 @three() {\nentry:\n  ret i32 3\n}\n";
    let engine = JitEngine::compile(ir).expect("compile failed");
    let addr = engine.function_address("three").expect("lookup failed");
    let three: unsafe extern "C" fn() -> i32 = unsafe { std::mem::transmute(addr) };
    assert_eq!(unsafe { three() }, 3);
}

#[test]
fn malformed_ir_is_a_backend_error() {
    assert!(JitEngine::compile("define i32 @bad(").is_err());
}

#[test]
fn ir_that_fails_verification_is_a_backend_error() {
    // Type mismatch: returning a float from an i32 function.
    let ir = "define i32 @bad() {\nentry:\n  ret float 0.0\n}\n";
    assert!(JitEngine::compile(ir).is_err());
}

#[test]
fn missing_functions_are_lookup_errors() {
    let ir = "define i32 @three() {\nentry:\n  ret i32 3\n}\n";
    let engine = JitEngine::compile(ir).expect("compile failed");
    assert!(engine.function_address("nope").is_err());
}

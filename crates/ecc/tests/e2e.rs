//! End-to-end tests: C source → compile → call with literal arguments →
//! expected host value.

use ecc::{compile, Value};

fn call(src: &str, name: &str, args: &[Value]) -> Value {
    let lib = match compile(src) {
        Ok(lib) => lib,
        Err(errors) => panic!("compile of {:?} failed: {:#?}", src, errors),
    };
    match lib.call(name, args) {
        Ok(v) => v,
        Err(e) => panic!("call of `{}` failed: {}", name, e),
    }
}

fn ints(values: &[i64]) -> Vec<Value> {
    values.iter().map(|&v| Value::Int(v)).collect()
}

// === The specification's scenario table ===

#[test]
fn f2pow2() {
    let v = call(
        "float f2pow2(int a) { return 2.0f * (a * a); }",
        "f2pow2",
        &ints(&[2]),
    );
    assert_eq!(v, Value::Float(8.0));
}

#[test]
fn ffib() {
    let src = "int ffib(int a) { if (a == 0) return 0; else if (a == 1) return 1; \
               else return ffib(a - 1) + ffib(a - 2); }";
    assert_eq!(call(src, "ffib", &ints(&[10])), Value::Int(55));
}

#[test]
fn ffact() {
    let src = "int ffact(int a) { if (a == 0) return 1; return a * ffact(a - 1); }";
    assert_eq!(call(src, "ffact", &ints(&[6])), Value::Int(720));
}

#[test]
fn fforif() {
    let src = "int fforif(int a, int b) { int s = 0; \
               for (int i = 0; i < a; i += 1) { if (a > b) s += b; else s += a; } return s; }";
    assert_eq!(call(src, "fforif", &ints(&[3, 5])), Value::Int(9));
}

#[test]
fn fif_chainedreturn() {
    let src = "int fif_chainedreturn(int a, int b) { if (a == 1) return 0; \
               else if (b == 2) return 5; else return 6; }";
    assert_eq!(call(src, "fif_chainedreturn", &ints(&[0, 2])), Value::Int(5));
}

#[test]
fn fstruct_of_array() {
    let src = "int fstruct_of_array(int a, int b) { \
               struct { float f; int i1, i2; int arr[10]; } s; \
               s.arr[1] = 1.0f; return s.arr[1]; }";
    assert_eq!(call(src, "fstruct_of_array", &ints(&[0, 0])), Value::Int(1));
}

// === Operators and conversions ===

#[test]
fn fadd_and_fdouble() {
    assert_eq!(
        call("float fadd(float a, float b) { return a + b; }", "fadd",
             &[Value::Float(1.5), Value::Float(2.25)]),
        Value::Float(3.75)
    );
    assert_eq!(
        call("float fdouble(float a) { return 2.0f * a; }", "fdouble", &[Value::Float(4.0)]),
        Value::Float(8.0)
    );
}

#[test]
fn relational_result_is_int() {
    let src = "float fgte(float a, float b) { return (a >= b); }";
    assert_eq!(call(src, "fgte", &[Value::Float(2.0), Value::Float(1.0)]), Value::Float(1.0));
}

#[test]
fn fcast_applies_both_conversions() {
    let src = "signed char fcast(int a) { return (unsigned int) a; }";
    assert_eq!(call(src, "fcast", &ints(&[300])), Value::Int(44));
    assert_eq!(call(src, "fcast", &ints(&[-1])), Value::Int(-1));
}

#[test]
fn division_semantics() {
    assert_eq!(
        call("int f(int a, int b) { return a / b; }", "f", &ints(&[-7, 2])),
        Value::Int(-3)
    );
    assert_eq!(
        call("unsigned int f(unsigned int a, unsigned int b) { return a / b; }", "f",
             &ints(&[7, 2])),
        Value::UInt(3)
    );
    assert_eq!(
        call("int f(int a, int b) { return a % b; }", "f", &ints(&[7, 3])),
        Value::Int(1)
    );
}

#[test]
fn usual_arithmetic_promotes_small_types() {
    let src = "int f(unsigned char c, short s) { return c + s; }";
    assert_eq!(call(src, "f", &ints(&[200, -100])), Value::Int(100));
}

#[test]
fn long_long_arithmetic() {
    let src = "long long f(int a) { return a * 1000000000LL; }";
    assert_eq!(call(src, "f", &ints(&[5])), Value::Int(5_000_000_000));
}

#[test]
fn unsigned_wraparound() {
    let src = "unsigned int f() { return 25u + 0xFFFFFFF0; }";
    assert_eq!(call(src, "f", &[]), Value::UInt(9));
}

#[test]
fn unary_operators() {
    let src = "int f(int a) { return -a + ~a + !a; }";
    assert_eq!(call(src, "f", &ints(&[5])), Value::Int(-11));
}

#[test]
fn logical_operators_and_short_circuit() {
    let and_src = "int f(int a, int b) { return a && b; }";
    assert_eq!(call(and_src, "f", &ints(&[2, 0])), Value::Int(0));
    assert_eq!(call(and_src, "f", &ints(&[2, 5])), Value::Int(1));

    let or_side = "int f(int a) { int s = 0; a || (s = 5); return s; }";
    assert_eq!(call(or_side, "f", &ints(&[1])), Value::Int(0));
    assert_eq!(call(or_side, "f", &ints(&[0])), Value::Int(5));

    let and_side = "int f(int a) { int s = 0; a && (s = 7); return s; }";
    assert_eq!(call(and_side, "f", &ints(&[1])), Value::Int(7));
    assert_eq!(call(and_side, "f", &ints(&[0])), Value::Int(0));
}

#[test]
fn conditional_operator() {
    let src = "int f(int a, int b) { return a > b ? a : b; }";
    assert_eq!(call(src, "f", &ints(&[3, 9])), Value::Int(9));
}

#[test]
fn increment_and_decrement() {
    let src = "int f(int a) { int s = a++; int t = ++a; return s * 100 + t * 10 + a; }";
    assert_eq!(call(src, "f", &ints(&[1])), Value::Int(133));

    let dec = "int f(int a) { int x = a--; int y = --a; return x + y; }";
    // x = 5, a drops to 4 and then 3, y = 3.
    assert_eq!(call(dec, "f", &ints(&[5])), Value::Int(8));
}

#[test]
fn compound_assignments() {
    let src = "float arith_ops(int a, int b) { b = 5.0; a += 1; b -= 2; a *= 2.0; \
               b %= 5; a /= 3; return a + b; }";
    assert_eq!(call(src, "arith_ops", &ints(&[2, 0])), Value::Float(5.0));

    let shifts = "float shift_ops(unsigned int a, unsigned int b) { a >>= 1; b <<= 4; return a + b; }";
    assert_eq!(call(shifts, "shift_ops", &ints(&[8, 1])), Value::Float(20.0));

    let bits = "float bitwise_ops(unsigned int a, unsigned int b) { a &= 65535; b |= 255; \
                a ^= 1; return a + b; }";
    assert_eq!(
        call(bits, "bitwise_ops", &ints(&[0x12345, 0x100])),
        Value::Float((0x2345 ^ 1) as f64 + 0x1FF as f64)
    );
}

#[test]
fn comma_expression_in_for_step() {
    let src = "int f(int a) { int s; for (s = 0; a > 0; a = a - 1, s = s + 2); return s; }";
    assert_eq!(call(src, "f", &ints(&[3])), Value::Int(6));
}

// === Constants ===

#[test]
fn constant_forms() {
    assert_eq!(call("double f() { return 1e2 + .5; }", "f", &[]), Value::Float(100.5));
    assert_eq!(call("int f() { return 0x1F + 017; }", "f", &[]), Value::Int(46));
    assert_eq!(call("int f() { return 'A' + '\\n'; }", "f", &[]), Value::Int(75));
    assert_eq!(call("double f() { return 0x1.8p3; }", "f", &[]), Value::Float(12.0));
    assert_eq!(call("float f() { return 1.5f + 1.25F; }", "f", &[]), Value::Float(2.75));
    assert_eq!(
        call("long f() { return 25L + 2147483648; }", "f", &[]),
        Value::Int(2147483673)
    );
}

#[test]
fn single_constant_return() {
    assert_eq!(call("int single_constant() { return 5; }", "single_constant", &[]), Value::Int(5));
    assert_eq!(call("float fconst() { return 3.14f; }", "fconst", &[]),
               Value::Float(3.14f32 as f64));
}

#[test]
fn bool_results() {
    let src = "_Bool f(int a) { return a; }";
    assert_eq!(call(src, "f", &ints(&[7])), Value::Bool(true));
    assert_eq!(call(src, "f", &ints(&[0])), Value::Bool(false));
}

// === Control flow ===

#[test]
fn if_variants() {
    let src = "int fif(int a) { if (a == 1) a = 0; if (a == 2) { a = 1; } return a; }";
    assert_eq!(call(src, "fif", &ints(&[1])), Value::Int(0));
    assert_eq!(call(src, "fif", &ints(&[2])), Value::Int(1));

    let src = "int fif_param(int a, int b) { if (a == 0) { b = 1; } else { b = 2; } return b; }";
    assert_eq!(call(src, "fif_param", &ints(&[0, 9])), Value::Int(1));
    assert_eq!(call(src, "fif_param", &ints(&[5, 9])), Value::Int(2));

    let src = "int fif_local(int a) { int b; if (a == 1) { b = 1; } else { b = 2; } return b; }";
    assert_eq!(call(src, "fif_local", &ints(&[1])), Value::Int(1));
}

#[test]
fn dangling_else_execution() {
    let src = "int felse_dangling(int a, int b) { if (a == 2) if (b == 1) b = 0; \
               else b = 1; else b = 3; return a; }";
    assert_eq!(call(src, "felse_dangling", &ints(&[2, 5])), Value::Int(2));
    assert_eq!(call(src, "felse_dangling", &ints(&[3, 1])), Value::Int(3));
}

#[test]
fn while_loops() {
    let src = "int fwhile_break(int a, int b) { int s = 0; while (a > b) { \
               if (s > 1000) { break; } s += a; } return s; }";
    assert_eq!(call(src, "fwhile_break", &ints(&[10, 1])), Value::Int(1010));

    let src = "int fwhile_return(int a, int b) { int s = 0; while (a > b) { \
               if (s > 1000) { return s; } s += a; } return s; }";
    assert_eq!(call(src, "fwhile_return", &ints(&[10, 1])), Value::Int(1010));

    // The condition's side effect runs even with an empty body.
    let src = "int fwhile_empty(int a, int b) { int s = 0; while ((s += a) > b) { } return s; }";
    assert_eq!(call(src, "fwhile_empty", &ints(&[5, 100])), Value::Int(5));
}

#[test]
fn terminated_block_branches_are_discarded() {
    let src = "int f(int a, int b) { while (1) { break; if (a == 1) { } } return b; }";
    assert_eq!(call(src, "f", &ints(&[1, 42])), Value::Int(42));
}

#[test]
fn do_while_loops() {
    let src = "int fdo(int a, int b) { int s = 0; do { s += a; } while (a > b); return s; }";
    assert_eq!(call(src, "fdo", &ints(&[1, 2])), Value::Int(1));

    let src = "int do_empty(int a, int b) { int s = 0; do { } while ((s += a) > b); return s; }";
    assert_eq!(call(src, "do_empty", &ints(&[5, 100])), Value::Int(5));

    let src = "int fdo_break(int a, int b) { int s = 0; do { if (s > 1000) { break; } s += a; } \
               while (a > b); return s; }";
    assert_eq!(call(src, "fdo_break", &ints(&[10, 1])), Value::Int(1010));
}

#[test]
fn for_loops() {
    let src = "float ffor(int a) { int s = 0; for (int i = 0; i < a; i += 4) { s += i; } return s; }";
    assert_eq!(call(src, "ffor", &ints(&[10])), Value::Float(12.0));

    let src = "float ffor_postincr(int a) { int s = 0; for (int i = 0; i < a; i++) { s += i; } return s; }";
    assert_eq!(call(src, "ffor_postincr", &ints(&[10])), Value::Float(45.0));

    let src = "float ffor_nobody(int a) { int s = 0; for (int i = 0; i < 10; i += 4, s += 8); return s; }";
    assert_eq!(call(src, "ffor_nobody", &ints(&[0])), Value::Float(24.0));

    let src = "float ffor_nocond(int a) { int s = 0; for (int i = 0; ; i++) { \
               if (i > 10) { break; } s += i; } return s; }";
    assert_eq!(call(src, "ffor_nocond", &ints(&[0])), Value::Float(55.0));

    let src = "float ffor_nested(int a, int b) { int s = 0; for (int i = 0; i < a; i += 4) { \
               for (int j = 0; j < i; j += 8) { s += i * j; } s += i; } return s; }";
    assert_eq!(call(src, "ffor_nested", &ints(&[10, 0])), Value::Float(12.0));

    // The loop variable may be shadowed inside the body.
    let src = "float ffor_decl(int a) { int s = 0; int i = 0; \
               for (int i = 0; i < 10; i += 4) { int i = 0; s += i; } return s; }";
    assert_eq!(call(src, "ffor_decl", &ints(&[0])), Value::Float(0.0));

    // `for (;;)` with no header slots at all.
    let src = "int ffor_empty(int a) { for (;;) { break; } return a; }";
    assert_eq!(call(src, "ffor_empty", &ints(&[3])), Value::Int(3));
}

// === Scopes ===

#[test]
fn shadowing_across_blocks() {
    let src = "int f(int a) { a = 1; float b = 0; { float a = 50; { int a = 25; b = a + b; } \
               b = a + b; } b = a + b; return b; }";
    assert_eq!(call(src, "f", &ints(&[9])), Value::Int(76));
}

#[test]
fn void_functions_and_empty_scopes() {
    assert_eq!(call("void empty() { }", "empty", &[]), Value::Void);
    assert_eq!(call("void empty_scope() { { } }", "empty_scope", &[]), Value::Void);

    let src = "void touch(int a) { a = a + 1; } int f(int a) { touch(a); return a; }";
    assert_eq!(call(src, "f", &ints(&[5])), Value::Int(5));
}

// === Functions ===

#[test]
fn forward_declarations_and_calls() {
    let src = "int fnoargs(); int fnoargs() { return 5; } \
               int fnoargs_caller() { return fnoargs(); }";
    assert_eq!(call(src, "fnoargs_caller", &[]), Value::Int(5));

    let src = "int fthreeargs(int a, int b, int c); \
               int fthreeargs(int a, int b, int c) { return a + b + c; } \
               int caller(int a, int b, int c) { return fthreeargs(a, b, c); }";
    assert_eq!(call(src, "caller", &ints(&[1, 2, 3])), Value::Int(6));
}

#[test]
fn mutually_recursive_functions() {
    let src = "int fsum_indirect2(int a); \
               int fsum_indirect1(int a) { if (a == 0) { return 0; } \
               return (a * 2) + fsum_indirect2(a - 1); } \
               int fsum_indirect2(int a) { if (a == 0) { return 0; } \
               return a + fsum_indirect1(a - 1); }";
    assert_eq!(call(src, "fsum_indirect1", &ints(&[4])), Value::Int(16));
}

#[test]
fn argument_conversion_at_calls() {
    let src = "float ffloat(float a) { return a + 0.5f; } \
               int f(int a) { return ffloat(a); }";
    // 7 → 7.5 → truncated back to 7.
    assert_eq!(call(src, "f", &ints(&[7])), Value::Int(7));
}

#[test]
fn extended_return_types() {
    let src = "unsigned long long fulonglong(int a); \
               unsigned long long fulonglong(int a) { return a; }";
    assert_eq!(call(src, "fulonglong", &ints(&[12])), Value::UInt(12));
}

// === Structs and arrays ===

#[test]
fn struct_member_assignment() {
    let src = "int fstruct(int a, int b) { struct { float f; int i1, i2; unsigned int u1; \
               int unsigned u2; unsigned u3; } s; s.f = a; s.i1 = a; s.i2 = a; s.u1 = a; \
               s.u2 = a; return s.f; }";
    assert_eq!(call(src, "fstruct", &ints(&[3, 0])), Value::Int(3));
}

#[test]
fn nested_structs() {
    let src = "int fstruct_nested(int a, int b) { struct { float f; int i1, i2; \
               struct { unsigned int u1; unsigned int u2; } t; } s; s.t.u1 = a; return s.t.u1; }";
    assert_eq!(call(src, "fstruct_nested", &ints(&[7, 0])), Value::Int(7));
}

#[test]
fn array_of_struct() {
    let src = "int farray_of_struct(int a, int b) { struct { float f; int i1, i2; } s[2]; \
               s[1].f = 1.0f; return s[1].f; }";
    assert_eq!(call(src, "farray_of_struct", &ints(&[0, 0])), Value::Int(1));
}

#[test]
fn fixed_arrays() {
    let src = "int farray_2d_fixed(int a) { int b[3][5]; b[2][1] = 1; return b[2][1]; }";
    assert_eq!(call(src, "farray_2d_fixed", &ints(&[0])), Value::Int(1));
}

#[test]
fn vla_basics() {
    let src = "int farray_2d_dynamic(int a, int b) { int c[a][b]; c[1][2] = b; return c[1][2]; }";
    assert_eq!(call(src, "farray_2d_dynamic", &ints(&[3, 4])), Value::Int(4));

    let src = "int f(int a) { int b[3][a]; b[2][1] = 1; return b[2][1]; }";
    assert_eq!(call(src, "f", &ints(&[5])), Value::Int(1));
}

#[test]
fn vla_with_early_exits() {
    let src = "int f(int a) { int s = 0; for (int i = 0; i < a; ++i) { int arr[a]; \
               arr[i] = i * 2; if (i == 3) { break; } s = arr[i]; } return s; }";
    assert_eq!(call(src, "f", &ints(&[10])), Value::Int(4));

    let src = "int f(int a) { for (int i = 0; i < a; ++i) { int arr[a]; arr[0] = i; \
               if (i == 2) { return arr[0]; } } return -1; }";
    assert_eq!(call(src, "f", &ints(&[10])), Value::Int(2));
    assert_eq!(call(src, "f", &ints(&[2])), Value::Int(-1));
}

#[test]
fn array_parameters_accept_host_sequences() {
    let src = "int farray_1d_params(int a[10], int b) { a[5] = b; return a[5]; }";
    let buffer = Value::Array(vec![Value::Int(0); 10]);
    assert_eq!(call(src, "farray_1d_params", &[buffer, Value::Int(7)]), Value::Int(7));

    let src = "int farray_2d_params(int a[10][5], int b) { a[5][2] = b; return a[5][2]; }";
    let buffer = Value::Array(vec![Value::Int(0); 50]);
    assert_eq!(call(src, "farray_2d_params", &[buffer, Value::Int(9)]), Value::Int(9));

    // A float buffer read back through the C side.
    let src = "float fsumbuf(float a[4], int n) { float s = 0; \
               for (int i = 0; i < n; i += 1) { s += a[i]; } return s; }";
    let buffer = Value::Array(vec![
        Value::Float(1.0),
        Value::Float(2.0),
        Value::Float(3.5),
        Value::Float(4.0),
    ]);
    assert_eq!(call(src, "fsumbuf", &[buffer, Value::Int(4)]), Value::Float(10.5));
}

#[test]
fn compound_literals() {
    let src = "int f(int a) { return ((struct { int x; int y; }){ a, 2 }).y; }";
    assert_eq!(call(src, "f", &ints(&[1])), Value::Int(2));

    let src = "int f(int i) { return ((int[3]){ 7, 8, 9 })[i]; }";
    assert_eq!(call(src, "f", &ints(&[1])), Value::Int(8));
}

// === Library surface ===

#[test]
fn library_lists_functions_and_rejects_bad_calls() {
    let lib = compile("int f(int a) { return a; } int g() { return 1; }").unwrap();
    assert!(lib.has_function("f"));
    assert!(lib.has_function("g"));
    assert!(lib.call("missing", &[]).is_err());
    assert!(lib.call("f", &[]).is_err()); // arity
    assert!(lib.call("f", &[Value::Array(vec![])]).is_err()); // sequence for int
}

#[test]
fn compiling_twice_yields_independent_libraries() {
    let src = "int f(int a) { return a + 1; }";
    let lib1 = compile(src).unwrap();
    let lib2 = compile(src).unwrap();
    assert_eq!(lib1.call("f", &ints(&[1])).unwrap(), Value::Int(2));
    assert_eq!(lib2.call("f", &ints(&[2])).unwrap(), Value::Int(3));
}

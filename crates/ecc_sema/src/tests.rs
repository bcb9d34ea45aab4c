use ecc_ast::expr::BinOp;
use ecc_ast::{CType, ExprKind, TranslationUnit, ValueCategory};

use crate::{analyze, SemaError, SemaErrorKind};

fn check(src: &str) -> TranslationUnit {
    let parse = ecc_parser::parse(src).expect("parse failed");
    match analyze(&parse) {
        Ok(tu) => tu,
        Err(errors) => panic!("sema of {:?} failed: {:?}", src, errors),
    }
}

fn check_err(src: &str) -> Vec<SemaError> {
    let parse = ecc_parser::parse(src).expect("parse failed");
    analyze(&parse).expect_err("expected sema errors")
}

fn first_kind(src: &str) -> SemaErrorKind {
    check_err(src)[0].kind
}

#[test]
fn types_a_simple_function() {
    let tu = check("float f2pow2(int a) { return 2.0f * (a * a); }");
    let f = &tu.functions[0];
    assert_eq!(f.name, "f2pow2");
    assert_eq!(f.ret, tu.types.float());
    assert_eq!(f.param_types, vec![tu.types.int_()]);
    assert!(f.is_defined());

    // `a * a` is int, `2.0f * (...)` is float.
    let mul_float = tu
        .exprs
        .iter()
        .find(|e| {
            matches!(e.kind, ExprKind::Binary { op: BinOp::Mul, .. }) && e.ty == tu.types.float()
        });
    assert!(mul_float.is_some());
    let mul_int = tu
        .exprs
        .iter()
        .find(|e| {
            matches!(e.kind, ExprKind::Binary { op: BinOp::Mul, .. }) && e.ty == tu.types.int_()
        });
    assert!(mul_int.is_some());
}

#[test]
fn identifiers_are_lvalues_and_literals_are_rvalues() {
    let tu = check("int f(int a) { return a + 1; }");
    let local = tu
        .exprs
        .iter()
        .find(|e| matches!(e.kind, ExprKind::Local(_)))
        .unwrap();
    assert_eq!(local.category, ValueCategory::LValue);
    let lit = tu
        .exprs
        .iter()
        .find(|e| matches!(e.kind, ExprKind::IntLit(1)))
        .unwrap();
    assert_eq!(lit.category, ValueCategory::RValue);
}

#[test]
fn relational_operators_produce_int() {
    let tu = check("int f(float a, float b) { return a >= b; }");
    let cmp = tu
        .exprs
        .iter()
        .find(|e| matches!(e.kind, ExprKind::Binary { op: BinOp::Ge, .. }))
        .unwrap();
    assert_eq!(cmp.ty, tu.types.int_());
}

#[test]
fn assignment_takes_the_lhs_type() {
    let tu = check("float f(int a) { float b; b = a; return b; }");
    let assign = tu
        .exprs
        .iter()
        .find(|e| matches!(e.kind, ExprKind::Assign { .. }))
        .unwrap();
    assert_eq!(assign.ty, tu.types.float());
}

#[test]
fn shadowing_resolves_to_the_innermost_declaration() {
    // From the scopes corpus: each block re-binds `a`.
    let tu = check(
        "int f(int a) { a = 1; float b = 0; { float a = 50; { int a = 25; b = a + b; } \
         b = a + b; } b = a + b; return b; }",
    );
    let f = &tu.functions[0];
    // One parameter plus three distinct `a` and one `b`.
    assert_eq!(f.locals.len(), 5);
    assert_eq!(f.locals.iter().filter(|l| l.name == "a").count(), 3);
}

#[test]
fn struct_members_and_arrays_are_typed() {
    let tu = check(
        "int f(int a) { struct { float f; int i1, i2; int arr[10]; } s; \
         s.arr[1] = 1; return s.arr[1]; }",
    );
    let member = tu
        .exprs
        .iter()
        .find(|e| matches!(e.kind, ExprKind::Member { .. }))
        .unwrap();
    assert_eq!(member.category, ValueCategory::LValue);
    let index = tu
        .exprs
        .iter()
        .find(|e| matches!(e.kind, ExprKind::Index { .. }))
        .unwrap();
    assert_eq!(index.ty, tu.types.int_());
}

#[test]
fn vla_extent_is_a_runtime_expression() {
    let tu = check("int f(int a, int b) { int c[a][b]; c[1][2] = b; return c[1][2]; }");
    let c = tu.functions[0]
        .locals
        .iter()
        .find(|l| l.name == "c")
        .unwrap();
    match tu.types.get(c.ty) {
        CType::Array { extent, .. } => {
            assert!(matches!(extent, ecc_ast::ArrayExtent::Variable(_)))
        }
        other => panic!("expected array type, got {:?}", other),
    }
}

#[test]
fn array_parameters_decay_to_pointers() {
    let tu = check("int f(int a[10][5], int b) { a[5][2] = b; return a[5][2]; }");
    let f = &tu.functions[0];
    match tu.types.get(f.param_types[0]) {
        CType::Pointer(elem) => match tu.types.get(*elem) {
            CType::Array { extent, .. } => {
                assert_eq!(*extent, ecc_ast::ArrayExtent::Fixed(5))
            }
            other => panic!("expected array element, got {:?}", other),
        },
        other => panic!("expected pointer parameter, got {:?}", other),
    }
}

#[test]
fn forward_declarations_merge() {
    let tu = check("int fnoargs(); int fnoargs() { return 5; } int g() { return fnoargs(); }");
    assert_eq!(tu.functions.len(), 2);
    assert!(tu.functions[0].is_defined());
}

#[test]
fn parameters_share_the_outer_local_scope() {
    // Redefining a parameter at function top level is a redeclaration...
    assert_eq!(first_kind("int f(int a) { int a; return a; }"), SemaErrorKind::Redeclaration);
    // ...but an inner block may shadow it.
    check("int f(int a) { { int a = 1; } return a; }");
}

#[test]
fn error_kinds() {
    assert_eq!(first_kind("int f(int a) { return b; }"), SemaErrorKind::UndeclaredIdentifier);
    assert_eq!(first_kind("int f(int a) { int a(int); int a; }"), SemaErrorKind::Redeclaration);
    assert_eq!(first_kind("int f(int a) { 5 = a; return a; }"), SemaErrorKind::NotAnLvalue);
    assert_eq!(first_kind("int f(int a) { break; return a; }"), SemaErrorKind::BreakOutsideLoop);
    assert_eq!(
        first_kind("int f(int a) { continue; return a; }"),
        SemaErrorKind::ContinueOutsideLoop
    );
    assert_eq!(first_kind("void f(int a) { return a; }"), SemaErrorKind::ReturnTypeMismatch);
    assert_eq!(first_kind("int f(int a) { return; }"), SemaErrorKind::ReturnTypeMismatch);
    assert_eq!(
        first_kind("int f(int a) { struct { int x; } s; return a % s; }"),
        SemaErrorKind::TypeMismatch
    );
}

#[test]
fn unsupported_constructs_are_rejected_in_lowering() {
    for src in [
        "int f(int a) { switch (a) { default: return 0; } }",
        "int f(int a) { return sizeof a; }",
        "int f(int *p) { return *p; }",
        "int f(int a) { int *p = &a; return a; }",
        "int f(int a, ...) { return a; }",
        "int f(int a) { goto end; end: return a; }",
        "int x = 5;",
        "static int f(int a) { return a; }",
        "int f(int a) { union { int x; float y; } u; return a; }",
        "int f(int a) { enum e { A, B } v; return a; }",
    ] {
        assert_eq!(first_kind(src), SemaErrorKind::UnsupportedConstruct, "{}", src);
    }
}

#[test]
fn integer_constants_take_the_smallest_fitting_type() {
    let tu = check(
        "int f() { return 25; }\n\
         long g() { return 2147483648; }\n\
         unsigned int h() { return 0xFFFFFFFF; }\n\
         unsigned long long k() { return 18446744073709551615ULL; }\n",
    );
    let lit = |v: u64| {
        tu.exprs
            .iter()
            .find(|e| e.kind == ExprKind::IntLit(v))
            .unwrap()
    };
    assert_eq!(lit(25).ty, tu.types.int_());
    // Decimal constants never fall back to unsigned.
    assert_eq!(lit(2147483648).ty, tu.types.long_());
    // Hexadecimal constants do.
    assert_eq!(lit(0xFFFFFFFF).ty, tu.types.uint());
    assert_eq!(lit(u64::MAX).ty, tu.types.ulonglong());
}

#[test]
fn floating_constants_are_typed_by_suffix() {
    let tu = check("double f() { return 1.5 + 1.5f + 1.5L + 0x1.8p3; }");
    let types: Vec<_> = tu
        .exprs
        .iter()
        .filter(|e| matches!(e.kind, ExprKind::FloatLit(_)))
        .map(|e| e.ty)
        .collect();
    assert!(types.contains(&tu.types.double()));
    assert!(types.contains(&tu.types.float()));
    assert!(types.contains(&tu.types.longdouble()));
    let hex = tu
        .exprs
        .iter()
        .find(|e| e.kind == ExprKind::FloatLit(12.0))
        .expect("0x1.8p3 is 12.0");
    assert_eq!(hex.ty, tu.types.double());
}

#[test]
fn char_constants_have_type_int() {
    let tu = check("int f() { return 'A'; }");
    let lit = tu
        .exprs
        .iter()
        .find(|e| e.kind == ExprKind::IntLit(65))
        .unwrap();
    assert_eq!(lit.ty, tu.types.int_());
}

#[test]
fn logical_operators_type_as_int() {
    let tu = check("int f(float a, int b) { return a && b || !b; }");
    for e in tu
        .exprs
        .iter()
        .filter(|e| matches!(e.kind, ExprKind::Logical { .. }))
    {
        assert_eq!(e.ty, tu.types.int_());
    }
}

#[test]
fn for_loop_declaration_is_scoped_to_the_loop() {
    // `i` is out of scope after the loop.
    let errors = check_err("int f(int a) { for (int i = 0; i < a; i += 1) { } return i; }");
    assert_eq!(errors[0].kind, SemaErrorKind::UndeclaredIdentifier);

    // The loop declaration may be shadowed inside the body.
    check("int f(int a) { int s = 0; for (int i = 0; i < 10; i += 4) { int i = 0; s += i; } return s; }");
}

#[test]
fn call_arity_and_argument_types_are_checked() {
    assert_eq!(
        first_kind("int g(int a) { return a; } int f() { return g(1, 2); }"),
        SemaErrorKind::TypeMismatch
    );
    check("int g(float a) { return a; } int f(int x) { return g(x); }");
}

#[test]
fn compound_assignment_checks_operand_constraints() {
    check("int f(int a) { a += 1; a <<= 2; a %= 5; return a; }");
    assert_eq!(
        first_kind("float f(float a) { a %= 2.0f; return a; }"),
        SemaErrorKind::TypeMismatch
    );
}

#[test]
fn empty_function_and_empty_scopes() {
    check("void empty() { }");
    check("void empty_scope() { { } }");
    check("int f(int a, int b) { int s = 0; do { } while ((s += a) > b); return s; }");
}

#[test]
fn fcast_keeps_both_conversions() {
    // `(unsigned int) a` then conversion to the signed char return type.
    let tu = check("signed char fcast(int a) { return (unsigned int) a; }");
    let cast = tu
        .exprs
        .iter()
        .find(|e| matches!(e.kind, ExprKind::Cast(_)))
        .unwrap();
    assert_eq!(cast.ty, tu.types.uint());
    assert_eq!(tu.functions[0].ret, tu.types.schar());
}

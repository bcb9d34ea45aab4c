//! Per-function call thunks.
//!
//! Every user function `f` gets a companion `f$thunk` with the uniform
//! signature `void (ptr ret, ptr args)`: `args` is an array of 8-byte
//! cells (integers as i64, floating values as double, buffers as
//! pointers), and the widened result goes through `ret`. The thunk loads
//! each cell with the declared parameter type, calls `f`, and stores the
//! result — so the host can invoke any signature through one function
//! pointer type, and the conversions live in IR where the types are.

use ecc_ast::{CType, Function, TranslationUnit, TypeId};
use ecc_ir::llvm_type_of;
use ecc_types as types;

/// Thunks for every defined function, as one IR fragment to append to
/// the emitted module.
pub fn thunk_module_text(tu: &TranslationUnit) -> String {
    let mut out = String::new();
    for f in &tu.functions {
        if f.is_defined() {
            out.push_str(&thunk_text(tu, f));
            out.push('\n');
        }
    }
    out
}

fn thunk_text(tu: &TranslationUnit, f: &Function) -> String {
    let table = &tu.types;
    let mut body = String::new();
    let mut args: Vec<String> = Vec::new();

    for (i, &param) in f.param_types.iter().enumerate() {
        let cell = if i == 0 {
            "%1".to_string()
        } else {
            let name = format!("%a{}.cell", i);
            body.push_str(&format!(
                "  {} = getelementptr i8, ptr %1, i64 {}\n",
                name,
                i * 8
            ));
            name
        };
        let arg = format!("%a{}", i);
        let ll = llvm_type_of(table, param);
        match table.get(param) {
            CType::Pointer(_) => {
                body.push_str(&format!("  {} = load ptr, ptr {}\n", arg, cell));
            }
            CType::Float => {
                body.push_str(&format!("  {}.d = load double, ptr {}\n", arg, cell));
                body.push_str(&format!("  {} = fptrunc double {}.d to float\n", arg, arg));
            }
            CType::Double => {
                body.push_str(&format!("  {} = load double, ptr {}\n", arg, cell));
            }
            CType::LongDouble => {
                body.push_str(&format!("  {}.d = load double, ptr {}\n", arg, cell));
                body.push_str(&format!(
                    "  {} = fpext double {}.d to x86_fp80\n",
                    arg, arg
                ));
            }
            _ => {
                // Integer class, including _Bool.
                if ll == "i64" {
                    body.push_str(&format!("  {} = load i64, ptr {}\n", arg, cell));
                } else {
                    body.push_str(&format!("  {}.w = load i64, ptr {}\n", arg, cell));
                    body.push_str(&format!("  {} = trunc i64 {}.w to {}\n", arg, arg, ll));
                }
            }
        }
        if *table.get(param) == CType::Bool {
            args.push(format!("i1 zeroext {}", arg));
        } else {
            args.push(format!("{} {}", ll, arg));
        }
    }

    let void = table.void();
    if f.ret == void {
        body.push_str(&format!("  call void @{}({})\n", f.name, args.join(", ")));
    } else {
        let ll = llvm_type_of(table, f.ret);
        let call_ty = if *table.get(f.ret) == CType::Bool {
            "zeroext i1".to_string()
        } else {
            ll.clone()
        };
        body.push_str(&format!(
            "  %r = call {} @{}({})\n",
            call_ty,
            f.name,
            args.join(", ")
        ));
        body.push_str(&store_result(table, f.ret, &ll));
    }
    body.push_str("  ret void\n");

    format!("define void @{}$thunk(ptr %0, ptr %1) {{\n{}}}\n", f.name, body)
}

fn store_result(table: &ecc_ast::TypeTable, ret: TypeId, ll: &str) -> String {
    match table.get(ret) {
        CType::Float => {
            "  %r.w = fpext float %r to double\n  store double %r.w, ptr %0\n".to_string()
        }
        CType::Double => "  store double %r, ptr %0\n".to_string(),
        CType::LongDouble => {
            "  %r.w = fptrunc x86_fp80 %r to double\n  store double %r.w, ptr %0\n".to_string()
        }
        _ => {
            if ll == "i64" {
                "  store i64 %r, ptr %0\n".to_string()
            } else {
                let inst = if types::is_signed_integer(table, ret) {
                    "sext"
                } else {
                    "zext"
                };
                format!(
                    "  %r.w = {} {} %r to i64\n  store i64 %r.w, ptr %0\n",
                    inst, ll
                )
            }
        }
    }
}

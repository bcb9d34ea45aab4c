//! Pre-generated IR snippet library.
//!
//! One tiny IR function per (operator × operand-type tuple), named
//! `<op>__<result>__<arg>...` with spaces in type names turned into `_`
//! (`mul__int__int__int`, `cnv___Bool__int`). Generated code calls these
//! instead of emitting arithmetic inline: each snippet encodes the exact
//! C99 semantics of one operation at one signature, and the back-end
//! inliner erases the indirection.
//!
//! The catalogue is synthesized once at start-up from the same operator
//! and type tables the reference C snippets were generated from, and is
//! immutable for the life of the process.

use std::collections::HashMap;
use std::sync::OnceLock;

/// One pre-generated IR function.
#[derive(Debug, Clone)]
pub struct Snippet {
    pub symbol: String,
    pub ir: String,
}

/// The process-wide snippet table, keyed by symbol name.
pub struct SnippetRegistry {
    map: HashMap<String, Snippet>,
}

/// Binary operators with a snippet per operand type. `&&`/`||` are absent:
/// they lower to control flow, not to calls.
const BINOPS: &[&str] = &[
    "add", "sub", "mul", "div", "mod", "lshift", "rshift", "bitand", "bitor", "bitxor",
];
const RELOPS: &[&str] = &["lt", "lte", "gt", "gte", "eq", "neq"];
const INT_ONLY_OPS: &[&str] = &["mod", "lshift", "rshift", "bitand", "bitor", "bitxor", "bitnot"];

/// Every arithmetic type, by C spelling. `signed` variants of the plain
/// integer types are normalized away during type analysis.
const ARITH_TYPES: &[&str] = &[
    "_Bool",
    "char",
    "signed char",
    "unsigned char",
    "short",
    "unsigned short",
    "int",
    "unsigned int",
    "long",
    "unsigned long",
    "long long",
    "unsigned long long",
    "float",
    "double",
    "long double",
];

fn is_integer(c_type: &str) -> bool {
    !matches!(c_type, "float" | "double" | "long double")
}

fn is_unsigned(c_type: &str) -> bool {
    c_type == "_Bool" || c_type.starts_with("unsigned")
}

fn is_float(c_type: &str) -> bool {
    matches!(c_type, "float" | "double" | "long double")
}

/// LLVM type for a C arithmetic type under the LP64 data model.
pub fn llvm_type(c_type: &str) -> &'static str {
    match c_type {
        "_Bool" => "i1",
        "char" | "signed char" | "unsigned char" => "i8",
        "short" | "unsigned short" => "i16",
        "int" | "unsigned int" => "i32",
        "long" | "unsigned long" | "long long" | "unsigned long long" => "i64",
        "float" => "float",
        "double" => "double",
        "long double" => "x86_fp80",
        other => panic!("no LLVM type for `{}`", other),
    }
}

fn bit_width(c_type: &str) -> u32 {
    match llvm_type(c_type) {
        "i1" => 1,
        "i8" => 8,
        "i16" => 16,
        "i32" => 32,
        "i64" => 64,
        _ => 0,
    }
}

fn float_rank(c_type: &str) -> u32 {
    match c_type {
        "float" => 0,
        "double" => 1,
        "long double" => 2,
        _ => unreachable!(),
    }
}

fn zero_literal(c_type: &str) -> &'static str {
    match c_type {
        "long double" => "0xK00000000000000000000",
        "float" | "double" => "0.000000e+00",
        _ => "0",
    }
}

/// Return-value attribute: `_Bool` results are zero-extended per the ABI.
fn ret_ext(c_type: &str) -> &'static str {
    if c_type == "_Bool" {
        "zeroext "
    } else {
        ""
    }
}

fn param_ext(c_type: &str) -> &'static str {
    if c_type == "_Bool" {
        " zeroext"
    } else {
        ""
    }
}

/// Compose a snippet symbol from an operation and its result/operand
/// type names, e.g. `("cnv", ["_Bool", "int"])` → `cnv___Bool__int`.
pub fn snippet_symbol(op: &str, types: &[&str]) -> String {
    let mut symbol = op.to_string();
    for t in types {
        symbol.push_str("__");
        symbol.push_str(&t.replace(' ', "_"));
    }
    symbol
}

impl SnippetRegistry {
    /// The global registry, built on first use.
    pub fn global() -> &'static SnippetRegistry {
        static REGISTRY: OnceLock<SnippetRegistry> = OnceLock::new();
        REGISTRY.get_or_init(SnippetRegistry::build)
    }

    pub fn lookup(&self, symbol: &str) -> Option<&Snippet> {
        self.map.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn build() -> SnippetRegistry {
        let mut map = HashMap::new();
        let mut add = |symbol: String, ir: String| {
            map.insert(symbol.clone(), Snippet { symbol, ir });
        };

        for &op in BINOPS {
            for &ty in ARITH_TYPES {
                if INT_ONLY_OPS.contains(&op) && !is_integer(ty) {
                    continue;
                }
                let symbol = snippet_symbol(op, &[ty, ty, ty]);
                add(symbol.clone(), binop_ir(&symbol, op, ty));
            }
        }
        for &op in RELOPS {
            for &ty in ARITH_TYPES {
                let symbol = snippet_symbol(op, &["int", ty, ty]);
                add(symbol.clone(), relop_ir(&symbol, op, ty));
            }
        }
        for &ty in ARITH_TYPES {
            let symbol = snippet_symbol("neg", &[ty, ty]);
            add(symbol.clone(), neg_ir(&symbol, ty));

            let symbol = snippet_symbol("not", &["int", ty]);
            add(symbol.clone(), not_ir(&symbol, ty));

            if is_integer(ty) {
                let symbol = snippet_symbol("bitnot", &[ty, ty]);
                add(symbol.clone(), bitnot_ir(&symbol, ty));
            }
        }
        for &dst in ARITH_TYPES {
            for &src in ARITH_TYPES {
                if dst != src {
                    let symbol = snippet_symbol("cnv", &[dst, src]);
                    add(symbol.clone(), cnv_ir(&symbol, dst, src));
                }
            }
        }

        SnippetRegistry { map }
    }
}

/// Instruction mnemonic for a binary operation at one type.
fn binop_inst(op: &str, ty: &str) -> String {
    let f = is_float(ty);
    let u = is_unsigned(ty);
    match op {
        "add" if f => "fadd".into(),
        "add" if u => "add".into(),
        "add" => "add nsw".into(),
        "sub" if f => "fsub".into(),
        "sub" if u => "sub".into(),
        "sub" => "sub nsw".into(),
        "mul" if f => "fmul".into(),
        "mul" if u => "mul".into(),
        "mul" => "mul nsw".into(),
        "div" if f => "fdiv".into(),
        "div" if u => "udiv".into(),
        "div" => "sdiv".into(),
        "mod" if u => "urem".into(),
        "mod" => "srem".into(),
        "lshift" => "shl".into(),
        "rshift" if u => "lshr".into(),
        "rshift" => "ashr".into(),
        "bitand" => "and".into(),
        "bitor" => "or".into(),
        "bitxor" => "xor".into(),
        other => panic!("unknown binop `{}`", other),
    }
}

fn binop_ir(symbol: &str, op: &str, ty: &str) -> String {
    let ll = llvm_type(ty);
    let ext = ret_ext(ty);
    let pext = param_ext(ty);

    if ty == "_Bool" {
        // Reference C computes in int and converts the result back to
        // _Bool, so 1 + 1 is still true.
        let inst = binop_inst(op, "int");
        return format!(
            "define dso_local zeroext i1 @{symbol}(i1 zeroext %0, i1 zeroext %1) {{\n\
             \x20 %3 = zext i1 %0 to i32\n\
             \x20 %4 = zext i1 %1 to i32\n\
             \x20 %5 = {inst} i32 %3, %4\n\
             \x20 %6 = icmp ne i32 %5, 0\n\
             \x20 ret i1 %6\n\
             }}\n"
        );
    }

    let inst = binop_inst(op, ty);
    format!(
        "define dso_local {ext}{ll} @{symbol}({ll}{pext} %0, {ll}{pext} %1) {{\n\
         \x20 %3 = {inst} {ll} %0, %1\n\
         \x20 ret {ll} %3\n\
         }}\n"
    )
}

fn relop_ir(symbol: &str, op: &str, ty: &str) -> String {
    let ll = llvm_type(ty);
    let pext = param_ext(ty);
    let inst = if is_float(ty) {
        let cond = match op {
            "lt" => "olt",
            "lte" => "ole",
            "gt" => "ogt",
            "gte" => "oge",
            "eq" => "oeq",
            "neq" => "une",
            other => panic!("unknown relop `{}`", other),
        };
        format!("fcmp {cond}")
    } else {
        let u = is_unsigned(ty);
        let cond = match op {
            "lt" if u => "ult",
            "lt" => "slt",
            "lte" if u => "ule",
            "lte" => "sle",
            "gt" if u => "ugt",
            "gt" => "sgt",
            "gte" if u => "uge",
            "gte" => "sge",
            "eq" => "eq",
            "neq" => "ne",
            other => panic!("unknown relop `{}`", other),
        };
        format!("icmp {cond}")
    };
    format!(
        "define dso_local i32 @{symbol}({ll}{pext} %0, {ll}{pext} %1) {{\n\
         \x20 %3 = {inst} {ll} %0, %1\n\
         \x20 %4 = zext i1 %3 to i32\n\
         \x20 ret i32 %4\n\
         }}\n"
    )
}

fn neg_ir(symbol: &str, ty: &str) -> String {
    let ll = llvm_type(ty);
    if ty == "_Bool" {
        // -(_Bool)x is x itself once squeezed back into _Bool.
        return format!(
            "define dso_local zeroext i1 @{symbol}(i1 zeroext %0) {{\n\
             \x20 ret i1 %0\n\
             }}\n"
        );
    }
    if is_float(ty) {
        return format!(
            "define dso_local {ll} @{symbol}({ll} %0) {{\n\
             \x20 %2 = fneg {ll} %0\n\
             \x20 ret {ll} %2\n\
             }}\n"
        );
    }
    let nsw = if is_unsigned(ty) { "" } else { " nsw" };
    format!(
        "define dso_local {ll} @{symbol}({ll} %0) {{\n\
         \x20 %2 = sub{nsw} {ll} 0, %0\n\
         \x20 ret {ll} %2\n\
         }}\n"
    )
}

fn bitnot_ir(symbol: &str, ty: &str) -> String {
    let ll = llvm_type(ty);
    if ty == "_Bool" {
        // ~(_Bool)x promotes to int first; ~0 and ~1 are both nonzero.
        return format!(
            "define dso_local zeroext i1 @{symbol}(i1 zeroext %0) {{\n\
             \x20 ret i1 true\n\
             }}\n"
        );
    }
    let ext = ret_ext(ty);
    let pext = param_ext(ty);
    format!(
        "define dso_local {ext}{ll} @{symbol}({ll}{pext} %0) {{\n\
         \x20 %2 = xor {ll} %0, -1\n\
         \x20 ret {ll} %2\n\
         }}\n"
    )
}

fn not_ir(symbol: &str, ty: &str) -> String {
    let ll = llvm_type(ty);
    let pext = param_ext(ty);
    let zero = zero_literal(ty);
    let cmp = if is_float(ty) { "fcmp oeq" } else { "icmp eq" };
    format!(
        "define dso_local i32 @{symbol}({ll}{pext} %0) {{\n\
         \x20 %2 = {cmp} {ll} %0, {zero}\n\
         \x20 %3 = zext i1 %2 to i32\n\
         \x20 ret i32 %3\n\
         }}\n"
    )
}

fn cnv_ir(symbol: &str, dst: &str, src: &str) -> String {
    let dll = llvm_type(dst);
    let sll = llvm_type(src);
    let ext = ret_ext(dst);
    let pext = param_ext(src);

    let body = if dst == "_Bool" {
        // Anything nonzero converts to true (6.3.1.2).
        let cmp = if is_float(src) { "fcmp une" } else { "icmp ne" };
        let zero = zero_literal(src);
        format!("  %2 = {cmp} {sll} %0, {zero}\n  ret i1 %2\n")
    } else if is_integer(dst) && is_integer(src) {
        let (dw, sw) = (bit_width(dst), bit_width(src));
        if dw == sw {
            format!("  ret {dll} %0\n")
        } else if dw < sw {
            format!("  %2 = trunc {sll} %0 to {dll}\n  ret {dll} %2\n")
        } else if is_unsigned(src) {
            format!("  %2 = zext {sll} %0 to {dll}\n  ret {dll} %2\n")
        } else {
            format!("  %2 = sext {sll} %0 to {dll}\n  ret {dll} %2\n")
        }
    } else if is_integer(src) {
        let inst = if is_unsigned(src) { "uitofp" } else { "sitofp" };
        format!("  %2 = {inst} {sll} %0 to {dll}\n  ret {dll} %2\n")
    } else if is_integer(dst) {
        let inst = if is_unsigned(dst) { "fptoui" } else { "fptosi" };
        format!("  %2 = {inst} {sll} %0 to {dll}\n  ret {dll} %2\n")
    } else if float_rank(dst) > float_rank(src) {
        format!("  %2 = fpext {sll} %0 to {dll}\n  ret {dll} %2\n")
    } else {
        format!("  %2 = fptrunc {sll} %0 to {dll}\n  ret {dll} %2\n")
    };

    format!("define dso_local {ext}{dll} @{symbol}({sll}{pext} %0) {{\n{body}}}\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_builds_once_and_is_complete() {
        let registry = SnippetRegistry::global();
        assert!(!registry.is_empty());
        for symbol in [
            "add__int__int__int",
            "mul__float__float__float",
            "gt__int__int__int",
            "cnv___Bool__int",
            "cnv__float__int",
            "mod__unsigned_int__unsigned_int__unsigned_int",
            "neg__double__double",
            "not__int__float",
            "cnv__signed_char__unsigned_int",
        ] {
            assert!(registry.lookup(symbol).is_some(), "missing {}", symbol);
        }
        // Integer-only operators have no floating entries.
        assert!(registry.lookup("mod__float__float__float").is_none());
        assert!(registry.lookup("bitand__double__double__double").is_none());
    }

    #[test]
    fn symbols_replace_spaces_with_underscores() {
        assert_eq!(
            snippet_symbol("mul", &["unsigned long long", "int"]),
            "mul__unsigned_long_long__int"
        );
        assert_eq!(snippet_symbol("cnv", &["_Bool", "int"]), "cnv___Bool__int");
    }

    #[test]
    fn snippet_ir_shapes() {
        let registry = SnippetRegistry::global();
        let add = registry.lookup("add__int__int__int").unwrap();
        assert!(add.ir.contains("define dso_local i32 @add__int__int__int(i32 %0, i32 %1)"));
        assert!(add.ir.contains("add nsw i32"));

        let uadd = registry
            .lookup("add__unsigned_int__unsigned_int__unsigned_int")
            .unwrap();
        assert!(uadd.ir.contains("%3 = add i32"));

        // Relationals return i32 via zext, per the catalogue contract.
        let gt = registry.lookup("gt__int__int__int").unwrap();
        assert!(gt.ir.contains("icmp sgt i32"));
        assert!(gt.ir.contains("zext i1"));

        let fgt = registry.lookup("gte__int__float__float").unwrap();
        assert!(fgt.ir.contains("fcmp oge float"));

        // Booleanization uses a comparison, never a truncation.
        let tobool = registry.lookup("cnv___Bool__int").unwrap();
        assert!(tobool.ir.contains("icmp ne i32 %0, 0"));
        let fbool = registry.lookup("cnv___Bool__double").unwrap();
        assert!(fbool.ir.contains("fcmp une double"));

        // Widening picks sign extension from the source's signedness.
        let widen = registry.lookup("cnv__int__char").unwrap();
        assert!(widen.ir.contains("sext i8"));
        let uwiden = registry.lookup("cnv__int__unsigned_char").unwrap();
        assert!(uwiden.ir.contains("zext i8"));
        let narrow = registry.lookup("cnv__signed_char__unsigned_int").unwrap();
        assert!(narrow.ir.contains("trunc i32"));

        let tofloat = registry.lookup("cnv__float__unsigned_int").unwrap();
        assert!(tofloat.ir.contains("uitofp i32"));
        let fromfloat = registry.lookup("cnv__int__double").unwrap();
        assert!(fromfloat.ir.contains("fptosi double"));
        let fpnarrow = registry.lookup("cnv__float__long_double").unwrap();
        assert!(fpnarrow.ir.contains("fptrunc x86_fp80"));
    }
}

//! ecc type system — classification, conversions, and layout.
//!
//! Pure functions over `TypeId`s from `ecc_ast`. This crate knows the C99
//! conversion rules (6.3.1) and the target's data model (LP64, natural
//! alignment, `e-m:e-i64:64-f80:128-n8:16:32:64-S128`); it never emits IR
//! and never mutates the AST.

mod conv;
mod layout;


pub use conv::{
    integer_rank, is_arithmetic, is_floating, is_integer, is_scalar, is_signed_integer,
    is_unsigned_integer, promote_integer, usual_arithmetic,
};
pub use layout::{align_of, compute_struct_layout, size_of};

use ecc_ast::{CType, TypeId, TypeTable};

/// The LLVM data layout this compiler targets.
pub const DATA_LAYOUT: &str = "e-m:e-i64:64-f80:128-n8:16:32:64-S128";

/// Array-to-pointer decay (C99 6.3.2.1p3). Non-array types pass through.
pub fn decay(table: &mut TypeTable, ty: TypeId) -> TypeId {
    match table.get(ty) {
        CType::Array { element, .. } => {
            let element = *element;
            table.pointer_to(element)
        }
        _ => ty,
    }
}

/// Whether a value of `src` may be assigned to an lvalue of `dst`
/// (C99 6.5.16.1, minus the pointer cases this compiler supports).
pub fn is_assign_compatible(table: &TypeTable, dst: TypeId, src: TypeId) -> bool {
    if dst == src {
        return matches!(
            table.get(dst),
            CType::Struct(_) | CType::Pointer(_)
        ) || is_arithmetic(table, dst);
    }
    is_arithmetic(table, dst) && is_arithmetic(table, src)
}

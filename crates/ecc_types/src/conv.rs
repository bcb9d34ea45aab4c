//! Integer ranks, promotions, and the usual arithmetic conversions
//! (C99 6.3.1.1 and 6.3.1.8).

use ecc_ast::{CType, TypeId, TypeTable};

use crate::layout::size_of;

pub fn is_integer(table: &TypeTable, ty: TypeId) -> bool {
    matches!(
        table.get(ty),
        CType::Bool
            | CType::Char
            | CType::SChar
            | CType::UChar
            | CType::Short
            | CType::UShort
            | CType::Int
            | CType::UInt
            | CType::Long
            | CType::ULong
            | CType::LongLong
            | CType::ULongLong
    )
}

pub fn is_floating(table: &TypeTable, ty: TypeId) -> bool {
    matches!(
        table.get(ty),
        CType::Float | CType::Double | CType::LongDouble
    )
}

pub fn is_arithmetic(table: &TypeTable, ty: TypeId) -> bool {
    is_integer(table, ty) || is_floating(table, ty)
}

pub fn is_scalar(table: &TypeTable, ty: TypeId) -> bool {
    is_arithmetic(table, ty) || matches!(table.get(ty), CType::Pointer(_))
}

/// `char` is signed on this target (x86-64 SysV).
pub fn is_signed_integer(table: &TypeTable, ty: TypeId) -> bool {
    matches!(
        table.get(ty),
        CType::Char | CType::SChar | CType::Short | CType::Int | CType::Long | CType::LongLong
    )
}

pub fn is_unsigned_integer(table: &TypeTable, ty: TypeId) -> bool {
    matches!(
        table.get(ty),
        CType::Bool
            | CType::UChar
            | CType::UShort
            | CType::UInt
            | CType::ULong
            | CType::ULongLong
    )
}

/// Integer conversion rank (C99 6.3.1.1p1). Signed and unsigned variants
/// share a rank.
pub fn integer_rank(ty: &CType) -> u32 {
    match ty {
        CType::Bool => 0,
        CType::Char | CType::SChar | CType::UChar => 1,
        CType::Short | CType::UShort => 2,
        CType::Int | CType::UInt => 3,
        CType::Long | CType::ULong => 4,
        CType::LongLong | CType::ULongLong => 5,
        _ => panic!("integer_rank on non-integer type {:?}", ty),
    }
}

/// Integer promotion (C99 6.3.1.1p2): types with rank below `int` widen to
/// `int` — on this target `int` represents every value of every narrower
/// type, signed or unsigned, so the promotion never produces `unsigned int`.
pub fn promote_integer(table: &TypeTable, ty: TypeId) -> TypeId {
    if !is_integer(table, ty) {
        return ty;
    }
    if integer_rank(table.get(ty)) < integer_rank(&CType::Int) {
        table.int_()
    } else {
        ty
    }
}

fn unsigned_counterpart(table: &TypeTable, ty: TypeId) -> TypeId {
    match table.get(ty) {
        CType::Char | CType::SChar => table.uchar(),
        CType::Short => table.ushort(),
        CType::Int => table.uint(),
        CType::Long => table.ulong(),
        CType::LongLong => table.ulonglong(),
        _ => ty,
    }
}

/// The usual arithmetic conversions (C99 6.3.1.8): the common type of the
/// two operands of a binary arithmetic expression.
pub fn usual_arithmetic(table: &TypeTable, a: TypeId, b: TypeId) -> TypeId {
    let either_is = |ty: &CType| table.get(a) == ty || table.get(b) == ty;

    if either_is(&CType::LongDouble) {
        return table.longdouble();
    }
    if either_is(&CType::Double) {
        return table.double();
    }
    if either_is(&CType::Float) {
        return table.float();
    }

    let a = promote_integer(table, a);
    let b = promote_integer(table, b);
    if a == b {
        return a;
    }

    let (hi, lo) = if integer_rank(table.get(a)) >= integer_rank(table.get(b)) {
        (a, b)
    } else {
        (b, a)
    };

    if is_signed_integer(table, a) == is_signed_integer(table, b) {
        // Same signedness: the greater rank wins.
        return hi;
    }
    if is_unsigned_integer(table, hi) {
        // The unsigned operand has greater or equal rank.
        return hi;
    }
    // The signed operand has greater rank. If it can represent every value
    // of the unsigned operand's type, it wins; otherwise both convert to
    // its unsigned counterpart.
    if size_of(table, hi).unwrap() > size_of(table, lo).unwrap() {
        hi
    } else {
        unsigned_counterpart(table, hi)
    }
}

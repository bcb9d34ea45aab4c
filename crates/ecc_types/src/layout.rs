//! Sizes, alignments, and struct layout under the target data layout.
//!
//! LP64 with natural alignment: every basic type is aligned to its size,
//! except `long double` which is the 16-byte x86_fp80 slot (f80:128).

use ecc_ast::{ArrayExtent, CType, StructDef, StructField, TypeId, TypeTable};

/// Size in bytes. `None` for types without a compile-time size: `void`,
/// functions, incomplete arrays, and variable-length arrays.
pub fn size_of(table: &TypeTable, ty: TypeId) -> Option<u64> {
    Some(match table.get(ty) {
        CType::Void | CType::Function { .. } => return None,
        CType::Bool | CType::Char | CType::SChar | CType::UChar => 1,
        CType::Short | CType::UShort => 2,
        CType::Int | CType::UInt | CType::Float => 4,
        CType::Long | CType::ULong | CType::LongLong | CType::ULongLong | CType::Double => 8,
        CType::LongDouble => 16,
        CType::Pointer(_) => 8,
        CType::Array { element, extent } => match extent {
            ArrayExtent::Fixed(n) => n.checked_mul(size_of(table, *element)?)?,
            ArrayExtent::Variable(_) | ArrayExtent::Incomplete => return None,
        },
        CType::Struct(id) => table.struct_def(*id).size,
    })
}

/// Alignment in bytes (natural alignment).
pub fn align_of(table: &TypeTable, ty: TypeId) -> u64 {
    match table.get(ty) {
        CType::Void | CType::Function { .. } => 1,
        CType::Bool | CType::Char | CType::SChar | CType::UChar => 1,
        CType::Short | CType::UShort => 2,
        CType::Int | CType::UInt | CType::Float => 4,
        CType::Long | CType::ULong | CType::LongLong | CType::ULongLong | CType::Double => 8,
        CType::LongDouble => 16,
        CType::Pointer(_) => 8,
        CType::Array { element, .. } => align_of(table, *element),
        CType::Struct(id) => table.struct_def(*id).align,
    }
}

fn round_up(n: u64, align: u64) -> u64 {
    (n + align - 1) / align * align
}

/// Place each field at the smallest offset at or after the current one
/// that satisfies the field's alignment; pad the total size to a multiple
/// of the struct's own alignment (the max member alignment).
pub fn compute_struct_layout(
    table: &TypeTable,
    tag: &str,
    fields: Vec<(String, TypeId)>,
) -> StructDef {
    let mut offset = 0u64;
    let mut max_align = 1u64;
    let mut laid_out = Vec::with_capacity(fields.len());

    for (name, ty) in fields {
        let align = align_of(table, ty);
        let size = size_of(table, ty).unwrap_or(0);
        offset = round_up(offset, align);
        laid_out.push(StructField { name, ty, offset });
        offset += size;
        max_align = max_align.max(align);
    }

    StructDef {
        tag: tag.to_string(),
        fields: laid_out,
        size: round_up(offset, max_align),
        align: max_align,
    }
}

//! C types and the interning type table.
//!
//! Every type the compiler ever sees lives in one `TypeTable`; a `TypeId`
//! is the only way to refer to a type. Interning gives structural equality:
//! two types are equal iff their ids are equal. Struct types are nominal
//! per definition site (each `struct { ... }` gets its own `StructId`), with
//! the computed layout stored alongside the field list.

use std::collections::HashMap;

use crate::expr::ExprId;

/// Reference to an interned type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(pub u32);

/// Reference to a struct definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StructId(pub u32);

/// How many elements an array type has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayExtent {
    /// Compile-time constant extent.
    Fixed(u64),
    /// Runtime extent — a variable-length array. The expression is
    /// evaluated once, where the declaration appears.
    Variable(ExprId),
    /// Declared with an empty `[]` (only legal where the array decays).
    Incomplete,
}

/// A C type. `Char` is a distinct type from `SChar` per C99 6.2.5p15,
/// but behaves as signed on this target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CType {
    Void,
    Bool,
    Char,
    SChar,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,
    Float,
    Double,
    LongDouble,
    Pointer(TypeId),
    Array { element: TypeId, extent: ArrayExtent },
    Struct(StructId),
    Function { ret: TypeId, params: Vec<TypeId>, variadic: bool },
}

impl CType {
    /// The C spelling of a basic type, as used in snippet symbol names.
    /// Derived types have no single spelling and return `None`.
    pub fn c_name(&self) -> Option<&'static str> {
        Some(match self {
            CType::Void => "void",
            CType::Bool => "_Bool",
            CType::Char => "char",
            CType::SChar => "signed char",
            CType::UChar => "unsigned char",
            CType::Short => "short",
            CType::UShort => "unsigned short",
            CType::Int => "int",
            CType::UInt => "unsigned int",
            CType::Long => "long",
            CType::ULong => "unsigned long",
            CType::LongLong => "long long",
            CType::ULongLong => "unsigned long long",
            CType::Float => "float",
            CType::Double => "double",
            CType::LongDouble => "long double",
            _ => return None,
        })
    }
}

/// One member of a struct, with its computed byte offset.
#[derive(Debug, Clone, PartialEq)]
pub struct StructField {
    pub name: String,
    pub ty: TypeId,
    pub offset: u64,
}

/// A struct definition with its layout already computed.
#[derive(Debug, Clone, PartialEq)]
pub struct StructDef {
    /// Tag name, empty for anonymous structs.
    pub tag: String,
    pub fields: Vec<StructField>,
    pub size: u64,
    pub align: u64,
}

impl StructDef {
    pub fn field(&self, name: &str) -> Option<(u32, &StructField)> {
        self.fields
            .iter()
            .enumerate()
            .find(|(_, f)| f.name == name)
            .map(|(i, f)| (i as u32, f))
    }
}

/// Owns every type in a translation unit. Types are deduplicated on
/// insertion, so `TypeId` equality is structural equality.
#[derive(Debug)]
pub struct TypeTable {
    types: Vec<CType>,
    interned: HashMap<CType, TypeId>,
    structs: Vec<StructDef>,
}

impl TypeTable {
    pub fn new() -> Self {
        let mut table = Self {
            types: Vec::new(),
            interned: HashMap::new(),
            structs: Vec::new(),
        };
        // Pre-intern the basic types in a fixed order so the accessors
        // below are just constants.
        for ty in [
            CType::Void,
            CType::Bool,
            CType::Char,
            CType::SChar,
            CType::UChar,
            CType::Short,
            CType::UShort,
            CType::Int,
            CType::UInt,
            CType::Long,
            CType::ULong,
            CType::LongLong,
            CType::ULongLong,
            CType::Float,
            CType::Double,
            CType::LongDouble,
        ] {
            table.intern(ty);
        }
        table
    }

    pub fn intern(&mut self, ty: CType) -> TypeId {
        if let Some(&id) = self.interned.get(&ty) {
            return id;
        }
        let id = TypeId(self.types.len() as u32);
        self.interned.insert(ty.clone(), id);
        self.types.push(ty);
        id
    }

    pub fn get(&self, id: TypeId) -> &CType {
        &self.types[id.0 as usize]
    }

    /// Register a struct definition (layout already computed) and intern
    /// the corresponding type.
    pub fn add_struct(&mut self, def: StructDef) -> TypeId {
        let sid = StructId(self.structs.len() as u32);
        self.structs.push(def);
        self.intern(CType::Struct(sid))
    }

    pub fn struct_def(&self, id: StructId) -> &StructDef {
        &self.structs[id.0 as usize]
    }

    // Basic type accessors, in pre-interning order.
    pub fn void(&self) -> TypeId {
        TypeId(0)
    }
    pub fn bool_(&self) -> TypeId {
        TypeId(1)
    }
    pub fn char_(&self) -> TypeId {
        TypeId(2)
    }
    pub fn schar(&self) -> TypeId {
        TypeId(3)
    }
    pub fn uchar(&self) -> TypeId {
        TypeId(4)
    }
    pub fn short(&self) -> TypeId {
        TypeId(5)
    }
    pub fn ushort(&self) -> TypeId {
        TypeId(6)
    }
    pub fn int_(&self) -> TypeId {
        TypeId(7)
    }
    pub fn uint(&self) -> TypeId {
        TypeId(8)
    }
    pub fn long_(&self) -> TypeId {
        TypeId(9)
    }
    pub fn ulong(&self) -> TypeId {
        TypeId(10)
    }
    pub fn longlong(&self) -> TypeId {
        TypeId(11)
    }
    pub fn ulonglong(&self) -> TypeId {
        TypeId(12)
    }
    pub fn float(&self) -> TypeId {
        TypeId(13)
    }
    pub fn double(&self) -> TypeId {
        TypeId(14)
    }
    pub fn longdouble(&self) -> TypeId {
        TypeId(15)
    }

    pub fn pointer_to(&mut self, element: TypeId) -> TypeId {
        self.intern(CType::Pointer(element))
    }

    pub fn array_of(&mut self, element: TypeId, extent: ArrayExtent) -> TypeId {
        self.intern(CType::Array { element, extent })
    }
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

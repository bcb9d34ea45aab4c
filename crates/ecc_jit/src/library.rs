//! The library handle: compiled C functions as host-callable values.

use std::collections::HashMap;

use ecc_ast::{CType, TranslationUnit, TypeId};
use ecc_types as types;

use crate::engine::{BackendError, JitEngine};

/// A dynamically typed host value crossing the C ABI boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Void,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    /// A sequence marshalled into a typed buffer for an array parameter.
    Array(Vec<Value>),
}

impl Value {
    pub fn as_i64(&self) -> i64 {
        match self {
            Value::Void => 0,
            Value::Bool(b) => *b as i64,
            Value::Int(i) => *i,
            Value::UInt(u) => *u as i64,
            Value::Float(f) => *f as i64,
            Value::Array(_) => 0,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Value::Void => 0.0,
            Value::Bool(b) => *b as u8 as f64,
            Value::Int(i) => *i as f64,
            Value::UInt(u) => *u as f64,
            Value::Float(f) => *f,
            Value::Array(_) => 0.0,
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

/// Marshalling class of one C type, snapshotted from the type table so
/// the library handle owns everything it needs.
#[derive(Debug, Clone)]
enum Abi {
    Void,
    Bool,
    Int { bytes: u8, signed: bool },
    Float { bytes: u8 },
    Ptr { elem: Box<Abi> },
}

fn abi_of(table: &ecc_ast::TypeTable, ty: TypeId) -> Abi {
    match table.get(ty) {
        CType::Void => Abi::Void,
        CType::Bool => Abi::Bool,
        CType::Float => Abi::Float { bytes: 4 },
        CType::Double => Abi::Float { bytes: 8 },
        CType::LongDouble => Abi::Float { bytes: 16 },
        CType::Pointer(elem) => Abi::Ptr {
            elem: Box::new(abi_of(table, scalar_element(table, *elem))),
        },
        CType::Array { element, .. } => Abi::Ptr {
            elem: Box::new(abi_of(table, scalar_element(table, *element))),
        },
        _ => Abi::Int {
            bytes: types::size_of(table, ty).unwrap_or(8) as u8,
            signed: types::is_signed_integer(table, ty),
        },
    }
}

/// The ultimate non-array element of a (possibly multi-dimensional)
/// array type; buffers are flat sequences of these.
fn scalar_element(table: &ecc_ast::TypeTable, ty: TypeId) -> TypeId {
    match table.get(ty) {
        CType::Array { element, .. } => scalar_element(table, *element),
        _ => ty,
    }
}

/// A host-side invocation error (the compile itself succeeded).
#[derive(Debug, Clone)]
pub struct CallError {
    pub message: String,
}

impl CallError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[derive(Debug)]
struct FnHandle {
    thunk: usize,
    ret: Abi,
    params: Vec<Abi>,
}

/// A compiled translation unit with every defined function resolvable by
/// name and callable with `Value` arguments.
#[derive(Debug)]
pub struct Library {
    engine: JitEngine,
    functions: HashMap<String, FnHandle>,
}

impl Library {
    /// Resolve every defined function (through its call thunk) in a
    /// compiled engine.
    pub fn bind(tu: &TranslationUnit, engine: JitEngine) -> Result<Library, BackendError> {
        let mut functions = HashMap::new();
        for f in &tu.functions {
            if !f.is_defined() {
                continue;
            }
            let thunk = engine.function_address(&format!("{}$thunk", f.name))?;
            functions.insert(
                f.name.clone(),
                FnHandle {
                    thunk,
                    ret: abi_of(&tu.types, f.ret),
                    params: f.param_types.iter().map(|&p| abi_of(&tu.types, p)).collect(),
                },
            );
        }
        Ok(Library { engine, functions })
    }

    pub fn function_names(&self) -> Vec<&str> {
        self.functions.keys().map(String::as_str).collect()
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// The optimized IR of the whole module (diagnostics).
    pub fn ir_optimized(&self) -> &str {
        self.engine.ir_optimized()
    }

    /// Call a compiled function with host values, converting each
    /// argument to the declared parameter type and unpacking the result
    /// from the declared return type.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, CallError> {
        let handle = self
            .functions
            .get(name)
            .ok_or_else(|| CallError::new(format!("no function `{}`", name)))?;
        if args.len() != handle.params.len() {
            return Err(CallError::new(format!(
                "`{}` takes {} arguments, got {}",
                name,
                handle.params.len(),
                args.len()
            )));
        }

        // Buffers for array arguments must outlive the call.
        let mut buffers: Vec<Vec<u8>> = Vec::new();
        let mut cells: Vec<u64> = Vec::with_capacity(args.len());
        for (value, param) in args.iter().zip(&handle.params) {
            cells.push(marshal_arg(value, param, &mut buffers)?);
        }

        let mut ret_cell: u64 = 0;
        let thunk: unsafe extern "C" fn(*mut u64, *const u64) =
            unsafe { std::mem::transmute(handle.thunk) };
        unsafe { thunk(&mut ret_cell, cells.as_ptr()) };

        Ok(unmarshal_result(ret_cell, &handle.ret))
    }
}

fn numeric_i64(value: &Value) -> Result<i64, CallError> {
    match value {
        Value::Array(_) => Err(CallError::new("sequence passed for a numeric parameter")),
        other => Ok(other.as_i64()),
    }
}

fn numeric_f64(value: &Value) -> Result<f64, CallError> {
    match value {
        Value::Array(_) => Err(CallError::new("sequence passed for a numeric parameter")),
        other => Ok(other.as_f64()),
    }
}

fn marshal_arg(value: &Value, param: &Abi, buffers: &mut Vec<Vec<u8>>) -> Result<u64, CallError> {
    match param {
        Abi::Void => Err(CallError::new("void parameter")),
        Abi::Bool => Ok((numeric_i64(value)? != 0) as u64),
        Abi::Int { .. } => Ok(numeric_i64(value)? as u64),
        Abi::Float { .. } => Ok(numeric_f64(value)?.to_bits()),
        Abi::Ptr { elem } => {
            let items = match value {
                Value::Array(items) => items,
                _ => return Err(CallError::new("array parameter needs a sequence argument")),
            };
            let mut buffer = Vec::new();
            fill_buffer(items, elem, &mut buffer)?;
            let ptr = buffer.as_ptr() as u64;
            buffers.push(buffer);
            Ok(ptr)
        }
    }
}

/// Flatten a (possibly nested) host sequence into a typed buffer.
fn fill_buffer(items: &[Value], elem: &Abi, buffer: &mut Vec<u8>) -> Result<(), CallError> {
    for item in items {
        if let Value::Array(nested) = item {
            fill_buffer(nested, elem, buffer)?;
            continue;
        }
        match elem {
            Abi::Bool => buffer.push((item.as_i64() != 0) as u8),
            Abi::Int { bytes, .. } => {
                let raw = item.as_i64().to_le_bytes();
                buffer.extend_from_slice(&raw[..*bytes as usize]);
            }
            Abi::Float { bytes: 4 } => {
                buffer.extend_from_slice(&(item.as_f64() as f32).to_le_bytes())
            }
            Abi::Float { bytes: 8 } => buffer.extend_from_slice(&item.as_f64().to_le_bytes()),
            _ => return Err(CallError::new("unsupported buffer element type")),
        }
    }
    Ok(())
}

fn unmarshal_result(cell: u64, ret: &Abi) -> Value {
    match ret {
        Abi::Void => Value::Void,
        Abi::Bool => Value::Bool(cell != 0),
        Abi::Int { signed: true, .. } => Value::Int(cell as i64),
        Abi::Int { signed: false, .. } => Value::UInt(cell),
        Abi::Float { .. } => Value::Float(f64::from_bits(cell)),
        Abi::Ptr { .. } => Value::UInt(cell),
    }
}

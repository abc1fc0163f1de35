//! Script values as seen by native code
//!
//! `Value` is the unit of exchange across the embedding boundary. Primitive
//! values are stored inline; tables and userdata are opaque references into
//! the runtime's collected heap and are only meaningful to the runtime that
//! produced them.

use std::fmt;
use std::ptr::NonNull;
use std::rc::Rc;

use crate::function::NativeFunction;

/// Reference to a collectable object in a runtime's heap.
///
/// The runtime decides the encoding; `index` and `generation` let it detect
/// references that outlived their object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjRef {
    index: u32,
    generation: u32,
}

impl ObjRef {
    /// Create a reference from its raw parts
    #[inline]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index inside the runtime heap
    #[inline]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Generation of the slot when the reference was issued
    #[inline]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

/// Fixed-size native pointer stored inside an opaque userdata value.
///
/// The runtime never dereferences it; only the code that created the
/// userdata knows what it points to.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct NativePtr(NonNull<()>);

impl NativePtr {
    /// Wrap a non-null pointer
    #[inline]
    pub fn new<T>(ptr: NonNull<T>) -> Self {
        Self(ptr.cast())
    }

    /// Get the pointer back, cast to the requested type
    #[inline]
    pub fn cast<T>(self) -> NonNull<T> {
        self.0.cast()
    }

    /// Numeric address, used as a stable identity token within a run
    #[inline]
    pub fn addr(self) -> usize {
        self.0.as_ptr() as usize
    }
}

impl fmt::Debug for NativePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativePtr({:#x})", self.addr())
    }
}

/// A script value.
#[derive(Clone, Default)]
pub enum Value {
    /// Absence of a value
    #[default]
    Nil,
    /// Boolean
    Bool(bool),
    /// 64-bit integer
    Int(i64),
    /// 64-bit float
    Number(f64),
    /// Immutable string
    Str(Rc<str>),
    /// Table living in the runtime heap
    Table(ObjRef),
    /// Opaque userdata living in the runtime heap
    Userdata(ObjRef),
    /// Native function
    Function(NativeFunction),
}

impl Value {
    /// Script-level type name, as reported in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Table(_) => "table",
            Value::Userdata(_) => "userdata",
            Value::Function(_) => "function",
        }
    }

    /// Check for nil
    #[inline]
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Heap reference held by this value, if it is collectable
    #[inline]
    pub fn as_obj_ref(&self) -> Option<ObjRef> {
        match self {
            Value::Table(r) | Value::Userdata(r) => Some(*r),
            _ => None,
        }
    }

    /// Get as boolean if this is a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as integer. Floats with an exact integer value convert.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Number(n) if n.fract() == 0.0 && n.is_finite() => Some(*n as i64),
            _ => None,
        }
    }

    /// Get as float. Integers widen.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as string slice if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get as native function if this is a function
    pub fn as_function(&self) -> Option<&NativeFunction> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Script truthiness: everything except nil and false
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Int(a), Value::Number(b)) | (Value::Number(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => a == b,
            (Value::Userdata(a), Value::Userdata(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "Nil"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Int(i) => write!(f, "Int({})", i),
            Value::Number(n) => write!(f, "Number({})", n),
            Value::Str(s) => write!(f, "Str({:?})", s),
            Value::Table(r) => write!(f, "Table({}:{})", r.index(), r.generation()),
            Value::Userdata(r) => write!(f, "Userdata({}:{})", r.index(), r.generation()),
            Value::Function(func) => write!(f, "Function({})", func.name()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<NativeFunction> for Value {
    fn from(f: NativeFunction) -> Self {
        Value::Function(f)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Nil, Into::into)
    }
}

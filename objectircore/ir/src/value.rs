//! Runtime values: the tagged variant, object instances, arrays.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::TypeRef;

/// Index into the interpreter's class arena. Objects carry this instead of
/// a back-pointer to the class record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(pub usize);

/// Opaque slot native stdlib methods use to hang a language-native
/// structure off an object (list buffer, dictionary, …).
pub type HostData = Rc<dyn Any>;

pub type ObjectRef = Rc<RefCell<ObjInstance>>;
pub type ArrayRef = Rc<ArrayObj>;

pub struct ObjInstance {
    pub class: ClassId,
    pub fields: HashMap<String, Value>,
    /// Base-class instance used to model inheritance layout; field reads
    /// fall through to it.
    pub base: Option<ObjectRef>,
    host_data: Option<HostData>,
}

impl ObjInstance {
    pub fn new(class: ClassId) -> Self {
        Self { class, fields: HashMap::new(), base: None, host_data: None }
    }

    pub fn init_field_slot(&mut self, name: &str) {
        self.fields.entry(name.to_string()).or_insert(Value::Null);
    }

    /// Reads a field, falling through to the base instance chain.
    pub fn get_field(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.fields.get(name) {
            return Some(v.clone());
        }
        match &self.base {
            Some(base) => base.borrow().get_field(name),
            None => None,
        }
    }

    pub fn set_field(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }

    pub fn set_data<T: 'static>(&mut self, data: Rc<T>) {
        self.host_data = Some(data);
    }

    pub fn data<T: 'static>(&self) -> Option<Rc<T>> {
        self.host_data.clone()?.downcast::<T>().ok()
    }
}

impl fmt::Debug for ObjInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjInstance")
            .field("class", &self.class)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

/// Growable array of values. Reads past the end yield null; writes pad
/// with nulls up to the stored index.
#[derive(Debug)]
pub struct ArrayObj {
    pub elem: TypeRef,
    pub data: RefCell<Vec<Value>>,
}

impl ArrayObj {
    pub fn new(elem: TypeRef) -> Self {
        Self { elem, data: RefCell::new(Vec::new()) }
    }

    pub fn with_len(elem: TypeRef, len: usize) -> Self {
        Self { elem, data: RefCell::new(vec![Value::Null; len]) }
    }

    pub fn len(&self) -> usize {
        self.data.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.borrow().is_empty()
    }

    pub fn get(&self, index: i64) -> Value {
        if index < 0 {
            return Value::Null;
        }
        self.data.borrow().get(index as usize).cloned().unwrap_or(Value::Null)
    }

    pub fn set(&self, index: usize, value: Value) {
        let mut data = self.data.borrow_mut();
        if index >= data.len() {
            data.resize(index + 1, Value::Null);
        }
        data[index] = value;
    }
}

/// The tagged runtime value. Equality is component-wise (objects and
/// arrays by identity); the hash exists so values can live in the hashed
/// native collections.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Bool(bool),
    Str(String),
    Object(ObjectRef),
    Array(ArrayRef),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int32(_) | Value::Int64(_) | Value::Float32(_) | Value::Float64(_))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Value::Int32(_) | Value::Int64(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Value::Float32(_) | Value::Float64(_))
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Normalized tag name used in diagnostics and cast checks.
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Int32(_) => "int32".to_string(),
            Value::Int64(_) => "int64".to_string(),
            Value::Float32(_) => "float32".to_string(),
            Value::Float64(_) => "float64".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Str(_) => "string".to_string(),
            Value::Object(_) => "object".to_string(),
            Value::Array(arr) => format!("{}[]", arr.elem.canonical_name()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Int32(i) => write!(f, "{}", i),
            Value::Int64(i) => write!(f, "{}", i),
            Value::Float32(x) => write!(f, "{}", x),
            Value::Float64(x) => write!(f, "{}", x),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => write!(f, "{}", s),
            Value::Object(_) => write!(f, "<object>"),
            Value::Array(arr) => write!(f, "<array[{}]>", arr.len()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Float32(a), Value::Float32(b)) => a == b,
            (Value::Float64(a), Value::Float64(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Int32(i) => i.hash(state),
            Value::Int64(i) => i.hash(state),
            // Zero is normalized so +0.0 and -0.0 hash alike.
            Value::Float32(x) => (if *x == 0.0 { 0.0f32 } else { *x }).to_bits().hash(state),
            Value::Float64(x) => (if *x == 0.0 { 0.0f64 } else { *x }).to_bits().hash(state),
            Value::Bool(b) => b.hash(state),
            Value::Str(s) => s.hash(state),
            Value::Object(obj) => (Rc::as_ptr(obj) as usize).hash(state),
            Value::Array(arr) => (Rc::as_ptr(arr) as usize).hash(state),
        }
    }
}

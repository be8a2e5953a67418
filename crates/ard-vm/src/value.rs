//! Runtime values.
//!
//! Lists, maps and structs are plain owned data: copying a value copies its
//! contents, so no two variables ever alias one list. Closures and fibers are
//! reference-counted since they are immutable once created.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem;
use std::sync::Arc;

use ard_bytecode::Constant;
use indexmap::IndexMap;

use crate::fiber::Fiber;

#[derive(Debug, Clone)]
pub enum Value {
    /// Result of a call that yields nothing.
    Void,
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    List(Vec<Value>),
    /// Entries in insertion order.
    Map(IndexMap<MapKey, Value>),
    Maybe(Option<Box<Value>>),
    Result(Result<Box<Value>, Box<Value>>),
    Struct(Box<StructValue>),
    Closure(Arc<Closure>),
    Fiber(Arc<Fiber>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructValue {
    /// Qualified struct name; also the runtime type tag.
    pub name: String,
    pub fields: Vec<Value>,
}

/// A function value: table index plus the values it captured.
#[derive(Debug, Clone, PartialEq)]
pub struct Closure {
    pub function: u32,
    pub captures: Vec<Value>,
}

impl Value {
    pub fn some(value: Value) -> Value {
        Value::Maybe(Some(Box::new(value)))
    }

    pub fn none() -> Value {
        Value::Maybe(None)
    }

    pub fn ok(value: Value) -> Value {
        Value::Result(Ok(Box::new(value)))
    }

    pub fn err(value: Value) -> Value {
        Value::Result(Err(Box::new(value)))
    }

    /// Short name of the value's shape, used in fault messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Void => "Void",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::Str(_) => "Str",
            Value::Bool(_) => "Bool",
            Value::List(_) => "List",
            Value::Map(_) => "Map",
            Value::Maybe(_) => "Maybe",
            Value::Result(_) => "Result",
            Value::Struct(_) => "Struct",
            Value::Closure(_) => "Function",
            Value::Fiber(_) => "Fiber",
        }
    }

    /// Tag matched by union patterns: the primitive name or the struct name.
    pub fn tag(&self) -> Option<&str> {
        match self {
            Value::Int(_) => Some("Int"),
            Value::Float(_) => Some("Float"),
            Value::Str(_) => Some("Str"),
            Value::Bool(_) => Some("Bool"),
            Value::Struct(value) => Some(&value.name),
            _ => None,
        }
    }
}

impl From<&Constant> for Value {
    fn from(constant: &Constant) -> Self {
        match constant {
            Constant::Int(value) => Value::Int(*value),
            Constant::Float(value) => Value::Float(*value),
            Constant::Str(value) => Value::Str(value.clone()),
            Constant::Bool(value) => Value::Bool(*value),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Void, Value::Void) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Maybe(a), Value::Maybe(b)) => a == b,
            (Value::Result(a), Value::Result(b)) => a == b,
            (Value::Struct(a), Value::Struct(b)) => a == b,
            (Value::Closure(a), Value::Closure(b)) => a == b,
            (Value::Fiber(a), Value::Fiber(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// A value in key position. Floats compare by bit pattern here so that every
/// key, NaN included, is equal to itself and can be found again.
#[derive(Debug, Clone)]
pub struct MapKey(pub Value);

impl MapKey {
    pub fn into_inner(self) -> Value {
        self.0
    }
}

impl From<Value> for MapKey {
    fn from(value: Value) -> Self {
        MapKey(value)
    }
}

impl PartialEq for MapKey {
    fn eq(&self, other: &Self) -> bool {
        same_key(&self.0, &other.0)
    }
}

impl Eq for MapKey {}

impl Hash for MapKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_key(&self.0, state);
    }
}

fn same_keys(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(a, b)| same_key(a, b))
}

fn same_key(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
        (Value::List(a), Value::List(b)) => same_keys(a, b),
        (Value::Map(a), Value::Map(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, value)| b.get(key).is_some_and(|other| same_key(value, other)))
        }
        (Value::Maybe(Some(a)), Value::Maybe(Some(b))) => same_key(a, b),
        (Value::Result(Ok(a)), Value::Result(Ok(b)))
        | (Value::Result(Err(a)), Value::Result(Err(b))) => same_key(a, b),
        (Value::Struct(a), Value::Struct(b)) => a.name == b.name && same_keys(&a.fields, &b.fields),
        (Value::Closure(a), Value::Closure(b)) => {
            a.function == b.function && same_keys(&a.captures, &b.captures)
        }
        _ => a == b,
    }
}

fn hash_key<H: Hasher>(value: &Value, state: &mut H) {
    mem::discriminant(value).hash(state);
    match value {
        Value::Void | Value::Maybe(None) => {}
        Value::Int(value) => value.hash(state),
        Value::Float(value) => value.to_bits().hash(state),
        Value::Str(value) => value.hash(state),
        Value::Bool(value) => value.hash(state),
        Value::List(items) => {
            items.len().hash(state);
            items.iter().for_each(|item| hash_key(item, state));
        }
        // Equal maps may differ in order, so only the size is hashed.
        Value::Map(entries) => entries.len().hash(state),
        Value::Maybe(Some(value)) => hash_key(value, state),
        Value::Result(result) => {
            result.is_ok().hash(state);
            match result {
                Ok(value) | Err(value) => hash_key(value, state),
            }
        }
        Value::Struct(value) => {
            value.name.hash(state);
            value.fields.iter().for_each(|field| hash_key(field, state));
        }
        Value::Closure(closure) => {
            closure.function.hash(state);
            closure.captures.iter().for_each(|capture| hash_key(capture, state));
        }
        Value::Fiber(fiber) => (Arc::as_ptr(fiber) as usize).hash(state),
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

fn join(f: &mut fmt::Formatter<'_>, values: &[Value]) -> fmt::Result {
    for (index, value) in values.iter().enumerate() {
        if index > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{value}")?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => write!(f, "void"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value:?}"),
            Value::Str(value) => write!(f, "{value}"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::List(items) => {
                write!(f, "[")?;
                join(f, items)?;
                write!(f, "]")
            }
            Value::Map(entries) => {
                if entries.is_empty() {
                    return write!(f, "[:]");
                }
                write!(f, "[")?;
                for (index, (key, value)) in entries.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                write!(f, "]")
            }
            Value::Maybe(Some(value)) => write!(f, "{value}"),
            Value::Maybe(None) => write!(f, "none"),
            Value::Result(Ok(value)) => write!(f, "ok({value})"),
            Value::Result(Err(value)) => write!(f, "err({value})"),
            Value::Struct(value) => {
                write!(f, "{}(", value.name)?;
                join(f, &value.fields)?;
                write!(f, ")")
            }
            Value::Closure(_) => write!(f, "<function>"),
            Value::Fiber(_) => write!(f, "<fiber>"),
        }
    }
}

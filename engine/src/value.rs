//! Runtime values and value types.
//!
//! Floats are compared with `total_cmp` so that every value can live in
//! ordered and hashed collections.

use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

/// A tuple of a relation
pub type Tuple = Vec<Value>;

/// Scalar column types understood by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ValueType {
    #[serde(rename = "i32")]
    I32,
    #[serde(rename = "i64")]
    I64,
    #[serde(rename = "usize")]
    USize,
    #[serde(rename = "f32")]
    F32,
    #[serde(rename = "f64")]
    F64,
    #[serde(rename = "bool")]
    Bool,
    #[serde(rename = "char")]
    Char,
    #[serde(rename = "String")]
    String,
}

impl ValueType {
    pub fn name(&self) -> &'static str {
        match self {
            ValueType::I32 => "i32",
            ValueType::I64 => "i64",
            ValueType::USize => "usize",
            ValueType::F32 => "f32",
            ValueType::F64 => "f64",
            ValueType::Bool => "bool",
            ValueType::Char => "char",
            ValueType::String => "String",
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, ValueType::I32 | ValueType::I64 | ValueType::USize)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, ValueType::F32 | ValueType::F64)
    }

    /// Convert a value into this type without losing information.
    ///
    /// Integers widen into wider integers and into floats when the float
    /// represents them exactly. `f64` narrows to `f32` because float literals
    /// in programs are always parsed as `f64`.
    pub fn coerce(&self, value: Value) -> Option<Value> {
        if value.value_type() == *self {
            return Some(value);
        }
        match (self, value) {
            (ValueType::I64, Value::I32(i)) => Some(Value::I64(i as i64)),
            (ValueType::I64, Value::USize(u)) => i64::try_from(u).ok().map(Value::I64),
            (ValueType::I32, Value::I64(i)) => i32::try_from(i).ok().map(Value::I32),
            (ValueType::I32, Value::USize(u)) => i32::try_from(u).ok().map(Value::I32),
            (ValueType::USize, Value::I32(i)) => usize::try_from(i).ok().map(Value::USize),
            (ValueType::USize, Value::I64(i)) => usize::try_from(i).ok().map(Value::USize),
            (ValueType::F64, Value::I32(i)) => Some(Value::F64(i as f64)),
            (ValueType::F64, Value::I64(i)) => exact_f64(i as i128).map(Value::F64),
            (ValueType::F64, Value::USize(u)) => exact_f64(u as i128).map(Value::F64),
            (ValueType::F64, Value::F32(f)) => Some(Value::F64(f as f64)),
            (ValueType::F32, Value::F64(f)) => Some(Value::F32(f as f32)),
            (ValueType::F32, Value::I32(i)) => {
                let f = i as f32;
                (f as i32 == i).then_some(Value::F32(f))
            }
            _ => None,
        }
    }
}

fn exact_f64(i: i128) -> Option<f64> {
    let f = i as f64;
    (f as i128 == i).then_some(f)
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "i32" => Ok(ValueType::I32),
            "i64" => Ok(ValueType::I64),
            "usize" => Ok(ValueType::USize),
            "f32" => Ok(ValueType::F32),
            "f64" => Ok(ValueType::F64),
            "bool" => Ok(ValueType::Bool),
            "char" => Ok(ValueType::Char),
            "String" => Ok(ValueType::String),
            other => Err(format!("unknown value type '{}'", other)),
        }
    }
}

/// A runtime value
#[derive(Debug, Clone)]
pub enum Value {
    I32(i32),
    I64(i64),
    USize(usize),
    F32(f32),
    F64(f64),
    Bool(bool),
    Char(char),
    String(Arc<str>),
}

impl Value {
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Arc::from(s.as_ref()))
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Value::I32(_) => ValueType::I32,
            Value::I64(_) => ValueType::I64,
            Value::USize(_) => ValueType::USize,
            Value::F32(_) => ValueType::F32,
            Value::F64(_) => ValueType::F64,
            Value::Bool(_) => ValueType::Bool,
            Value::Char(_) => ValueType::Char,
            Value::String(_) => ValueType::String,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::I32(i) => Some(*i as f64),
            Value::I64(i) => Some(*i as f64),
            Value::USize(u) => Some(*u as f64),
            Value::F32(f) => Some(*f as f64),
            Value::F64(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::I32(_) => 0,
            Value::I64(_) => 1,
            Value::USize(_) => 2,
            Value::F32(_) => 3,
            Value::F64(_) => 4,
            Value::Bool(_) => 5,
            Value::Char(_) => 6,
            Value::String(_) => 7,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::I32(a), Value::I32(b)) => a.cmp(b),
            (Value::I64(a), Value::I64(b)) => a.cmp(b),
            (Value::USize(a), Value::USize(b)) => a.cmp(b),
            (Value::F32(a), Value::F32(b)) => a.total_cmp(b),
            (Value::F64(a), Value::F64(b)) => a.total_cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Char(a), Value::Char(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Value::I32(i) => i.hash(state),
            Value::I64(i) => i.hash(state),
            Value::USize(u) => u.hash(state),
            Value::F32(f) => f.to_bits().hash(state),
            Value::F64(f) => f.to_bits().hash(state),
            Value::Bool(b) => b.hash(state),
            Value::Char(c) => c.hash(state),
            Value::String(s) => s.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I32(i) => write!(f, "{}", i),
            Value::I64(i) => write!(f, "{}", i),
            Value::USize(u) => write!(f, "{}", u),
            Value::F32(x) => write!(f, "{:?}", x),
            Value::F64(x) => write!(f, "{:?}", x),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Char(c) => write!(f, "'{}'", c),
            Value::String(s) => write!(f, "{:?}", s),
        }
    }
}

/// Values serialize by their runtime type: integers as JSON integers, floats
/// as JSON floats, chars as one-character strings.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::I32(i) => serializer.serialize_i32(*i),
            Value::I64(i) => serializer.serialize_i64(*i),
            Value::USize(u) => serializer.serialize_u64(*u as u64),
            Value::F32(f) => serializer.serialize_f32(*f),
            Value::F64(f) => serializer.serialize_f64(*f),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Char(c) => serializer.serialize_char(*c),
            Value::String(s) => serializer.serialize_str(s),
        }
    }
}

/// Render a tuple the way programs write it: `(a, b, c)`
pub fn format_tuple(tuple: &[Value]) -> String {
    let parts: Vec<String> = tuple.iter().map(|v| v.to_string()).collect();
    format!("({})", parts.join(", "))
}

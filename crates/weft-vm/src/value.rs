//! Runtime values and their coercion rules.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Shared backing store of an array value.
///
/// Arrays are VM-session-scoped shared mutable containers: loading an array
/// from a local or global slot copies the handle, not the contents, and
/// equality between arrays is identity of the backing store.
pub type ArrayRef = Rc<RefCell<Vec<Value>>>;

/// Runtime value on the operand stack.
#[derive(Clone, Debug)]
pub enum Value {
    /// Absent value.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer (64-bit signed).
    Int(i64),
    /// Float (64-bit). All arithmetic results carry this tag.
    Float(f64),
    /// String value.
    String(String),
    /// Shared mutable array.
    Array(ArrayRef),
}

impl Value {
    /// Create an array value from its elements.
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    /// Numeric coercion used by arithmetic, comparison, and bitwise ops:
    /// Int/Float as-is, Bool 0/1, String parsed as f64 (0 on failure),
    /// Null and Array 0.
    pub fn as_number(&self) -> f64 {
        match self {
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Int(i) => *i as f64,
            Value::Float(f) => *f,
            Value::String(s) => s.trim().parse().unwrap_or(0.0),
            Value::Array(_) => 0.0,
        }
    }

    /// Boolean coercion: Bool as-is, numbers nonzero, strings and arrays
    /// nonempty, Null false.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Array(items) => !items.borrow().is_empty(),
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    /// The array backing store, if this is an array.
    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Name of this value's tag, for log and error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
        }
    }

    /// Whether `target`'s backing store is reachable from this value.
    ///
    /// Used by ARR_SET/ARR_PUSH to refuse insertions that would make an
    /// array contain itself; with that refusal in place no instruction can
    /// construct a cycle, so the recursive walk terminates.
    pub fn contains_array(&self, target: &ArrayRef) -> bool {
        match self {
            Value::Array(items) => {
                Rc::ptr_eq(items, target)
                    || items.borrow().iter().any(|item| item.contains_array(target))
            }
            _ => false,
        }
    }
}

/// Equality per the value model: same-tag values compare by underlying
/// value, Int/Float cross-tag compares numerically, and arrays compare by
/// identity, never structurally.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Display form used by STR_* ops, string ADD, and DEBUG_PRINT. Arrays are
/// not meaningfully stringifiable and render an opaque placeholder.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Array(items) => write!(f, "[array:{}]", items.borrow().len()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

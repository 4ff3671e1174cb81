//! Value trait implementations: constructors, predicates, extractors,
//! structural equality and the basic-type order

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::rc::Rc;

use indexmap::IndexMap;

use super::refs::address;
use crate::program::Program;
use super::*;

// ═══════════════════════════════════════════════════════════════════
// Convenience Constructors
// ═══════════════════════════════════════════════════════════════════

impl Value {
    /// Create a string value
    pub fn string(s: &str) -> Self {
        Value::String(StringValue::from(s))
    }

    /// Create an array value
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    /// Create a mapping value from key/value pairs
    pub fn mapping(pairs: Vec<(Value, Value)>) -> Self {
        let map: IndexMap<HashableValue, Value> = pairs
            .into_iter()
            .map(|(k, v)| (HashableValue(k), v))
            .collect();
        Value::Mapping(Rc::new(RefCell::new(map)))
    }

    /// Create a multiset value
    pub fn multiset(items: Vec<Value>) -> Self {
        Value::Multiset(Rc::new(RefCell::new(items)))
    }

    /// Create the integer zero, which also stands in for destructed
    /// objects
    pub fn zero() -> Self {
        Value::Int(0)
    }
}

// ═══════════════════════════════════════════════════════════════════
// Type Predicates
// ═══════════════════════════════════════════════════════════════════

impl Value {
    /// Name of the value's kind
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Type(_) => "type",
            Value::Array(_) => "array",
            Value::Mapping(_) => "mapping",
            Value::Multiset(_) => "multiset",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
            Value::Program(_) => "program",
        }
    }

    /// Check if this is an int, float or string: the kinds canonical
    /// encoding can sort
    pub fn is_basic(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_) | Value::String(_))
    }

    /// Check if this is an object that has been destructed, or a
    /// function bound to one
    pub fn is_destructed(&self) -> bool {
        match self {
            Value::Object(o) => o.is_destructed(),
            Value::Function(FunctionRef::Member { object, .. }) => object.is_destructed(),
            _ => false,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// Value Extractors
// ═══════════════════════════════════════════════════════════════════

impl Value {
    /// Extract an integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Extract a float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Extract a string
    pub fn as_string(&self) -> Option<&StringValue> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Extract an array
    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Extract a mapping
    pub fn as_mapping(&self) -> Option<&MappingRef> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    /// Extract a multiset
    pub fn as_multiset(&self) -> Option<&MultisetRef> {
        match self {
            Value::Multiset(m) => Some(m),
            _ => None,
        }
    }

    /// Extract an object
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Extract a function
    pub fn as_function(&self) -> Option<&FunctionRef> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Extract a program
    pub fn as_program(&self) -> Option<&Program> {
        match self {
            Value::Program(p) => Some(p),
            _ => None,
        }
    }

    /// Extract a type
    pub fn as_type(&self) -> Option<&TypeExpr> {
        match self {
            Value::Type(t) => Some(t),
            _ => None,
        }
    }

    /// True when both values are the same shared container, object,
    /// function or program (or equal basic values).
    pub fn same_identity(&self, other: &Value) -> bool {
        Identity::of(self) == Identity::of(other)
    }
}

// ═══════════════════════════════════════════════════════════════════
// From Implementations
// ═══════════════════════════════════════════════════════════════════

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<StringValue> for Value {
    fn from(s: StringValue) -> Self {
        Value::String(s)
    }
}

impl From<Program> for Value {
    fn from(p: Program) -> Self {
        Value::Program(p)
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}

// ═══════════════════════════════════════════════════════════════════
// Structural Equality
// ═══════════════════════════════════════════════════════════════════

impl PartialEq for Value {
    /// Deep comparison. Containers compare element-wise, and a pair of
    /// containers already under comparison counts as equal, so cyclic
    /// graphs terminate. Objects, functions and programs compare by
    /// identity. Floats compare by bit pattern so NaN equals itself.
    fn eq(&self, other: &Self) -> bool {
        let mut visiting = HashSet::new();
        deep_eq(self, other, &mut visiting)
    }
}

fn deep_eq(a: &Value, b: &Value, visiting: &mut HashSet<(usize, usize)>) -> bool {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x.to_bits() == y.to_bits(),
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Type(x), Value::Type(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => {
            if Rc::ptr_eq(x, y) || !visiting.insert((address(x), address(y))) {
                return true;
            }
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(p, q)| deep_eq(p, q, visiting))
        }
        (Value::Mapping(x), Value::Mapping(y)) => {
            if Rc::ptr_eq(x, y) || !visiting.insert((address(x), address(y))) {
                return true;
            }
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len()
                && x.iter().all(|(k, v)| match y.get(k) {
                    Some(w) => deep_eq(v, w, visiting),
                    None => false,
                })
        }
        (Value::Multiset(x), Value::Multiset(y)) => {
            if Rc::ptr_eq(x, y) || !visiting.insert((address(x), address(y))) {
                return true;
            }
            let (x, y) = (x.borrow(), y.borrow());
            if x.len() != y.len() {
                return false;
            }
            let mut used = vec![false; y.len()];
            x.iter().all(|p| {
                let found = y
                    .iter()
                    .enumerate()
                    .position(|(i, q)| !used[i] && deep_eq(p, q, visiting));
                match found {
                    Some(i) => {
                        used[i] = true;
                        true
                    }
                    None => false,
                }
            })
        }
        (Value::Object(x), Value::Object(y)) => x == y,
        (Value::Function(x), Value::Function(y)) => x == y,
        (Value::Program(x), Value::Program(y)) => x == y,
        _ => false,
    }
}

// ═══════════════════════════════════════════════════════════════════
// Basic-Type Order
// ═══════════════════════════════════════════════════════════════════

/// Total order over basic values used by canonical encoding: ints, then
/// floats, then strings; numbers by value (floats by IEEE total order),
/// strings by code point. Returns `None` when either side is not basic.
pub fn compare_basic(a: &Value, b: &Value) -> Option<Ordering> {
    fn rank(v: &Value) -> Option<u8> {
        match v {
            Value::Int(_) => Some(0),
            Value::Float(_) => Some(1),
            Value::String(_) => Some(2),
            _ => None,
        }
    }
    let (ra, rb) = (rank(a)?, rank(b)?);
    if ra != rb {
        return Some(ra.cmp(&rb));
    }
    Some(match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Float(x), Value::Float(y)) => x.total_cmp(y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => Ordering::Equal,
    })
}

//! Value representation for the serialized runtime

mod callable;
mod compound;
mod display;
mod hashable;
mod impls;
mod refs;
mod string;
mod types;

pub use callable::{Builtin, FunctionRef};
pub use compound::{Object, ObjectState};
pub use hashable::HashableValue;
pub use impls::compare_basic;
pub use refs::Identity;
pub use string::StringValue;
pub use types::TypeExpr;

pub(crate) use types::{
    T_AND, T_ARRAY, T_FLOAT, T_FUNCTION, T_INT, T_MANY, T_MAPPING, T_MIXED, T_MULTISET, T_NAME,
    T_NOT, T_OBJECT, T_OR, T_PROGRAM, T_STRING, T_TYPE, T_UNKNOWN, T_VOID, T_ZERO,
};

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::program::Program;

/// Shared, mutable array storage.
pub type ArrayRef = Rc<RefCell<Vec<Value>>>;

/// Shared, mutable mapping storage.
pub type MappingRef = Rc<RefCell<IndexMap<HashableValue, Value>>>;

/// Shared, mutable multiset storage.
pub type MultisetRef = Rc<RefCell<Vec<Value>>>;

/// Runtime value.
///
/// Values are organized into three tiers:
/// - Basic values compared by content (ints, floats, strings, types)
/// - Containers shared by reference, so graphs may be cyclic
/// - Code: programs, their instances and functions
#[derive(Clone)]
pub enum Value {
    // ═══════════════════════════════════════════════════════════════════
    // Basic Values
    // ═══════════════════════════════════════════════════════════════════
    /// Signed integer
    Int(i64),

    /// Double-precision float.
    ///
    /// Encoding keeps 32 significant bits of the mantissa, rounded to
    /// nearest, so a float with more precision decodes to a nearby value
    /// rather than the same one. Zeros, infinities and NaN are exact.
    Float(f64),

    /// Character string
    String(StringValue),

    /// Type expression
    Type(TypeExpr),

    // ═══════════════════════════════════════════════════════════════════
    // Containers
    // ═══════════════════════════════════════════════════════════════════
    /// Ordered sequence
    Array(ArrayRef),

    /// Key/value table
    Mapping(MappingRef),

    /// Bag of values, duplicates allowed
    Multiset(MultisetRef),

    // ═══════════════════════════════════════════════════════════════════
    // Code
    // ═══════════════════════════════════════════════════════════════════
    /// Instance of a program
    Object(Object),

    /// Bound member function or builtin
    Function(FunctionRef),

    /// Compiled program
    Program(Program),
}

//! Identity of shared values

use super::Value;

/// The identity of a value as seen by the encoder's seen table.
///
/// Basic values are keyed by content, everything shared by reference by
/// its address, so two structurally equal arrays are distinct while two
/// equal strings are the same entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    /// Integer by value
    Int(i64),
    /// Float by bit pattern
    Float(u64),
    /// String by content
    String(super::StringValue),
    /// Type by structure
    Type(super::TypeExpr),
    /// Array, mapping, multiset, object or program by address
    Shared(usize),
    /// Bound function: object address plus reference number
    Member(usize, usize),
}

impl Identity {
    /// Identity of `value`.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Int(n) => Identity::Int(*n),
            Value::Float(f) => Identity::Float(f.to_bits()),
            Value::String(s) => Identity::String(s.clone()),
            Value::Type(t) => Identity::Type(t.clone()),
            Value::Array(a) => Identity::Shared(address(a)),
            Value::Mapping(m) => Identity::Shared(address(m)),
            Value::Multiset(m) => Identity::Shared(address(m)),
            Value::Object(o) => Identity::Shared(o.identity()),
            Value::Program(p) => Identity::Shared(p.identity()),
            Value::Function(f) => f.identity(),
        }
    }
}

pub(crate) fn address<T>(rc: &std::rc::Rc<T>) -> usize {
    std::rc::Rc::as_ptr(rc) as *const () as usize
}

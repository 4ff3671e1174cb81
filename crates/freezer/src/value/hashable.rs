//! Hashable wrapper for Value to enable use as mapping keys

use std::hash::{Hash, Hasher};

use super::{Identity, Value};

/// A wrapper for Value that implements Hash and Eq.
///
/// Any value can be a key. Basic values (ints, floats, strings, types)
/// hash and compare by content; arrays, mappings, multisets, objects,
/// functions and programs by identity.
#[derive(Debug, Clone)]
pub struct HashableValue(pub Value);

impl HashableValue {
    /// Check if a value compares by content as a key
    pub fn is_basic(value: &Value) -> bool {
        matches!(
            value,
            Value::Int(_) | Value::Float(_) | Value::String(_) | Value::Type(_)
        )
    }

    /// The wrapped value.
    pub fn value(&self) -> &Value {
        &self.0
    }
}

impl Hash for HashableValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Identity::of(&self.0).hash(state);
    }
}

impl PartialEq for HashableValue {
    fn eq(&self, other: &Self) -> bool {
        Identity::of(&self.0) == Identity::of(&other.0)
    }
}

impl Eq for HashableValue {}

impl From<Value> for HashableValue {
    fn from(value: Value) -> Self {
        HashableValue(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_basic_keys_by_content() {
        let mut set = HashSet::new();
        set.insert(HashableValue(Value::string("a")));
        assert!(set.contains(&HashableValue(Value::string("a"))));
        assert!(!set.contains(&HashableValue(Value::Int(1))));
    }

    #[test]
    fn test_containers_by_identity() {
        let a = Value::array(vec![Value::Int(1)]);
        let b = Value::array(vec![Value::Int(1)]);
        assert_eq!(HashableValue(a.clone()), HashableValue(a.clone()));
        assert_ne!(HashableValue(a), HashableValue(b));
    }

    #[test]
    fn test_int_and_float_keys_differ() {
        assert_ne!(HashableValue(Value::Int(1)), HashableValue(Value::Float(1.0)));
    }
}

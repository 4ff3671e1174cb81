//! External resolution hooks.
//!
//! A [`Codec`] lets the embedder replace values that should not (or
//! cannot) be serialized structurally with a name, and turn such names
//! back into live values when decoding. It also owns the payload format
//! of objects that are cloned structurally.

use std::collections::HashMap;

use crate::decoder::DecodeSession;
use crate::error::{FreezerError, Result};
use crate::value::{HashableValue, Identity, Object, Value};

/// Resolution hooks consulted by the encoder and decoder.
///
/// Every method has a default, so an implementation only overrides the
/// hooks it cares about.
pub trait Codec {
    /// Name for an object, function or program, or `None` to encode it
    /// structurally.
    fn nameof(&self, _value: &Value) -> Result<Option<Value>> {
        Ok(None)
    }

    /// Resolve a name written by [`Codec::nameof`] for an object.
    fn objectof(&self, name: &Value) -> Result<Value> {
        Err(FreezerError::codec(format!("Cannot resolve object {:?}", name)))
    }

    /// Resolve a name written by [`Codec::nameof`] for a function.
    fn functionof(&self, name: &Value) -> Result<Value> {
        Err(FreezerError::codec(format!("Cannot resolve function {:?}", name)))
    }

    /// Resolve a name written by [`Codec::nameof`] for a program.
    fn programof(&self, name: &Value) -> Result<Value> {
        Err(FreezerError::codec(format!("Cannot resolve program {:?}", name)))
    }

    /// Payload stored after a structurally cloned object. The default
    /// is the array of its visible variables.
    fn encode_object(&self, object: &Object) -> Result<Value> {
        Ok(Value::array(object.state_values()))
    }

    /// Restore `object` from its payload. Returning an array asks the
    /// decoder to pass it to [`Object::create`].
    ///
    /// `session` allows nested decodes from inside the hook.
    fn decode_object(
        &self,
        _object: &Object,
        payload: Value,
        _session: &mut DecodeSession,
    ) -> Result<Option<Value>> {
        Ok(Some(payload))
    }
}

/// Codec with no names: every object, function and program is encoded
/// structurally, and objects round-trip through their visible variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCodec;

impl Codec for DefaultCodec {}

/// Codec backed by a two-way name registry.
///
/// ```
/// use freezer::{decode_value, encode_value, FunctionRef, NameCodec, Value};
///
/// let print = Value::Function(FunctionRef::builtin("print"));
/// let mut codec = NameCodec::new();
/// codec.register("print", print.clone());
///
/// let bytes = encode_value(&print, Some(&codec)).unwrap();
/// let back = decode_value(&bytes, Some(&codec)).unwrap();
/// assert!(back.same_identity(&print));
/// ```
#[derive(Debug, Default)]
pub struct NameCodec {
    by_name: HashMap<HashableValue, Value>,
    by_value: HashMap<Identity, Value>,
}

impl NameCodec {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `value` under `name`. A later registration of the same
    /// name or value replaces the earlier one.
    pub fn register(&mut self, name: &str, value: Value) {
        let name = Value::string(name);
        self.by_value.insert(Identity::of(&value), name.clone());
        self.by_name.insert(HashableValue(name), value);
    }

    /// Number of registered names.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    fn lookup(&self, name: &Value, kind: &str) -> Result<Value> {
        self.by_name
            .get(&HashableValue(name.clone()))
            .cloned()
            .ok_or_else(|| FreezerError::codec(format!("Unknown {} name {:?}", kind, name)))
    }
}

impl Codec for NameCodec {
    fn nameof(&self, value: &Value) -> Result<Option<Value>> {
        Ok(self.by_value.get(&Identity::of(value)).cloned())
    }

    fn objectof(&self, name: &Value) -> Result<Value> {
        self.lookup(name, "object")
    }

    fn functionof(&self, name: &Value) -> Result<Value> {
        self.lookup(name, "function")
    }

    fn programof(&self, name: &Value) -> Result<Value> {
        self.lookup(name, "program")
    }
}

/// Identity of a codec for the re-entrancy guard; `None` is the
/// built-in default.
pub(crate) fn codec_key(codec: Option<&dyn Codec>) -> usize {
    codec.map_or(0, |c| c as *const _ as *const () as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::FunctionRef;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_codec_has_no_names() {
        let codec = DefaultCodec;
        assert!(codec.nameof(&Value::Int(1)).unwrap().is_none());
        assert!(matches!(
            codec.programof(&Value::string("x")),
            Err(FreezerError::Codec(_))
        ));
    }

    #[test]
    fn test_name_codec_both_directions() {
        let f = Value::Function(FunctionRef::builtin("write"));
        let mut codec = NameCodec::new();
        codec.register("write", f.clone());
        assert_eq!(codec.len(), 1);
        assert_eq!(codec.nameof(&f).unwrap(), Some(Value::string("write")));
        assert!(codec.functionof(&Value::string("write")).unwrap().same_identity(&f));
        assert!(codec.functionof(&Value::string("read")).is_err());
    }

    #[test]
    fn test_name_codec_ignores_lookalikes() {
        let mut codec = NameCodec::new();
        codec.register("a", Value::array(vec![]));
        assert_eq!(codec.nameof(&Value::array(vec![])).unwrap(), None);
    }
}

//! Content fingerprints of basic value graphs

use std::fmt;

use sha2::{Digest, Sha256};

use crate::context::EncodeOptions;
use crate::encoder::Encoder;
use crate::error::Result;
use crate::value::Value;

/// SHA-256 of a value's canonical encoding.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lower-case hex digest.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

/// Fingerprint `value`. Structurally equal values built in any order
/// get the same fingerprint; values holding objects, functions,
/// programs or types are rejected as `Unsupported`.
pub fn fingerprint(value: &Value) -> Result<Fingerprint> {
    let bytes = Encoder::with_options(EncodeOptions::canonical()).encode(value, None)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let result = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    Ok(Fingerprint(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FreezerError;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_insertion_order_does_not_matter() {
        let a = Value::mapping(vec![
            (Value::string("b"), Value::Int(2)),
            (Value::string("a"), Value::Int(1)),
        ]);
        let b = Value::mapping(vec![
            (Value::string("a"), Value::Int(1)),
            (Value::string("b"), Value::Int(2)),
        ]);
        assert_eq!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
        assert_ne!(fingerprint(&a).unwrap(), fingerprint(&Value::Int(1)).unwrap());
    }

    #[test]
    fn test_hex_display() {
        let fp = fingerprint(&Value::Int(0)).unwrap();
        let hex = fp.to_string();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(format!("{:?}", fp).starts_with("Fingerprint("));
    }

    #[test]
    fn test_types_are_rejected() {
        let err = fingerprint(&Value::Type(crate::value::TypeExpr::int())).unwrap_err();
        assert!(matches!(err, FreezerError::Unsupported(_)));
    }
}

//! # Freezer
//!
//! A serialization engine for the value graphs of a dynamic runtime.
//!
//! Freezer turns a graph of runtime values (integers, floats, strings,
//! arrays, mappings, multisets, types, objects, functions and compiled
//! programs) into a compact byte stream and back. Sharing and cycles
//! survive the round trip: a value reachable twice decodes to one value
//! reachable twice. Values that should not travel structurally can be
//! swapped for names through a [`Codec`].
//!
//! ## Architecture
//!
//! - **Entries** (`entry`): one tag plus a variable-length number
//! - **Encoder**: depth-first walk with a seen table for back-references
//! - **Decoder**: the mirror walk with a sequence table, plus a queue of
//!   programs and objects waiting on unfinished inherits
//! - **Programs** (`program`): member tables, inherits and lifecycle,
//!   and the body layout they are written in
//! - **Codec**: name resolution and object payloads
//!
//! ```
//! use freezer::{decode_value, encode_value, Value};
//!
//! let shared = Value::string("ab");
//! let value = Value::array(vec![Value::Int(5), shared.clone(), shared]);
//! let bytes = encode_value(&value, None).unwrap();
//! assert_eq!(decode_value(&bytes, None).unwrap(), value);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod context;
pub mod decoder;
pub mod encoder;
pub mod entry;
pub mod error;
pub mod fingerprint;
pub mod legacy;
pub mod program;
pub mod trace;
pub mod value;

mod program_codec;

// Re-export main types
pub use codec::{Codec, DefaultCodec, NameCodec};
pub use context::{DecodeOptions, EncodeOptions};
pub use decoder::{DecodeSession, Decoder};
pub use encoder::Encoder;
pub use error::{FreezerError, Result};
pub use fingerprint::{fingerprint, Fingerprint};
pub use program::{
    FunctionBody, MemberFlags, MemberKind, MemberRef, Program, ProgramBuilder, ProgramFlags,
};
pub use trace::{disassemble, Trace};
pub use value::{
    compare_basic, FunctionRef, HashableValue, Object, ObjectState, StringValue, TypeExpr, Value,
};

/// Freezer version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Encode `value` with default options.
pub fn encode_value(value: &Value, codec: Option<&dyn Codec>) -> Result<Vec<u8>> {
    Encoder::new().encode(value, codec)
}

/// Encode `value` canonically: equal basic values give equal bytes.
pub fn encode_value_canonic(value: &Value, codec: Option<&dyn Codec>) -> Result<Vec<u8>> {
    Encoder::with_options(EncodeOptions::canonical()).encode(value, codec)
}

/// Decode `bytes` with default options.
pub fn decode_value(bytes: &[u8], codec: Option<&dyn Codec>) -> Result<Value> {
    Decoder::new().decode(bytes, codec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }
}

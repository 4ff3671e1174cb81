//! Decoder for the flat-tag format that predates the magic prefix.
//!
//! Every value is a tag integer followed by a payload integer. Integers
//! are length-prefixed: a first byte with the high bit set carries the
//! value in its low seven bits; otherwise its low three bits give the
//! number of big-endian bytes that follow and bit 3 marks a negative
//! value. There is no sharing and no back-references.

use tracing::debug;

use crate::codec::Codec;
use crate::context::DEFAULT_MAX_DEPTH;
use crate::decoder::ldexp;
use crate::entry::{
    tag_name, Reader, TAG_ARRAY, TAG_FLOAT, TAG_FUNCTION, TAG_INT, TAG_MAPPING, TAG_MULTISET,
    TAG_OBJECT, TAG_PROGRAM, TAG_STRING, TAG_TYPE,
};
use crate::error::{FreezerError, Result};
use crate::value::{StringValue, Value};

/// Decode a value in the flat-tag format.
///
/// ```
/// use freezer::{legacy::decode_legacy, DefaultCodec, Value};
///
/// // INT 5
/// let bytes = [0x88, 0x85];
/// assert_eq!(decode_legacy(&bytes, &DefaultCodec).unwrap(), Value::Int(5));
/// ```
pub fn decode_legacy(bytes: &[u8], codec: &dyn Codec) -> Result<Value> {
    let mut decoder = LegacyDecoder {
        reader: Reader::new(bytes),
        codec,
        depth: 0,
    };
    let value = decoder.value()?;
    if !decoder.reader.is_at_end() {
        return Err(FreezerError::format(format!(
            "{} bytes of trailing data after legacy value",
            decoder.reader.remaining()
        )));
    }
    debug!(len = bytes.len(), "decoded legacy value");
    Ok(value)
}

struct LegacyDecoder<'a> {
    reader: Reader<'a>,
    codec: &'a dyn Codec,
    depth: usize,
}

impl LegacyDecoder<'_> {
    fn int(&mut self) -> Result<i64> {
        let b = self.reader.read_u8()?;
        if b & 0x80 != 0 {
            return Ok(i64::from(b & 0x7f));
        }
        if (b & !8) > 4 {
            return Err(FreezerError::format(format!("Invalid legacy integer prefix {:#04x}", b)));
        }
        let mut n: i64 = 0;
        for &byte in self.reader.read_bytes(usize::from(b & 7))? {
            n = (n << 8) | i64::from(byte);
        }
        Ok(if b & 8 != 0 { -n } else { n })
    }

    fn size(&mut self, what: &str) -> Result<usize> {
        let n = self.int()?;
        let size = usize::try_from(n)
            .map_err(|_| FreezerError::format(format!("Negative legacy {} size {}", what, n)))?;
        if size > self.reader.remaining() {
            return Err(FreezerError::format(format!(
                "Legacy {} size {} exceeds the remaining input",
                what, size
            )));
        }
        Ok(size)
    }

    fn value(&mut self) -> Result<Value> {
        if self.depth >= DEFAULT_MAX_DEPTH {
            return Err(FreezerError::DepthExceeded {
                max_depth: DEFAULT_MAX_DEPTH,
            });
        }
        self.depth += 1;
        let result = self.value_inner();
        self.depth -= 1;
        result
    }

    fn value_inner(&mut self) -> Result<Value> {
        let tag = self.int()?;
        let tag = u8::try_from(tag)
            .map_err(|_| FreezerError::format(format!("Unknown legacy tag {}", tag)))?;
        match tag {
            TAG_INT => self.int().map(Value::Int),
            TAG_FLOAT => {
                let mantissa = self.int()?;
                let exponent = self.int()?;
                Ok(Value::Float(ldexp(mantissa as f64, exponent)))
            }
            TAG_STRING => {
                let len = self.size("string")?;
                Ok(Value::String(StringValue::from_bytes(self.reader.read_bytes(len)?.to_vec())))
            }
            TAG_ARRAY | TAG_MULTISET => {
                let len = self.size(tag_name(tag))?;
                let mut items = Vec::with_capacity(len);
                for _ in 0..len {
                    items.push(self.value()?);
                }
                Ok(if tag == TAG_ARRAY {
                    Value::array(items)
                } else {
                    Value::multiset(items)
                })
            }
            TAG_MAPPING => {
                let len = self.size("mapping")?;
                let mut pairs = Vec::with_capacity(len);
                for _ in 0..len {
                    let k = self.value()?;
                    let v = self.value()?;
                    pairs.push((k, v));
                }
                Ok(Value::mapping(pairs))
            }
            TAG_OBJECT | TAG_FUNCTION | TAG_PROGRAM => {
                let len = self.size(tag_name(tag))?;
                let name = Value::String(StringValue::from_bytes(self.reader.read_bytes(len)?.to_vec()));
                match tag {
                    TAG_OBJECT => self.codec.objectof(&name),
                    TAG_FUNCTION => self.codec.functionof(&name),
                    _ => self.codec.programof(&name),
                }
            }
            TAG_TYPE => Err(FreezerError::unsupported("Types in the legacy format")),
            other => Err(FreezerError::format(format!("Unknown legacy tag {}", other))),
        }
    }
}

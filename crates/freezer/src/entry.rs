//! Tag/varint entries and the byte cursor they are read from.
//!
//! Every item in an encoded stream starts with one tag byte:
//!
//! ```text
//!  7   6   5     4    3..0
//! [size ] small neg   tag
//! ```
//!
//! Magnitudes below [`MAX_SMALL`] live in the size bits. Larger ones are
//! followed by one to four big-endian bytes, each length class covering
//! a disjoint range so that every integer has exactly one encoding.

use crate::error::{FreezerError, Result};

/// Four bytes every stream starts with
pub const MAGIC: &[u8; 4] = b"\xb6ke0";

/// Array of values
pub const TAG_ARRAY: u8 = 0;
/// Mapping of key/value pairs
pub const TAG_MAPPING: u8 = 1;
/// Multiset of values
pub const TAG_MULTISET: u8 = 2;
/// Object instance (also carries the bignum shortcut)
pub const TAG_OBJECT: u8 = 3;
/// Function reference
pub const TAG_FUNCTION: u8 = 4;
/// Program
pub const TAG_PROGRAM: u8 = 5;
/// String
pub const TAG_STRING: u8 = 6;
/// Float mantissa or exponent
pub const TAG_FLOAT: u8 = 7;
/// Integer
pub const TAG_INT: u8 = 8;
/// Type expression
pub const TAG_TYPE: u8 = 9;
/// Body of a program that was emitted earlier as an embryo
pub const TAG_DELAYED: u8 = 14;
/// Back-reference to an earlier sequence id
pub const TAG_AGAIN: u8 = 15;

/// Mask selecting the kind bits of a tag byte
pub const TAG_MASK: u8 = 0x0f;
/// Set when the stored magnitude is the one's complement of the value
pub const TAG_NEG: u8 = 0x10;
/// Set when the magnitude is packed into the size bits
pub const TAG_SMALL: u8 = 0x20;
/// Position of the size bits
pub const SIZE_SHIFT: u8 = 6;
/// Magnitudes below this fit in the tag byte
pub const MAX_SMALL: i64 = 4;
/// First sequence id handed out by encoder and decoder
pub const COUNTER_START: i64 = -MAX_SMALL;

/// Largest magnitude the four length classes can carry.
pub const MAX_MAGNITUDE: i64 = MAX_SMALL + 0x100 + 0x1_0000 + 0x100_0000 + 0xffff_ffff;

/// Name of a tag for diagnostics.
pub fn tag_name(tag: u8) -> &'static str {
    match tag & TAG_MASK {
        TAG_ARRAY => "array",
        TAG_MAPPING => "mapping",
        TAG_MULTISET => "multiset",
        TAG_OBJECT => "object",
        TAG_FUNCTION => "function",
        TAG_PROGRAM => "program",
        TAG_STRING => "string",
        TAG_FLOAT => "float",
        TAG_INT => "int",
        TAG_TYPE => "type",
        TAG_DELAYED => "delayed",
        TAG_AGAIN => "again",
        _ => "unknown",
    }
}

/// A decoded tag byte plus its magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    /// Kind bits (0..=15)
    pub tag: u8,
    /// Signed payload
    pub num: i64,
}

// ═══════════════════════════════════════════════════════════════════
// Writer
// ═══════════════════════════════════════════════════════════════════

/// Append-only output buffer.
#[derive(Debug, Default, Clone)]
pub struct Writer {
    bytes: Vec<u8>,
}

impl Writer {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes written so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the writer, returning its buffer.
    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }

    /// Current length, used as a patch position.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Appends one byte.
    pub fn write_u8(&mut self, b: u8) {
        self.bytes.push(b);
    }

    /// Appends raw bytes.
    pub fn write_bytes(&mut self, b: &[u8]) {
        self.bytes.extend_from_slice(b);
    }

    /// Appends a big-endian `u32`.
    pub fn write_be32(&mut self, v: u32) {
        self.bytes.extend_from_slice(&v.to_be_bytes());
    }

    /// Overwrites a byte written earlier.
    pub fn patch_u8(&mut self, at: usize, b: u8) -> Result<()> {
        let slot = self
            .bytes
            .get_mut(at)
            .ok_or_else(|| FreezerError::format(format!("patch offset {at} out of range")))?;
        *slot = b;
        Ok(())
    }

    /// Writes a tag byte with its magnitude.
    pub fn write_entry(&mut self, tag: u8, num: i64) -> Result<()> {
        let mut tag = tag & TAG_MASK;
        let mut num = num;
        if num < 0 {
            tag |= TAG_NEG;
            num = !num;
        }

        if num < MAX_SMALL {
            self.write_u8(tag | TAG_SMALL | ((num as u8) << SIZE_SHIFT));
            return Ok(());
        }
        if num > MAX_MAGNITUDE {
            return Err(FreezerError::unsupported(format!(
                "entry magnitude {num} does not fit in four length bytes"
            )));
        }
        num -= MAX_SMALL;

        let mut class = 0u8;
        while class < 3 {
            let span = 0x100i64 << (8 * class);
            if num >= span {
                num -= span;
                class += 1;
            } else {
                break;
            }
        }

        self.write_u8(tag | (class << SIZE_SHIFT));
        for i in (0..=class).rev() {
            self.write_u8(((num >> (8 * i)) & 0xff) as u8);
        }
        Ok(())
    }

    /// Writes a program-structure number: the low nibble travels in the
    /// kind bits, the rest in the magnitude.
    pub fn write_number(&mut self, num: i64) -> Result<()> {
        self.write_entry((num & 0x0f) as u8, num >> 4)
    }
}

// ═══════════════════════════════════════════════════════════════════
// Reader
// ═══════════════════════════════════════════════════════════════════

/// Bounds-checked cursor over an input buffer.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    /// Creates a reader over `bytes`.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    /// Current cursor offset.
    pub fn position(&self) -> usize {
        self.offset
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    /// True once every byte has been consumed.
    pub fn is_at_end(&self) -> bool {
        self.offset >= self.bytes.len()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .offset
            .checked_add(len)
            .ok_or_else(|| FreezerError::format("Not enough data"))?;
        let slice = self
            .bytes
            .get(self.offset..end)
            .ok_or_else(|| FreezerError::format("Not enough data"))?;
        self.offset = end;
        Ok(slice)
    }

    /// Reads one byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Reads `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.take(len)
    }

    /// Reads a big-endian `u32`.
    pub fn read_be32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Reads a tag byte and its magnitude.
    pub fn read_entry(&mut self) -> Result<Entry> {
        let what = self.read_u8()?;
        let class = what >> SIZE_SHIFT;
        let mut num: i64 = if what & TAG_SMALL != 0 {
            i64::from(class)
        } else {
            let mut n = 0i64;
            for _ in 0..=class {
                n = (n << 8) + i64::from(self.read_u8()?) + 1;
            }
            n + MAX_SMALL - 1
        };
        if what & TAG_NEG != 0 {
            num = !num;
        }
        Ok(Entry {
            tag: what & TAG_MASK,
            num,
        })
    }

    /// Reads an entry and requires its kind to be `tag`.
    pub fn expect_entry(&mut self, tag: u8) -> Result<i64> {
        let entry = self.read_entry()?;
        if entry.tag != tag {
            return Err(FreezerError::format(format!(
                "Wrong bits ({}), expected {}",
                entry.tag,
                tag_name(tag)
            )));
        }
        Ok(entry.num)
    }

    /// Reads a program-structure number written by [`Writer::write_number`].
    pub fn read_number(&mut self) -> Result<i64> {
        let entry = self.read_entry()?;
        Ok(i64::from(entry.tag) | (entry.num << 4))
    }
}

//! Shared strings stored at the narrowest character width

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Repr {
    Narrow(Vec<u8>),
    Wide16(Vec<u16>),
    Wide32(Vec<u32>),
}

/// An immutable character string.
///
/// Characters are stored with the smallest unit that holds all of them
/// (8, 16 or 32 bits). Every constructor normalizes, so two equal strings
/// always share the same width and derived equality and hashing are
/// content-based.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct StringValue(Rc<Repr>);

impl StringValue {
    /// Build from raw 8-bit characters.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        StringValue(Rc::new(Repr::Narrow(bytes.into())))
    }

    /// Build from code points, picking the narrowest width.
    pub fn from_chars(chars: impl IntoIterator<Item = u32>) -> Self {
        let chars: Vec<u32> = chars.into_iter().collect();
        let max = chars.iter().copied().max().unwrap_or(0);
        let repr = if max <= 0xff {
            Repr::Narrow(chars.into_iter().map(|c| c as u8).collect())
        } else if max <= 0xffff {
            Repr::Wide16(chars.into_iter().map(|c| c as u16).collect())
        } else {
            Repr::Wide32(chars)
        };
        StringValue(Rc::new(repr))
    }

    /// Width class: 0 for 8-bit, 1 for 16-bit, 2 for 32-bit units.
    pub fn shift(&self) -> u8 {
        match &*self.0 {
            Repr::Narrow(_) => 0,
            Repr::Wide16(_) => 1,
            Repr::Wide32(_) => 2,
        }
    }

    /// Number of characters.
    pub fn len(&self) -> usize {
        match &*self.0 {
            Repr::Narrow(b) => b.len(),
            Repr::Wide16(w) => w.len(),
            Repr::Wide32(w) => w.len(),
        }
    }

    /// True for the empty string.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw bytes of a narrow string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &*self.0 {
            Repr::Narrow(b) => Some(b),
            _ => None,
        }
    }

    /// Iterate over code points.
    pub fn chars(&self) -> Box<dyn Iterator<Item = u32> + '_> {
        match &*self.0 {
            Repr::Narrow(b) => Box::new(b.iter().map(|&c| u32::from(c))),
            Repr::Wide16(w) => Box::new(w.iter().map(|&c| u32::from(c))),
            Repr::Wide32(w) => Box::new(w.iter().copied()),
        }
    }

    /// Big-endian bytes of the string's units, as stored on the wire.
    pub fn to_be_units(&self) -> Vec<u8> {
        match &*self.0 {
            Repr::Narrow(b) => b.clone(),
            Repr::Wide16(w) => w.iter().flat_map(|c| c.to_be_bytes()).collect(),
            Repr::Wide32(w) => w.iter().flat_map(|c| c.to_be_bytes()).collect(),
        }
    }

    /// Lossy conversion to a Rust string (code points outside Unicode
    /// become U+FFFD).
    pub fn to_string_lossy(&self) -> String {
        self.chars()
            .map(|c| char::from_u32(c).unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect()
    }

    /// True when this is the same shared allocation as `other`.
    pub fn ptr_eq(&self, other: &StringValue) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl From<&str> for StringValue {
    fn from(s: &str) -> Self {
        StringValue::from_chars(s.chars().map(u32::from))
    }
}

impl From<String> for StringValue {
    fn from(s: String) -> Self {
        StringValue::from(s.as_str())
    }
}

impl PartialOrd for StringValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StringValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.chars().cmp(other.chars())
    }
}

impl fmt::Debug for StringValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string_lossy())
    }
}

impl fmt::Display for StringValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_is_normalized() {
        assert_eq!(StringValue::from("abc").shift(), 0);
        assert_eq!(StringValue::from("é").shift(), 0);
        assert_eq!(StringValue::from("€").shift(), 1);
        assert_eq!(StringValue::from("𝄞").shift(), 2);
        assert_eq!(StringValue::from_chars([0x61, 0x62]), StringValue::from("ab"));
    }

    #[test]
    fn test_big_endian_units() {
        let s = StringValue::from_chars([0x20ac, 0x41]);
        assert_eq!(s.to_be_units(), vec![0x20, 0xac, 0x00, 0x41]);
    }

    #[test]
    fn test_ordering_by_code_point() {
        assert!(StringValue::from("a") < StringValue::from("b"));
        assert!(StringValue::from("ab") < StringValue::from("€"));
        assert!(StringValue::from("") < StringValue::from("a"));
    }
}

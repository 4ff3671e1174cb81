//! Tests for the tag-and-length entry encoding

use freezer::entry::*;
use pretty_assertions::assert_eq;

fn round_trip(tag: u8, num: i64) -> (Entry, usize) {
    let mut w = Writer::new();
    w.write_entry(tag, num).unwrap();
    let bytes = w.into_vec();
    let mut r = Reader::new(&bytes);
    let entry = r.read_entry().unwrap();
    assert!(r.is_at_end(), "{} left bytes behind", num);
    (entry, bytes.len())
}

// ═══════════════════════════════════════════════════════════════════════
// Length Class Boundaries
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_every_length_class_boundary() {
    let class1 = MAX_SMALL + 0x100;
    let class2 = class1 + 0x1_0000;
    let class3 = class2 + 0x100_0000;
    let cases = [
        (0, 1),
        (MAX_SMALL - 1, 1),
        (MAX_SMALL, 2),
        (class1 - 1, 2),
        (class1, 3),
        (class2 - 1, 3),
        (class2, 4),
        (class3 - 1, 4),
        (class3, 5),
        (MAX_MAGNITUDE, 5),
    ];
    for (num, len) in cases {
        for tag in [TAG_INT, TAG_STRING, TAG_AGAIN] {
            let (entry, written) = round_trip(tag, num);
            assert_eq!(entry, Entry { tag, num });
            assert_eq!(written, len, "length of {}", num);

            let (entry, written) = round_trip(tag, -num - 1);
            assert_eq!(entry.num, -num - 1);
            assert_eq!(written, len, "length of {}", -num - 1);
        }
    }
}

#[test]
fn test_magnitude_limit() {
    let mut w = Writer::new();
    assert!(w.write_entry(TAG_INT, MAX_MAGNITUDE + 1).is_err());
    assert!(w.write_entry(TAG_INT, -MAX_MAGNITUDE - 2).is_err());
    assert!(w.write_entry(TAG_INT, -MAX_MAGNITUDE - 1).is_ok());
}

#[test]
fn test_dense_range_is_a_bijection() {
    let mut w = Writer::new();
    for num in -70_000..70_000 {
        w.write_entry(TAG_MAPPING, num).unwrap();
    }
    let bytes = w.into_vec();
    let mut r = Reader::new(&bytes);
    for num in -70_000..70_000 {
        assert_eq!(r.read_entry().unwrap().num, num);
    }
    assert!(r.is_at_end());
}

// ═══════════════════════════════════════════════════════════════════════
// Program Numbers
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_numbers_use_the_kind_bits() {
    let values = [0, 1, 15, 16, -1, -2, -16, -17, 1234, 4321, 0xffff, -(1 << 30), 1 << 35];
    let mut w = Writer::new();
    for &n in &values {
        w.write_number(n).unwrap();
    }
    let bytes = w.into_vec();
    let mut r = Reader::new(&bytes);
    for &n in &values {
        assert_eq!(r.read_number().unwrap(), n);
    }
}

#[test]
fn test_truncated_entry() {
    let mut w = Writer::new();
    w.write_entry(TAG_INT, 100_000).unwrap();
    let bytes = w.into_vec();
    let mut r = Reader::new(&bytes[..bytes.len() - 1]);
    assert!(r.read_entry().unwrap_err().is_format());
}

#[test]
fn test_expect_entry_checks_kind() {
    let mut w = Writer::new();
    w.write_entry(TAG_FLOAT, 3).unwrap();
    let bytes = w.into_vec();
    assert_eq!(Reader::new(&bytes).expect_entry(TAG_FLOAT).unwrap(), 3);
    assert!(Reader::new(&bytes).expect_entry(TAG_INT).is_err());
}

//! Malformed input must fail with an error, never a panic

use freezer::entry::*;
use freezer::*;
use pretty_assertions::assert_eq;

/// Stream with the magic prefix followed by `build`'s entries.
fn stream(build: impl FnOnce(&mut Writer)) -> Vec<u8> {
    let mut w = Writer::new();
    w.write_bytes(MAGIC);
    build(&mut w);
    w.into_vec()
}

fn decode_err(bytes: &[u8]) -> FreezerError {
    decode_value(bytes, None).unwrap_err()
}

// ═══════════════════════════════════════════════════════════════════════
// Framing
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_magic_without_value() {
    assert!(decode_err(MAGIC).is_format());
}

#[test]
fn test_every_strict_prefix_fails() {
    let value = Value::array(vec![
        Value::Int(300),
        Value::string("héllo"),
        Value::mapping(vec![(Value::Float(2.5), Value::Int(1 << 40))]),
    ]);
    let bytes = encode_value(&value, None).unwrap();
    let decoder = Decoder::with_options(DecodeOptions::new().with_legacy(false));
    for len in 0..bytes.len() {
        assert!(decoder.decode(&bytes[..len], None).is_err(), "prefix of {}", len);
    }
    assert_eq!(decoder.decode(&bytes, None).unwrap(), value);
}

#[test]
fn test_trailing_entry() {
    let bytes = stream(|w| {
        w.write_entry(TAG_INT, 1).unwrap();
        w.write_entry(TAG_INT, 2).unwrap();
    });
    assert!(decode_err(&bytes).is_format());
}

#[test]
fn test_unknown_tag() {
    let bytes = stream(|w| w.write_entry(10, 0).unwrap());
    assert!(decode_err(&bytes).is_format());
}

// ═══════════════════════════════════════════════════════════════════════
// Sizes and References
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_negative_sizes() {
    for tag in [TAG_ARRAY, TAG_MAPPING, TAG_MULTISET] {
        let bytes = stream(|w| w.write_entry(tag, -1).unwrap());
        assert!(decode_err(&bytes).is_format(), "{}", tag_name(tag));
    }
    let bytes = stream(|w| w.write_entry(TAG_STRING, -2).unwrap());
    assert!(decode_err(&bytes).is_format());
}

#[test]
fn test_sizes_beyond_the_input() {
    let bytes = stream(|w| w.write_entry(TAG_ARRAY, 1_000_000).unwrap());
    assert!(decode_err(&bytes).is_format());

    let bytes = stream(|w| {
        w.write_entry(TAG_STRING, 10).unwrap();
        w.write_bytes(b"abc");
    });
    assert!(decode_err(&bytes).is_format());
}

#[test]
fn test_back_reference_to_unknown_id() {
    let bytes = stream(|w| {
        w.write_entry(TAG_ARRAY, 1).unwrap();
        w.write_entry(TAG_AGAIN, 7).unwrap();
    });
    assert!(decode_err(&bytes).is_format());
}

#[test]
fn test_illegal_wide_string_shift() {
    let bytes = stream(|w| {
        w.write_entry(TAG_STRING, -1).unwrap();
        w.write_entry(3, 1).unwrap();
        w.write_bytes(&[0, 0, 0, 0x41]);
    });
    assert!(decode_err(&bytes).is_format());
}

// ═══════════════════════════════════════════════════════════════════════
// Scalar Encodings
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_bad_float_special() {
    let bytes = stream(|w| {
        w.write_entry(TAG_FLOAT, 0).unwrap();
        w.write_entry(TAG_FLOAT, 5).unwrap();
    });
    assert!(decode_err(&bytes).is_format());
}

#[test]
fn test_float_exponent_must_follow() {
    let bytes = stream(|w| {
        w.write_entry(TAG_FLOAT, 3).unwrap();
        w.write_entry(TAG_INT, -1).unwrap();
    });
    assert!(decode_err(&bytes).is_format());
}

#[test]
fn test_bignum_out_of_range() {
    let bytes = stream(|w| {
        w.write_entry(TAG_OBJECT, 2).unwrap();
        w.write_entry(TAG_STRING, 16).unwrap();
        w.write_bytes(b"zzzzzzzzzzzzzzzz");
    });
    assert!(decode_err(&bytes).is_format());
}

#[test]
fn test_unknown_codings() {
    let bytes = stream(|w| w.write_entry(TAG_OBJECT, 7).unwrap());
    assert!(decode_err(&bytes).is_format());

    let bytes = stream(|w| w.write_entry(TAG_FUNCTION, 2).unwrap());
    assert!(decode_err(&bytes).is_format());

    let bytes = stream(|w| w.write_entry(TAG_TYPE, 1).unwrap());
    assert!(decode_err(&bytes).is_format());
}

#[test]
fn test_whole_unit_program_layout_is_unsupported() {
    let bytes = stream(|w| w.write_entry(TAG_PROGRAM, 1).unwrap());
    assert!(matches!(decode_err(&bytes), FreezerError::Unsupported(_)));
}

// ═══════════════════════════════════════════════════════════════════════
// Limits
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_decode_depth_limit() {
    let mut value = Value::Int(1);
    for _ in 0..10 {
        value = Value::array(vec![value]);
    }
    let bytes = encode_value(&value, None).unwrap();

    let shallow = Decoder::with_options(DecodeOptions::new().with_max_depth(5));
    assert!(matches!(
        shallow.decode(&bytes, None),
        Err(FreezerError::DepthExceeded { max_depth: 5 })
    ));
    assert_eq!(Decoder::new().decode(&bytes, None).unwrap(), value);
}

#[test]
fn test_encode_depth_limit() {
    let mut value = Value::Int(1);
    for _ in 0..10 {
        value = Value::array(vec![value]);
    }
    let encoder = Encoder::with_options(EncodeOptions::new().with_max_depth(5));
    assert!(matches!(
        encoder.encode(&value, None),
        Err(FreezerError::DepthExceeded { max_depth: 5 })
    ));
}

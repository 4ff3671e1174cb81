//! Round trips of basic values and containers, sharing and cycles

use freezer::*;
use pretty_assertions::assert_eq;

fn round_trip(value: &Value) -> Value {
    let bytes = encode_value(value, None).unwrap();
    decode_value(&bytes, None).unwrap()
}

// ═══════════════════════════════════════════════════════════════════════
// Basic Values
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_integers() {
    for n in [
        0,
        -1,
        3,
        4,
        -5,
        259,
        260,
        i64::from(i32::MAX),
        i64::from(i32::MIN),
        i64::from(i32::MAX) + 1,
        1 << 40,
        -(1 << 40),
        i64::MAX,
        i64::MIN,
    ] {
        assert_eq!(round_trip(&Value::Int(n)), Value::Int(n), "{}", n);
    }
}

#[test]
fn test_bignum_is_written_in_base_36() {
    let (_, listing) = Encoder::new()
        .encode_listing(&Value::Int(1 << 40), None)
        .unwrap();
    assert_eq!(listing.texts(), vec![".bignum 1099511627776", ".string \"e13wu1og\""]);
}

#[test]
fn test_floats() {
    for x in [0.0, 1.5, -8.0, 0.1875, 1024.0, f64::MIN_POSITIVE, f64::INFINITY, f64::NEG_INFINITY] {
        assert_eq!(round_trip(&Value::Float(x)), Value::Float(x), "{}", x);
    }
    let neg_zero = round_trip(&Value::Float(-0.0));
    assert!(neg_zero.as_float().unwrap().is_sign_negative());
    assert!(round_trip(&Value::Float(f64::NAN)).as_float().unwrap().is_nan());
}

#[test]
fn test_float_mantissa_is_limited() {
    let back = round_trip(&Value::Float(0.1)).as_float().unwrap();
    assert!((back - 0.1).abs() < 1e-9);
}

#[test]
fn test_strings_of_every_width() {
    for s in ["", "ab", "héllo", "€uro", "clef 𝄞"] {
        let value = Value::string(s);
        assert_eq!(round_trip(&value), value, "{}", s);
    }
}

#[test]
fn test_known_bytes_for_small_array() {
    let value = Value::array(vec![Value::Int(5), Value::string("ab")]);
    let bytes = encode_value(&value, None).unwrap();
    assert_eq!(
        bytes,
        vec![0xb6, b'k', b'e', b'0', 0xa0, 0x08, 0x01, 0xa6, b'a', b'b']
    );
    assert_eq!(decode_value(&bytes, None).unwrap(), value);
}

#[test]
fn test_types() {
    let ty = TypeExpr::Function {
        args: vec![TypeExpr::String, TypeExpr::int_range(0, 10)],
        rest: Box::new(TypeExpr::Mixed),
        ret: Box::new(TypeExpr::or(
            TypeExpr::array(TypeExpr::Float),
            TypeExpr::named("pair", TypeExpr::mapping(TypeExpr::String, TypeExpr::Zero)),
        )),
    };
    let value = Value::array(vec![Value::Type(ty.clone()), Value::Type(ty)]);
    assert_eq!(round_trip(&value), value);
}

// ═══════════════════════════════════════════════════════════════════════
// Containers
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_nested_containers() {
    let value = Value::mapping(vec![
        (Value::string("list"), Value::array(vec![Value::Int(1), Value::Float(2.5)])),
        (Value::Int(7), Value::multiset(vec![Value::string("a"), Value::string("a")])),
        (Value::string("empty"), Value::mapping(vec![])),
    ]);
    assert_eq!(round_trip(&value), value);
}

#[test]
fn test_mapping_keeps_insertion_order() {
    let value = Value::mapping(vec![
        (Value::string("z"), Value::Int(1)),
        (Value::string("a"), Value::Int(2)),
    ]);
    let back = round_trip(&value);
    let keys: Vec<Value> = back
        .as_mapping()
        .unwrap()
        .borrow()
        .keys()
        .map(|k| k.value().clone())
        .collect();
    assert_eq!(keys, vec![Value::string("z"), Value::string("a")]);
}

// ═══════════════════════════════════════════════════════════════════════
// Sharing and Cycles
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_shared_mapping_stays_shared() {
    let m = Value::mapping(vec![(Value::string("x"), Value::Int(1))]);
    let value = Value::array(vec![m.clone(), m]);
    let back = round_trip(&value);
    let items = back.as_array().unwrap().borrow().clone();
    assert!(items[0].same_identity(&items[1]));

    let again = Value::array(vec![
        Value::mapping(vec![(Value::string("x"), Value::Int(1))]),
        Value::mapping(vec![(Value::string("x"), Value::Int(1))]),
    ]);
    let back = round_trip(&again);
    let items = back.as_array().unwrap().borrow().clone();
    assert!(!items[0].same_identity(&items[1]));
}

#[test]
fn test_self_containing_array() {
    let a = Value::array(vec![Value::Int(1)]);
    a.as_array().unwrap().borrow_mut().push(a.clone());

    let back = round_trip(&a);
    let items = back.as_array().unwrap().borrow().clone();
    assert_eq!(items[0], Value::Int(1));
    assert!(items[1].same_identity(&back));
}

#[test]
fn test_mutual_cycle_through_mapping() {
    let m = Value::mapping(vec![]);
    let a = Value::array(vec![m.clone()]);
    m.as_mapping()
        .unwrap()
        .borrow_mut()
        .insert(HashableValue(Value::string("back")), a.clone());

    let back = round_trip(&a);
    let inner = back.as_array().unwrap().borrow()[0].clone();
    let map = inner.as_mapping().unwrap().borrow();
    let target = map.get(&HashableValue(Value::string("back"))).unwrap();
    assert!(target.same_identity(&back));
}

#[test]
fn test_repeated_strings_use_back_references() {
    let value = Value::array(vec![Value::string("ab"), Value::string("ab")]);
    let (_, listing) = Encoder::new().encode_listing(&value, None).unwrap();
    assert_eq!(
        listing.texts(),
        vec![".entry array, 2", ".string \"ab\"", ".tag again, -3"]
    );
}

// ═══════════════════════════════════════════════════════════════════════
// Canonical Encoding
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_canonical_is_independent_of_insertion_order() {
    let a = Value::mapping(vec![
        (Value::string("b"), Value::Int(2)),
        (Value::Int(10), Value::Float(1.5)),
        (Value::string("a"), Value::multiset(vec![Value::Int(3), Value::Int(1)])),
    ]);
    let b = Value::mapping(vec![
        (Value::string("a"), Value::multiset(vec![Value::Int(1), Value::Int(3)])),
        (Value::Int(10), Value::Float(1.5)),
        (Value::string("b"), Value::Int(2)),
    ]);
    assert_eq!(
        encode_value_canonic(&a, None).unwrap(),
        encode_value_canonic(&b, None).unwrap()
    );
    assert_ne!(encode_value(&a, None).unwrap(), encode_value(&b, None).unwrap());
    assert_eq!(round_trip(&a), b);
}

#[test]
fn test_canonical_rejects_programs() {
    let program = ProgramBuilder::new().finish().unwrap();
    let value = Value::array(vec![Value::Program(program)]);
    assert!(matches!(
        encode_value_canonic(&value, None),
        Err(FreezerError::Unsupported(_))
    ));
}

#[test]
fn test_fingerprint_matches_canonical_bytes() {
    let a = Value::multiset(vec![Value::string("x"), Value::Int(1)]);
    let b = Value::multiset(vec![Value::Int(1), Value::string("x")]);
    assert_eq!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    assert_eq!(fingerprint(&a).unwrap().to_hex().len(), 64);
    assert_ne!(
        fingerprint(&a).unwrap(),
        fingerprint(&Value::multiset(vec![Value::Int(1)])).unwrap()
    );
}

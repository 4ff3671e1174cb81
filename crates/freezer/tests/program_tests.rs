//! Round trips of programs, objects and functions

use freezer::entry::{Writer, MAGIC, TAG_AGAIN, TAG_INT, TAG_PROGRAM, TAG_STRING};
use freezer::*;
use pretty_assertions::assert_eq;

fn round_trip(value: &Value) -> Value {
    let bytes = encode_value(value, None).unwrap();
    decode_value(&bytes, None).unwrap()
}

fn program_of(value: Value) -> Program {
    match value {
        Value::Program(p) => p,
        other => panic!("expected a program, got {:?}", other),
    }
}

fn base() -> Program {
    let mut b = ProgramBuilder::new();
    b.define_variable("x", TypeExpr::int(), MemberFlags::PUBLIC).unwrap();
    b.define_function(
        "f",
        TypeExpr::function(vec![], TypeExpr::int()),
        MemberFlags::empty(),
        FunctionBody {
            offset: Some(0),
            ..Default::default()
        },
    )
    .unwrap();
    b.constant("answer", Value::Int(42), MemberFlags::PUBLIC).unwrap();
    b.define_variable("secret", TypeExpr::Float, MemberFlags::PRIVATE).unwrap();
    b.finish().unwrap()
}

fn assert_same_tables(a: &Program, b: &Program) {
    let (a, b) = (a.data(), b.data());
    assert_eq!(b.references, a.references);
    assert_eq!(b.variables, a.variables);
    assert_eq!(b.functions, a.functions);
    assert_eq!(b.constants, a.constants);
    assert_eq!(b.storage, a.storage);
    assert_eq!(b.inherits.len(), a.inherits.len());
    for (x, y) in a.inherits.iter().zip(b.inherits.iter()) {
        assert_eq!(y.name, x.name);
        assert_eq!(y.ref_offset, x.ref_offset);
        assert_eq!(y.level, x.level);
        assert_eq!(y.flags, x.flags);
        assert_eq!(y.storage_offset, x.storage_offset);
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Programs
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_program_with_inherit() {
    let a = base();
    let mut b = ProgramBuilder::new();
    b.inherit(&a, None, Some("base"), MemberFlags::PROTECTED).unwrap();
    b.define_variable("y", TypeExpr::String, MemberFlags::empty()).unwrap();
    let b = b.finish().unwrap();

    let back = program_of(round_trip(&Value::Program(b.clone())));
    assert!(back.is_finished());
    assert_same_tables(&b, &back);
    assert_eq!(back.find_member("y"), Some(4));
    assert_eq!(back.constant("answer"), Some(Value::Int(42)));
    assert!(back.inherit_program(1).unwrap().is_finished());
    assert!(!back.inherit_program(1).unwrap().ptr_eq(&a));
}

#[test]
fn test_nested_and_repeated_inherits() {
    let a = base();
    let mut b = ProgramBuilder::new();
    b.inherit(&a, None, Some("a"), MemberFlags::empty()).unwrap();
    b.define_variable("y", TypeExpr::int(), MemberFlags::empty()).unwrap();
    let b = b.finish().unwrap();

    let mut c = ProgramBuilder::new();
    c.inherit(&b, None, Some("b"), MemberFlags::empty()).unwrap();
    c.inherit(&a, None, Some("again"), MemberFlags::empty()).unwrap();
    let c = c.finish().unwrap();

    let back = program_of(round_trip(&Value::Program(c.clone())));
    assert_same_tables(&c, &back);
    assert_eq!(back.num_inherits(), 4);
    // Both paths to the base program decode to one program.
    assert!(back
        .inherit_program(2)
        .unwrap()
        .ptr_eq(&back.inherit_program(3).unwrap()));
}

#[test]
fn test_override_after_inherit() {
    let a = base();
    let mut b = ProgramBuilder::new();
    b.inherit(&a, None, None, MemberFlags::empty()).unwrap();
    b.define_function(
        "f",
        TypeExpr::function(vec![], TypeExpr::int()),
        MemberFlags::empty(),
        FunctionBody {
            offset: Some(8),
            ..Default::default()
        },
    )
    .unwrap();
    let b = b.finish().unwrap();

    let back = program_of(round_trip(&Value::Program(b.clone())));
    assert_same_tables(&b, &back);
    let f = back.resolve(back.find_member("f").unwrap()).unwrap();
    assert!(f.program.ptr_eq(&back));
}

#[test]
fn test_override_before_inherit() {
    let a = base();
    let mut b = ProgramBuilder::new();
    b.define_variable("x", TypeExpr::String, MemberFlags::empty()).unwrap();
    b.inherit(&a, None, None, MemberFlags::empty()).unwrap();
    let b = b.finish().unwrap();

    let back = program_of(round_trip(&Value::Program(b.clone())));
    assert_same_tables(&b, &back);
    assert_eq!(back.find_member("x"), Some(0));
}

#[test]
fn test_alias_reference_is_written_raw() {
    let a = base();
    let mut b = ProgramBuilder::new();
    b.inherit(&a, None, None, MemberFlags::empty()).unwrap();
    b.alias_inherited(1, "answer", MemberFlags::LOCAL).unwrap();
    let b = b.finish().unwrap();

    let (bytes, listing) = Encoder::new()
        .encode_listing(&Value::Program(b.clone()), None)
        .unwrap();
    assert!(listing.texts().contains(&".ident raw, 4"));
    let back = program_of(decode_value(&bytes, None).unwrap());
    assert_same_tables(&b, &back);
}

#[test]
fn test_self_referential_constant() {
    let mut b = ProgramBuilder::new();
    let this = b.program().clone();
    b.constant("self", Value::Program(this), MemberFlags::empty()).unwrap();
    let p = b.finish().unwrap();

    let back = program_of(round_trip(&Value::Program(p)));
    let constant = back.constant("self").unwrap();
    assert!(constant.same_identity(&Value::Program(back.clone())));
}

#[test]
fn test_variable_typed_with_its_own_program() {
    let mut b = ProgramBuilder::new();
    let ty = TypeExpr::object_of(b.program());
    b.define_variable("next", ty, MemberFlags::empty()).unwrap();
    let p = b.finish().unwrap();

    let back = program_of(round_trip(&Value::Program(p)));
    assert_eq!(back.data().variables[0].ty, TypeExpr::object_of(&back));
}

#[test]
fn test_program_inside_a_container_is_delayed() {
    let p = base();
    let value = Value::array(vec![Value::Program(p.clone()), Value::Program(p)]);
    let (bytes, listing) = Encoder::new().encode_listing(&value, None).unwrap();
    let texts = listing.texts();
    assert_eq!(&texts[..3], &[".entry array, 2", ".entry program, 5", ".tag again, -3"]);
    assert!(texts.contains(&".tag delayed, -3"));

    let back = decode_value(&bytes, None).unwrap();
    let items = back.as_array().unwrap().borrow().clone();
    assert!(items[0].same_identity(&items[1]));
    let program = items[0].as_program().unwrap();
    assert!(program.is_finished());
    assert_eq!(program.constant("answer"), Some(Value::Int(42)));
}

#[test]
fn test_type_pointing_at_a_program() {
    let p = base();
    let value = Value::array(vec![Value::Type(TypeExpr::object_of(&p))]);
    let back = round_trip(&value);
    let ty = back.as_array().unwrap().borrow()[0].clone();
    match ty.as_type() {
        Some(TypeExpr::Object {
            exact: false,
            program: Some(q),
        }) => {
            assert!(q.is_finished());
            assert_eq!(q.find_member("x"), Some(0));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_program_flags_survive() {
    let mut b = ProgramBuilder::new();
    b.set_flags(ProgramFlags::CONSTANT | ProgramFlags::USES_PARENT);
    let p = b.finish().unwrap();
    let back = program_of(round_trip(&Value::Program(p)));
    assert!(back.flags().contains(ProgramFlags::CONSTANT | ProgramFlags::USES_PARENT));
}

#[test]
fn test_native_program_needs_a_name() {
    let mut b = ProgramBuilder::new();
    b.set_flags(ProgramFlags::HAS_C_METHODS);
    let p = b.finish().unwrap();
    assert!(matches!(
        encode_value(&Value::Program(p), None),
        Err(FreezerError::Codec(_))
    ));
}

#[test]
fn test_inheriting_itself_is_rejected() {
    let mut b = ProgramBuilder::new();
    let this = b.program().clone();
    assert!(matches!(
        b.inherit(&this, None, None, MemberFlags::empty()),
        Err(FreezerError::Graph(_))
    ));

    // A program body whose only inherit is a back-reference to itself.
    let version = format!("freezer {}", VERSION);
    let mut w = Writer::new();
    w.write_bytes(MAGIC);
    w.write_entry(TAG_PROGRAM, 4).unwrap();
    w.write_number(1234).unwrap();
    w.write_number(0).unwrap();
    w.write_entry(TAG_STRING, version.len() as i64).unwrap();
    w.write_bytes(version.as_bytes());
    for count in [0, 0, 0, 0, 2, 0, 0, 0, 0, 0, -1] {
        w.write_number(count).unwrap();
    }
    w.write_number(3).unwrap();
    w.write_number(0).unwrap();
    w.write_entry(TAG_INT, 0).unwrap();
    w.write_entry(TAG_AGAIN, -4).unwrap();
    w.write_entry(TAG_INT, 0).unwrap();
    w.write_number(0).unwrap();
    w.write_number(0).unwrap();
    w.write_number(-1).unwrap();

    assert!(matches!(
        decode_value(w.as_slice(), None),
        Err(FreezerError::Graph(_))
    ));
}

// ═══════════════════════════════════════════════════════════════════════
// Objects
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_live_object() {
    let mut b = ProgramBuilder::new();
    b.define_variable("x", TypeExpr::int(), MemberFlags::PUBLIC).unwrap();
    b.define_variable("name", TypeExpr::String, MemberFlags::PUBLIC).unwrap();
    let p = b.finish().unwrap();
    let o = Object::instantiate(&p).unwrap();
    o.set("x", Value::Int(3)).unwrap();
    o.set("name", Value::string("three")).unwrap();

    let value = Value::array(vec![Value::Object(o.clone()), Value::Object(o)]);
    let back = round_trip(&value);
    let items = back.as_array().unwrap().borrow().clone();
    assert!(items[0].same_identity(&items[1]));
    let object = items[0].as_object().unwrap();
    assert_eq!(object.state(), ObjectState::Live);
    assert_eq!(object.get("x"), Some(Value::Int(3)));
    assert_eq!(object.get("name"), Some(Value::string("three")));
}

#[test]
fn test_object_of_derived_program() {
    let a = base();
    let mut b = ProgramBuilder::new();
    b.inherit(&a, None, None, MemberFlags::empty()).unwrap();
    b.define_variable("y", TypeExpr::Float, MemberFlags::empty()).unwrap();
    let p = b.finish().unwrap();
    let o = Object::instantiate(&p).unwrap();
    o.set("x", Value::Int(11)).unwrap();
    o.set("y", Value::Float(0.5)).unwrap();

    let back = round_trip(&Value::Object(o));
    let object = back.as_object().unwrap();
    assert_eq!(object.get("x"), Some(Value::Int(11)));
    assert_eq!(object.get("y"), Some(Value::Float(0.5)));
    assert_eq!(object.get("answer"), Some(Value::Int(42)));
}

#[test]
fn test_object_referring_to_itself() {
    let mut b = ProgramBuilder::new();
    b.define_variable("me", TypeExpr::Mixed, MemberFlags::empty()).unwrap();
    let p = b.finish().unwrap();
    let o = Object::instantiate(&p).unwrap();
    o.set("me", Value::Object(o.clone())).unwrap();

    let back = round_trip(&Value::Object(o));
    let object = back.as_object().unwrap();
    assert!(object.get("me").unwrap().same_identity(&back));
}

#[test]
fn test_destructed_object_becomes_zero() {
    let p = base();
    let o = Object::instantiate(&p).unwrap();
    o.destruct();
    let back = round_trip(&Value::array(vec![Value::Object(o)]));
    assert_eq!(back, Value::array(vec![Value::Int(0)]));
}

// ═══════════════════════════════════════════════════════════════════════
// Functions
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_bound_member_function() {
    let p = base();
    let o = Object::instantiate(&p).unwrap();
    o.set("x", Value::Int(9)).unwrap();
    let f = o.get("f").unwrap();

    let back = round_trip(&f);
    let function = back.as_function().unwrap();
    assert_eq!(function.name(), Some(StringValue::from("f")));
    assert_eq!(function.object().unwrap().get("x"), Some(Value::Int(9)));
}

#[test]
fn test_overloaded_function_is_rejected() {
    let a = base();
    let mut b = ProgramBuilder::new();
    b.inherit(&a, None, None, MemberFlags::empty()).unwrap();
    let alias = b.alias_inherited(1, "f", MemberFlags::LOCAL).unwrap();
    let p = b.finish().unwrap();
    let o = Object::instantiate(&p).unwrap();

    let f = Value::Function(FunctionRef::member(o, alias));
    assert!(matches!(encode_value(&f, None), Err(FreezerError::Codec(_))));
}

#[test]
fn test_builtin_needs_a_name() {
    let f = Value::Function(FunctionRef::builtin("write"));
    assert!(matches!(encode_value(&f, None), Err(FreezerError::Codec(_))));
}

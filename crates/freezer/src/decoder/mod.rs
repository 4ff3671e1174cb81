//! Value graph decoder.
//!
//! Reads the entries written by the encoder and rebuilds the graph.
//! Containers and programs are entered into the sequence table before
//! their children are read, so back-references from inside them resolve
//! to the value under construction.
//!
//! ## Modules
//!
//! - `guard`: the [`DecodeSession`] that stops nested decodes of the
//!   same input from recursing
//! - `pending`: programs and objects waiting on unfinished inherits

mod guard;
mod pending;

pub use guard::DecodeSession;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::codec::{Codec, DefaultCodec};
use crate::context::DecodeOptions;
use crate::entry::{
    tag_name, Entry, Reader, COUNTER_START, MAGIC, TAG_AGAIN, TAG_ARRAY, TAG_DELAYED, TAG_FLOAT,
    TAG_FUNCTION, TAG_INT, TAG_MAPPING, TAG_MULTISET, TAG_OBJECT, TAG_PROGRAM, TAG_STRING,
    TAG_TYPE,
};
use crate::error::{FreezerError, Result};
use crate::legacy;
use crate::program::{mark_finished, Program, ProgramState};
use crate::program_codec;
use crate::trace::{Trace, Tracer};
use crate::value::{
    FunctionRef, HashableValue, Object, StringValue, TypeExpr, Value, T_AND, T_ARRAY, T_FLOAT,
    T_FUNCTION, T_INT, T_MANY, T_MAPPING, T_MIXED, T_MULTISET, T_NAME, T_NOT, T_OBJECT, T_OR,
    T_PROGRAM, T_STRING, T_TYPE, T_UNKNOWN, T_VOID, T_ZERO,
};
use pending::Pending;

/// Decodes value graphs.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    options: DecodeOptions,
}

impl Decoder {
    /// Decoder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder with explicit options.
    pub fn with_options(options: DecodeOptions) -> Self {
        Decoder { options }
    }

    /// Active options.
    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    /// Decode `bytes`, consulting `codec` to resolve names.
    pub fn decode(&self, bytes: &[u8], codec: Option<&dyn Codec>) -> Result<Value> {
        let mut session = DecodeSession::new(self.options.clone());
        session.decode(bytes, codec)
    }

    /// Decode `bytes` and return the listing of every entry read.
    pub fn decode_listing(&self, bytes: &[u8], codec: Option<&dyn Codec>) -> Result<(Value, Trace)> {
        let mut session = DecodeSession::new(self.options.clone());
        let (value, listing) = session.enter(bytes, codec, true)?;
        Ok((value, listing.unwrap_or_default()))
    }
}

/// Decode one stream inside `session`.
fn decode_frame(
    bytes: &[u8],
    codec: Option<&dyn Codec>,
    session: &mut DecodeSession,
    collect: bool,
) -> Result<(Value, Option<Trace>)> {
    let codec: &dyn Codec = match codec {
        Some(c) => c,
        None => &DefaultCodec,
    };
    if !bytes.starts_with(MAGIC) {
        if session.options().allow_legacy {
            debug!(len = bytes.len(), "no magic prefix, decoding legacy format");
            return legacy::decode_legacy(bytes, codec).map(|value| (value, None));
        }
        return Err(FreezerError::format("Bad magic"));
    }
    if bytes.len() <= MAGIC.len() {
        return Err(FreezerError::format("Not enough data"));
    }

    let options = session.options().clone();
    let mut state = DecodeState::new(bytes, codec, &options, session, collect);
    match state.run() {
        Ok(value) => Ok((value, state.tracer.finish())),
        Err(e) => {
            state.teardown();
            Err(e)
        }
    }
}

/// State of one top-level decode.
pub(crate) struct DecodeState<'a, 's> {
    reader: Reader<'a>,
    table: HashMap<i64, Value>,
    counter: i64,
    codec: &'a dyn Codec,
    pending: Pending,
    pickyness: u32,
    strict: bool,
    depth: usize,
    max_depth: usize,
    tracer: Tracer,
    session: &'s mut DecodeSession,
}

impl<'a, 's> DecodeState<'a, 's> {
    fn new(
        bytes: &'a [u8],
        codec: &'a dyn Codec,
        options: &DecodeOptions,
        session: &'s mut DecodeSession,
        collect: bool,
    ) -> Self {
        DecodeState {
            reader: Reader::new(bytes),
            table: HashMap::new(),
            counter: COUNTER_START,
            codec,
            pending: Pending::default(),
            pickyness: u32::from(options.strict),
            strict: options.strict,
            depth: 0,
            max_depth: options.max_depth,
            tracer: Tracer::new(collect, options.trace),
            session,
        }
    }

    fn run(&mut self) -> Result<Value> {
        self.reader.read_bytes(MAGIC.len())?;
        let value = self.decode_value()?;

        // Bodies of programs the top-level value only referenced.
        while !self.reader.is_at_end() {
            let offset = self.reader.position();
            let entry = self.reader.read_entry()?;
            if entry.tag != TAG_DELAYED {
                return Err(FreezerError::format(format!(
                    "Unexpected {} entry after the top-level value",
                    tag_name(entry.tag)
                )));
            }
            self.decode_entry(offset, entry)?;
        }

        self.pending.rescan()?;
        let unfinished = self.pending.unfinished_programs();
        if unfinished > 0 {
            if self.strict {
                return Err(FreezerError::graph(format!(
                    "{} programs left unfinished",
                    unfinished
                )));
            }
            warn!(unfinished, "decode left programs unfinished");
        }
        debug!(values = self.table.len(), "decoded value");
        Ok(value)
    }

    fn teardown(&mut self) {
        self.pending.teardown();
        for value in self.table.values() {
            if let Value::Program(p) = value {
                if !p.is_finished() {
                    p.abandon();
                }
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Helpers shared with the program codec
    // ═══════════════════════════════════════════════════════════════════

    pub(crate) fn reader(&mut self) -> &mut Reader<'a> {
        &mut self.reader
    }

    pub(crate) fn position(&self) -> usize {
        self.reader.position()
    }

    pub(crate) fn number(&mut self) -> Result<i64> {
        self.reader.read_number()
    }

    /// A number that must be a non-negative size or index.
    pub(crate) fn count(&mut self) -> Result<usize> {
        let n = self.reader.read_number()?;
        usize::try_from(n).map_err(|_| FreezerError::format(format!("Negative count {}", n)))
    }

    pub(crate) fn note(&mut self, offset: usize, text: impl FnOnce() -> String) {
        let depth = self.depth.saturating_sub(1);
        self.tracer.note(offset, depth, text);
    }

    pub(crate) fn raise_pickyness(&mut self) {
        self.pickyness += 1;
    }

    pub(crate) fn lower_pickyness(&mut self) {
        self.pickyness = self.pickyness.saturating_sub(1);
    }

    pub(crate) fn decode_string(&mut self) -> Result<StringValue> {
        match self.decode_value()? {
            Value::String(s) => Ok(s),
            other => Err(FreezerError::format(format!(
                "Expected a string, got {}",
                other.type_name()
            ))),
        }
    }

    pub(crate) fn decode_type_value(&mut self) -> Result<TypeExpr> {
        match self.decode_value()? {
            Value::Type(t) => Ok(t),
            other => Err(FreezerError::format(format!(
                "Expected a type, got {}",
                other.type_name()
            ))),
        }
    }

    /// Finish `program` now if its inherits allow it, else queue it.
    pub(crate) fn program_done(&mut self, program: &Program) -> Result<()> {
        if program.inherits_finished() {
            mark_finished(program);
            self.pending.rescan()
        } else {
            self.pending.add_program(program.clone());
            Ok(())
        }
    }

    fn next_id(&mut self) -> i64 {
        let id = self.counter;
        self.counter += 1;
        id
    }

    fn insert(&mut self, id: i64, value: &Value) {
        if id == COUNTER_START {
            self.session.set_root(value);
        }
        self.table.insert(id, value.clone());
    }

    fn finish_value(&mut self, id: i64, value: Value) -> Result<Value> {
        self.insert(id, &value);
        Ok(value)
    }

    fn check_size(&self, n: i64, what: &str) -> Result<usize> {
        let size = usize::try_from(n)
            .map_err(|_| FreezerError::format(format!("Negative {} size {}", what, n)))?;
        if size > self.reader.remaining() {
            return Err(FreezerError::format(format!(
                "{} size {} exceeds the remaining input",
                what, size
            )));
        }
        Ok(size)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Values
    // ═══════════════════════════════════════════════════════════════════

    pub(crate) fn decode_value(&mut self) -> Result<Value> {
        if self.depth >= self.max_depth {
            return Err(FreezerError::DepthExceeded {
                max_depth: self.max_depth,
            });
        }
        self.depth += 1;
        let offset = self.reader.position();
        let result = match self.reader.read_entry() {
            Ok(entry) => self.decode_entry(offset, entry),
            Err(e) => Err(e),
        };
        self.depth -= 1;
        result
    }

    fn decode_entry(&mut self, offset: usize, entry: Entry) -> Result<Value> {
        match entry.tag {
            TAG_AGAIN => {
                self.note(offset, || format!(".tag again, {}", entry.num));
                self.table.get(&entry.num).cloned().ok_or_else(|| {
                    FreezerError::format(format!("Back-reference to unknown id {}", entry.num))
                })
            }
            TAG_DELAYED => self.decode_delayed(offset, entry.num),
            TAG_TYPE => {
                if entry.num != 0 {
                    return Err(FreezerError::format(format!(
                        "Unknown type encoding {}",
                        entry.num
                    )));
                }
                let ty = self.decode_type()?;
                self.note(offset, || format!(".type {:?}", ty));
                let id = self.next_id();
                self.finish_value(id, Value::Type(ty))
            }
            _ => {
                let id = self.next_id();
                self.decode_tagged(offset, id, entry)
            }
        }
    }

    fn decode_tagged(&mut self, offset: usize, id: i64, entry: Entry) -> Result<Value> {
        match entry.tag {
            TAG_INT => {
                self.note(offset, || format!(".integer {}", entry.num));
                self.finish_value(id, Value::Int(entry.num))
            }
            TAG_FLOAT => {
                let exponent = self.reader.expect_entry(TAG_FLOAT)?;
                self.note(offset, || format!(".float {} {}", entry.num, exponent));
                let x = float_from_parts(entry.num, exponent)?;
                self.finish_value(id, Value::Float(x))
            }
            TAG_STRING => {
                let s = self.read_string(entry.num)?;
                self.note(offset, || format!(".string {:?}", s));
                self.finish_value(id, Value::String(s))
            }
            TAG_ARRAY | TAG_MULTISET => {
                let kind = tag_name(entry.tag);
                let len = self.check_size(entry.num, kind)?;
                self.note(offset, || format!(".entry {}, {}", kind, len));
                let items = Rc::new(RefCell::new(Vec::with_capacity(len)));
                let value = if entry.tag == TAG_ARRAY {
                    Value::Array(items.clone())
                } else {
                    Value::Multiset(items.clone())
                };
                self.insert(id, &value);
                for _ in 0..len {
                    let item = self.decode_value()?;
                    items.borrow_mut().push(item);
                }
                Ok(value)
            }
            TAG_MAPPING => {
                let len = self.check_size(entry.num, "mapping")?;
                self.note(offset, || format!(".entry mapping, {}", len));
                let map = Rc::new(RefCell::new(IndexMap::with_capacity(len)));
                let value = Value::Mapping(map.clone());
                self.insert(id, &value);
                for _ in 0..len {
                    let k = self.decode_value()?;
                    let v = self.decode_value()?;
                    map.borrow_mut().insert(HashableValue(k), v);
                }
                Ok(value)
            }
            TAG_OBJECT => self.decode_object(offset, id, entry.num),
            TAG_FUNCTION => self.decode_function(offset, id, entry.num),
            TAG_PROGRAM => self.decode_program(offset, id, entry.num),
            other => Err(FreezerError::format(format!("Unknown tag {}", other))),
        }
    }

    fn read_string(&mut self, num: i64) -> Result<StringValue> {
        if num >= 0 {
            let len = self.check_size(num, "string")?;
            let bytes = self.reader.read_bytes(len)?;
            return Ok(StringValue::from_bytes(bytes.to_vec()));
        }
        if num != -1 {
            return Err(FreezerError::format(format!("Negative string length {}", num)));
        }

        let header = self.reader.read_entry()?;
        let width: usize = match header.tag {
            1 => 2,
            2 => 4,
            shift => {
                return Err(FreezerError::format(format!("Illegal size shift {}", shift)));
            }
        };
        let len = usize::try_from(header.num)
            .map_err(|_| FreezerError::format(format!("Negative string length {}", header.num)))?;
        let total = len
            .checked_mul(width)
            .ok_or_else(|| FreezerError::format("String length overflows"))?;
        let raw = self.reader.read_bytes(total)?;
        let chars = raw.chunks_exact(width).map(|unit| match unit {
            [a, b] => u32::from(u16::from_be_bytes([*a, *b])),
            [a, b, c, d] => u32::from_be_bytes([*a, *b, *c, *d]),
            _ => 0,
        });
        Ok(StringValue::from_chars(chars))
    }

    fn decode_object(&mut self, offset: usize, id: i64, mode: i64) -> Result<Value> {
        self.note(offset, || format!(".entry object, {}", mode));
        match mode {
            0 => {
                let name = self.decode_value()?;
                let value = self.codec.objectof(&name)?;
                if !matches!(value, Value::Object(_) | Value::Int(0)) {
                    return Err(FreezerError::codec(format!(
                        "Failed to decode object {:?}: resolved to {}",
                        name,
                        value.type_name()
                    )));
                }
                self.finish_value(id, value)
            }
            1 => self.decode_cloned_object(id),
            2 => {
                let digits = self.decode_string()?;
                let text = digits.to_string_lossy();
                let n = i64::from_str_radix(&text, 36).map_err(|_| {
                    FreezerError::format(format!("Bignum {} does not fit in 64 bits", text))
                })?;
                self.finish_value(id, Value::Int(n))
            }
            3 => {
                // Program first, then the object itself (normally a
                // back-reference into that program's body).
                self.decode_value()?;
                let object = self.decode_value()?;
                self.finish_value(id, object)
            }
            _ => Err(FreezerError::format(format!(
                "Object coding {} not supported",
                mode
            ))),
        }
    }

    fn decode_cloned_object(&mut self, id: i64) -> Result<Value> {
        let program = match self.decode_value()? {
            Value::Program(p) => p,
            other => {
                if self.pickyness > 0 {
                    return Err(FreezerError::codec(format!(
                        "Failed to decode program for object: got {}",
                        other.type_name()
                    )));
                }
                warn!(
                    got = other.type_name(),
                    "object program did not decode, dropping its payload"
                );
                self.decode_value()?;
                return self.finish_value(id, Value::Int(0));
            }
        };

        let object = Object::pending(&program);
        if program.is_finished() {
            object.initialize()?;
        } else {
            self.pending.add_object(object.clone());
        }
        let value = Value::Object(object.clone());
        self.insert(id, &value);

        let payload = self.decode_value()?;
        let codec = self.codec;
        if let Some(Value::Array(args)) = codec.decode_object(&object, payload, &mut *self.session)? {
            let args = args.borrow().clone();
            object.create(args)?;
        }
        Ok(value)
    }

    fn decode_function(&mut self, offset: usize, id: i64, mode: i64) -> Result<Value> {
        self.note(offset, || format!(".entry function, {}", mode));
        match mode {
            0 => {
                let name = self.decode_value()?;
                let value = self.codec.functionof(&name)?;
                if !matches!(value, Value::Function(_) | Value::Int(0)) {
                    return Err(FreezerError::codec(format!(
                        "Failed to decode function {:?}: resolved to {}",
                        name,
                        value.type_name()
                    )));
                }
                self.finish_value(id, value)
            }
            1 => {
                let object = self.decode_value()?;
                let name = self.decode_string()?;
                match object {
                    Value::Object(o) => {
                        let reference = o.program().find_member_str(&name).ok_or_else(|| {
                            FreezerError::graph(format!("Failed to decode function: no member {}", name))
                        })?;
                        self.finish_value(id, Value::Function(FunctionRef::member(o, reference)))
                    }
                    Value::Int(0) => self.finish_value(id, Value::Int(0)),
                    other => Err(FreezerError::format(format!(
                        "Function bound to {} rather than an object",
                        other.type_name()
                    ))),
                }
            }
            _ => Err(FreezerError::format(format!(
                "Function coding {} not supported",
                mode
            ))),
        }
    }

    fn decode_program(&mut self, offset: usize, id: i64, mode: i64) -> Result<Value> {
        self.note(offset, || format!(".entry program, {}", mode));
        match mode {
            0 => {
                let name = self.decode_value()?;
                match self.codec.programof(&name)? {
                    value @ Value::Program(_) => self.finish_value(id, value),
                    other => Err(FreezerError::codec(format!(
                        "Failed to decode program {:?}: resolved to {}",
                        name,
                        other.type_name()
                    ))),
                }
            }
            1 => Err(FreezerError::unsupported(
                "Whole-unit program layout is not supported",
            )),
            4 => {
                let program = Program::embryo();
                let value = Value::Program(program.clone());
                self.insert(id, &value);
                program_codec::decode_program(self, &program)?;
                Ok(value)
            }
            5 => {
                let program = Program::embryo();
                debug!(id, program = ?program.identity(), "program embryo");
                self.finish_value(id, Value::Program(program))
            }
            _ => Err(FreezerError::format(format!(
                "Program coding {} not supported",
                mode
            ))),
        }
    }

    fn decode_delayed(&mut self, offset: usize, id: i64) -> Result<Value> {
        self.note(offset, || format!(".tag delayed, {}", id));
        let program = match self.table.get(&id) {
            Some(Value::Program(p)) if p.state() == ProgramState::Virgin => p.clone(),
            _ => {
                return Err(FreezerError::format(format!(
                    "Delayed body for {} which is not a program embryo",
                    id
                )));
            }
        };
        let at = self.reader.position();
        let mode = self.reader.expect_entry(TAG_PROGRAM)?;
        if mode != 4 {
            return Err(FreezerError::format(format!(
                "Delayed program {} has coding {}",
                id, mode
            )));
        }
        self.note(at, || ".entry program, 4".to_string());
        program_codec::decode_program(self, &program)?;
        Ok(Value::Program(program))
    }

    // ═══════════════════════════════════════════════════════════════════
    // Types
    // ═══════════════════════════════════════════════════════════════════

    fn decode_type(&mut self) -> Result<TypeExpr> {
        let byte = self.reader.read_u8()?;
        self.decode_type_from(byte)
    }

    fn decode_type_from(&mut self, byte: u8) -> Result<TypeExpr> {
        if self.depth >= self.max_depth {
            return Err(FreezerError::DepthExceeded {
                max_depth: self.max_depth,
            });
        }
        self.depth += 1;
        let result = self.decode_type_body(byte);
        self.depth -= 1;
        result
    }

    fn decode_type_body(&mut self, byte: u8) -> Result<TypeExpr> {
        let ty = match byte {
            T_ARRAY => TypeExpr::array(self.decode_type()?),
            T_MAPPING => {
                let k = self.decode_type()?;
                let v = self.decode_type()?;
                TypeExpr::mapping(k, v)
            }
            T_MULTISET => TypeExpr::multiset(self.decode_type()?),
            T_OBJECT => {
                let exact = self.reader.read_u8()? != 0;
                let program = match self.decode_value()? {
                    Value::Program(p) => Some(p),
                    Value::Int(0) => None,
                    other => {
                        return Err(FreezerError::format(format!(
                            "Object type refers to {} rather than a program",
                            other.type_name()
                        )));
                    }
                };
                TypeExpr::Object { exact, program }
            }
            T_FUNCTION => {
                let mut args = Vec::new();
                loop {
                    let b = self.reader.read_u8()?;
                    if b == T_MANY {
                        break;
                    }
                    args.push(self.decode_type_from(b)?);
                }
                let rest = self.decode_type()?;
                let ret = self.decode_type()?;
                TypeExpr::Function {
                    args,
                    rest: Box::new(rest),
                    ret: Box::new(ret),
                }
            }
            T_PROGRAM => TypeExpr::Program(Box::new(self.decode_type()?)),
            T_STRING => TypeExpr::String,
            T_TYPE => TypeExpr::Type(Box::new(self.decode_type()?)),
            T_INT => {
                let min = self.reader.read_be32()? as i32;
                let max = self.reader.read_be32()? as i32;
                TypeExpr::Int { min, max }
            }
            T_FLOAT => TypeExpr::Float,
            T_ZERO => TypeExpr::Zero,
            T_VOID => TypeExpr::Void,
            T_NAME => {
                let name = self.decode_string()?;
                TypeExpr::Name(name, Box::new(self.decode_type()?))
            }
            T_UNKNOWN => TypeExpr::Unknown,
            T_MIXED => TypeExpr::Mixed,
            T_NOT => TypeExpr::Not(Box::new(self.decode_type()?)),
            T_AND => {
                let a = self.decode_type()?;
                let b = self.decode_type()?;
                TypeExpr::And(Box::new(a), Box::new(b))
            }
            T_OR => {
                let a = self.decode_type()?;
                let b = self.decode_type()?;
                TypeExpr::Or(Box::new(a), Box::new(b))
            }
            other => {
                return Err(FreezerError::format(format!("Unknown type byte {}", other)));
            }
        };
        Ok(ty)
    }
}

/// Rebuild a float from its wire mantissa and exponent.
pub(crate) fn float_from_parts(mantissa: i64, exponent: i64) -> Result<f64> {
    if mantissa != 0 {
        return Ok(ldexp(mantissa as f64, exponent));
    }
    match exponent {
        0 => Ok(0.0),
        1 => Ok(-0.0),
        -1 => Ok(f64::INFINITY),
        -2 => Ok(f64::NEG_INFINITY),
        -4 => Ok(f64::NAN),
        other => Err(FreezerError::format(format!("Bad float special {}", other))),
    }
}

/// `x * 2^exp` without intermediate overflow.
pub(crate) fn ldexp(x: f64, exp: i64) -> f64 {
    let mut x = x;
    let mut exp = exp.clamp(-2200, 2200);
    while exp > 1000 {
        x *= 2f64.powi(1000);
        exp -= 1000;
    }
    while exp < -1000 {
        x *= 2f64.powi(-1000);
        exp += 1000;
    }
    x * 2f64.powi(exp as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{float_parts, Encoder};
    use crate::program::{MemberFlags, ProgramBuilder};
    use crate::value::ObjectState;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_float_parts_round_trip() {
        for x in [
            1.5,
            -8.0,
            0.1875,
            3.0 * 2f64.powi(1000),
            -f64::from_bits(3),
            f64::MIN_POSITIVE,
            65536.25,
        ] {
            let (m, e) = float_parts(x);
            assert_eq!(float_from_parts(m, e).unwrap(), x, "{}", x);
        }
        let (m, e) = float_parts(-0.0);
        assert!(float_from_parts(m, e).unwrap().is_sign_negative());
        assert!(float_from_parts(0, -4).unwrap().is_nan());
        assert!(float_from_parts(0, 7).is_err());
    }

    #[test]
    fn test_bad_magic_without_legacy() {
        let decoder = Decoder::with_options(DecodeOptions::new().with_legacy(false));
        let err = decoder.decode(b"nope!", None).unwrap_err();
        assert!(err.is_format());
    }

    #[test]
    fn test_magic_only_is_truncated() {
        assert!(Decoder::new().decode(MAGIC, None).unwrap_err().is_format());
    }

    #[test]
    fn test_object_in_its_own_program_pool_waits_for_finish() {
        let mut b = ProgramBuilder::new();
        b.define_variable("x", TypeExpr::int(), MemberFlags::PUBLIC).unwrap();
        let program = b.finish().unwrap();
        let object = Object::instantiate(&program).unwrap();
        object.set("x", Value::Int(7)).unwrap();
        program
            .data_mut()
            .constant_pool
            .push(Value::Object(object.clone()));

        let bytes = Encoder::new().encode(&Value::Object(object), None).unwrap();
        let back = Decoder::new().decode(&bytes, None).unwrap();
        let back = back.as_object().unwrap();
        assert_eq!(back.get("x"), Some(Value::Int(7)));
        assert!(back.program().is_finished());
        let pooled = back.program().data().constant_pool[0].clone();
        assert!(pooled.same_identity(&Value::Object(back.clone())));
    }

    #[test]
    fn test_derived_program_waits_for_its_base() {
        let mut a = ProgramBuilder::new();
        a.define_variable("x", TypeExpr::int(), MemberFlags::PUBLIC).unwrap();
        let base = a.finish().unwrap();

        let mut b = ProgramBuilder::new();
        b.inherit(&base, None, Some("base"), MemberFlags::empty()).unwrap();
        b.define_variable("y", TypeExpr::int(), MemberFlags::PUBLIC).unwrap();
        let derived = b.finish().unwrap();

        // The base's pool holds an instance of the derived program, so the
        // derived body is read while the base is still unfinished.
        let object = Object::instantiate(&derived).unwrap();
        object.set("x", Value::Int(5)).unwrap();
        object.set("y", Value::Int(6)).unwrap();
        base.data_mut().constant_pool.push(Value::Object(object));

        let bytes = Encoder::new().encode(&Value::Program(base), None).unwrap();
        let back = Decoder::new().decode(&bytes, None).unwrap();
        let back = back.as_program().unwrap();
        assert!(back.is_finished());

        let pooled = back.data().constant_pool[0].clone();
        let pooled = pooled.as_object().unwrap();
        assert!(pooled.program().is_finished());
        assert!(pooled.program().inherit_program(1).unwrap().ptr_eq(back));
        assert_eq!(pooled.state(), ObjectState::Live);
        assert_eq!(pooled.get("x"), Some(Value::Int(5)));
        assert_eq!(pooled.get("y"), Some(Value::Int(6)));
    }

    #[test]
    fn test_trailing_non_delayed_entry() {
        let mut bytes = MAGIC.to_vec();
        bytes.push(TAG_INT | 0x20);
        bytes.push(TAG_INT | 0x20);
        assert!(Decoder::new().decode(&bytes, None).unwrap_err().is_format());
    }
}

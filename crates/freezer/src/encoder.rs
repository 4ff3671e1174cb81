//! Value graph encoder.
//!
//! Walks a value graph depth first and writes one tagged entry per node.
//! Every node except types takes the next sequence id before its
//! children are written; a node met again is written as a back-reference
//! to that id, which is what makes cycles and sharing survive.

use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::debug;

use crate::codec::{Codec, DefaultCodec};
use crate::context::EncodeOptions;
use crate::entry::{
    Writer, COUNTER_START, MAGIC, SIZE_SHIFT, TAG_AGAIN, TAG_ARRAY, TAG_DELAYED, TAG_FLOAT,
    TAG_FUNCTION, TAG_INT, TAG_MAPPING, TAG_MULTISET, TAG_OBJECT, TAG_PROGRAM, TAG_SMALL,
    TAG_STRING, TAG_TYPE,
};
use crate::error::{FreezerError, Result};
use crate::program::{Program, ProgramFlags};
use crate::program_codec;
use crate::trace::{Trace, Tracer};
use crate::value::{
    compare_basic, FunctionRef, Identity, Object, StringValue, TypeExpr, Value, T_AND, T_ARRAY,
    T_FLOAT, T_FUNCTION, T_INT, T_MANY, T_MAPPING, T_MIXED, T_MULTISET, T_NAME, T_NOT, T_OBJECT,
    T_OR, T_PROGRAM, T_STRING, T_TYPE, T_UNKNOWN, T_VOID, T_ZERO,
};

/// Significant bits kept in a float mantissa.
const MANTISSA_BITS: i64 = 32;

/// Encodes value graphs.
///
/// ```
/// use freezer::{decode_value, Encoder, EncodeOptions, Value};
///
/// let value = Value::array(vec![Value::Int(5), Value::string("ab")]);
/// let bytes = Encoder::with_options(EncodeOptions::new()).encode(&value, None).unwrap();
/// assert_eq!(decode_value(&bytes, None).unwrap(), value);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Encoder {
    options: EncodeOptions,
}

impl Encoder {
    /// Encoder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Encoder with explicit options.
    pub fn with_options(options: EncodeOptions) -> Self {
        Encoder { options }
    }

    /// Active options.
    pub fn options(&self) -> &EncodeOptions {
        &self.options
    }

    /// Encode `value`, consulting `codec` for names.
    pub fn encode(&self, value: &Value, codec: Option<&dyn Codec>) -> Result<Vec<u8>> {
        self.run(value, codec, false).map(|(bytes, _)| bytes)
    }

    /// Encode `value` and return the listing of every entry written.
    pub fn encode_listing(&self, value: &Value, codec: Option<&dyn Codec>) -> Result<(Vec<u8>, Trace)> {
        let (bytes, listing) = self.run(value, codec, true)?;
        Ok((bytes, listing.unwrap_or_default()))
    }

    fn run(
        &self,
        value: &Value,
        codec: Option<&dyn Codec>,
        collect: bool,
    ) -> Result<(Vec<u8>, Option<Trace>)> {
        let codec: &dyn Codec = match codec {
            Some(c) => c,
            None => &DefaultCodec,
        };
        let mut state = EncodeState::new(codec, &self.options, collect);
        state.out.write_bytes(MAGIC);
        state.encode_value(value, true)?;
        state.flush_delayed()?;
        debug!(
            bytes = state.out.len(),
            ids = state.counter - COUNTER_START,
            canonical = state.canonical,
            "encoded value"
        );
        Ok((state.out.into_vec(), state.tracer.finish()))
    }
}

#[derive(Debug, Clone, Copy)]
struct Seen {
    id: i64,
    delayed: bool,
}

/// State of one top-level encode.
pub(crate) struct EncodeState<'a> {
    out: Writer,
    seen: HashMap<Identity, Seen>,
    counter: i64,
    codec: &'a dyn Codec,
    canonical: bool,
    delayed: Vec<Program>,
    depth: usize,
    max_depth: usize,
    tracer: Tracer,
}

impl<'a> EncodeState<'a> {
    fn new(codec: &'a dyn Codec, options: &EncodeOptions, collect: bool) -> Self {
        EncodeState {
            out: Writer::new(),
            seen: HashMap::new(),
            counter: COUNTER_START,
            codec,
            canonical: options.canonical,
            delayed: Vec::new(),
            depth: 0,
            max_depth: options.max_depth,
            tracer: Tracer::new(collect, options.trace),
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Low-level output
    // ═══════════════════════════════════════════════════════════════════

    pub(crate) fn entry(&mut self, tag: u8, num: i64) -> Result<()> {
        self.out.write_entry(tag, num)
    }

    pub(crate) fn number(&mut self, num: i64) -> Result<()> {
        self.out.write_number(num)
    }

    pub(crate) fn writer(&mut self) -> &mut Writer {
        &mut self.out
    }

    pub(crate) fn note(&mut self, text: impl FnOnce() -> String) {
        let offset = self.out.len();
        let depth = self.depth.saturating_sub(1);
        self.tracer.note(offset, depth, text);
    }

    fn next_id(&mut self) -> i64 {
        let id = self.counter;
        self.counter += 1;
        id
    }

    fn remember(&mut self, identity: Identity) -> i64 {
        let id = self.next_id();
        self.seen.insert(identity, Seen { id, delayed: false });
        id
    }

    // ═══════════════════════════════════════════════════════════════════
    // Values
    // ═══════════════════════════════════════════════════════════════════

    /// Encode one value. `force` asks for a program body rather than a
    /// forward reference.
    pub(crate) fn encode_value(&mut self, value: &Value, force: bool) -> Result<()> {
        if self.depth >= self.max_depth {
            return Err(FreezerError::DepthExceeded {
                max_depth: self.max_depth,
            });
        }
        self.depth += 1;
        let result = self.encode_inner(value, force);
        self.depth -= 1;
        result
    }

    fn encode_inner(&mut self, value: &Value, force: bool) -> Result<()> {
        if value.is_destructed() {
            return self.encode_inner(&Value::Int(0), force);
        }

        let identity = Identity::of(value);
        if let Some(seen) = self.seen.get(&identity).copied() {
            if seen.delayed && force {
                if let Value::Program(program) = value {
                    return self.encode_delayed(identity, seen.id, program);
                }
            }
            self.note(|| format!(".tag again, {}", seen.id));
            return self.entry(TAG_AGAIN, seen.id);
        }

        let id = match value {
            Value::Type(ty) => return self.encode_type_value(identity, ty),
            _ => self.remember(identity.clone()),
        };

        match value {
            Value::Int(n) => self.encode_int(*n),
            Value::Float(x) => self.encode_float(*x),
            Value::String(s) => self.encode_string(s),
            Value::Array(a) => {
                let items = a.borrow().clone();
                self.encode_sequence(TAG_ARRAY, items)
            }
            Value::Multiset(m) => {
                let mut items = m.borrow().clone();
                if self.canonical {
                    sort_basic(&mut items, |v| v, "multiset elements")?;
                }
                self.encode_sequence(TAG_MULTISET, items)
            }
            Value::Mapping(m) => {
                let mut pairs: Vec<(Value, Value)> = m
                    .borrow()
                    .iter()
                    .map(|(k, v)| (k.0.clone(), v.clone()))
                    .collect();
                if self.canonical {
                    sort_basic(&mut pairs, |(k, _)| k, "mapping keys")?;
                }
                self.note(|| format!(".entry mapping, {}", pairs.len()));
                self.entry(TAG_MAPPING, pairs.len() as i64)?;
                for (k, v) in &pairs {
                    self.encode_value(k, false)?;
                    self.encode_value(v, false)?;
                }
                Ok(())
            }
            Value::Object(o) => self.encode_object(value, identity, id, o),
            Value::Function(f) => self.encode_function(value, identity, id, f),
            Value::Program(p) => self.encode_program(value, identity, p, force),
            Value::Type(_) => Ok(()),
        }
    }

    fn encode_int(&mut self, n: i64) -> Result<()> {
        match i32::try_from(n) {
            Ok(small) => {
                self.note(|| format!(".integer {}", small));
                self.entry(TAG_INT, i64::from(small))
            }
            Err(_) => {
                self.note(|| format!(".bignum {}", n));
                self.entry(TAG_OBJECT, 2)?;
                self.encode_value(&Value::string(&to_base36(n)), false)
            }
        }
    }

    fn encode_float(&mut self, x: f64) -> Result<()> {
        let (mantissa, exponent) = float_parts(x);
        self.note(|| format!(".float {} {}", mantissa, exponent));
        self.entry(TAG_FLOAT, mantissa)?;
        self.entry(TAG_FLOAT, exponent)
    }

    fn encode_string(&mut self, s: &StringValue) -> Result<()> {
        self.note(|| format!(".string {:?}", s));
        match s.as_bytes() {
            Some(bytes) => {
                self.entry(TAG_STRING, bytes.len() as i64)?;
                self.out.write_bytes(bytes);
            }
            None => {
                self.entry(TAG_STRING, -1)?;
                self.out.write_entry(s.shift(), s.len() as i64)?;
                self.out.write_bytes(&s.to_be_units());
            }
        }
        Ok(())
    }

    fn encode_sequence(&mut self, tag: u8, items: Vec<Value>) -> Result<()> {
        let kind = if tag == TAG_ARRAY { "array" } else { "multiset" };
        self.note(|| format!(".entry {}, {}", kind, items.len()));
        self.entry(tag, items.len() as i64)?;
        for item in &items {
            self.encode_value(item, false)?;
        }
        Ok(())
    }

    fn encode_object(&mut self, value: &Value, identity: Identity, id: i64, object: &Object) -> Result<()> {
        if self.canonical {
            return Err(FreezerError::unsupported(
                "Canonical encoding of objects is not supported",
            ));
        }
        if let Some(name) = self.codec.nameof(value)? {
            self.note(|| ".entry object, 0".to_string());
            self.entry(TAG_OBJECT, 0)?;
            return self.encode_value(&name, false);
        }

        // Taken out of the table so that a reference from inside the
        // program body is written in full.
        self.seen.remove(&identity);
        let at = self.out.len();
        self.note(|| ".entry object, 3".to_string());
        self.entry(TAG_OBJECT, 3)?;
        self.encode_value(&Value::Program(object.program()), true)?;

        if self.seen.contains_key(&identity) {
            return self.encode_value(value, false);
        }

        self.out.patch_u8(at, TAG_OBJECT | TAG_SMALL | (1 << SIZE_SHIFT))?;
        self.note(|| ".patch object, 1".to_string());
        self.seen.insert(identity, Seen { id, delayed: false });
        let payload = self.codec.encode_object(object)?;
        self.encode_value(&payload, false)
    }

    fn encode_function(
        &mut self,
        value: &Value,
        identity: Identity,
        id: i64,
        function: &FunctionRef,
    ) -> Result<()> {
        if self.canonical {
            return Err(FreezerError::unsupported(
                "Canonical encoding of functions is not supported",
            ));
        }
        if let Some(name) = self.codec.nameof(value)? {
            self.note(|| ".entry function, 0".to_string());
            self.entry(TAG_FUNCTION, 0)?;
            return self.encode_value(&name, false);
        }

        match function {
            FunctionRef::Builtin(b) => Err(FreezerError::codec(format!(
                "Cannot encode builtin function {} without a name",
                b.name
            ))),
            FunctionRef::Member { object, reference } => {
                let name = object.member_name(*reference).ok_or_else(|| {
                    FreezerError::graph(format!("Function reference #{} has no member", reference))
                })?;
                if object.program().find_member_str(&name) != Some(*reference) {
                    return Err(FreezerError::codec("Cannot encode overloaded functions"));
                }

                self.seen.remove(&identity);
                self.note(|| ".entry function, 1".to_string());
                self.entry(TAG_FUNCTION, 1)?;
                self.encode_value(&Value::Object(object.clone()), false)?;
                self.encode_value(&Value::String(name), false)?;
                self.seen.insert(identity, Seen { id, delayed: false });
                Ok(())
            }
        }
    }

    fn encode_program(
        &mut self,
        value: &Value,
        identity: Identity,
        program: &Program,
        force: bool,
    ) -> Result<()> {
        if self.canonical {
            return Err(FreezerError::unsupported(
                "Canonical encoding of programs is not supported",
            ));
        }
        if let Some(name) = self.codec.nameof(value)? {
            self.note(|| ".entry program, 0".to_string());
            self.entry(TAG_PROGRAM, 0)?;
            return self.encode_value(&name, false);
        }
        if program.flags().contains(ProgramFlags::HAS_C_METHODS) {
            return Err(FreezerError::codec(format!(
                "Cannot encode native {:?} without a name",
                program
            )));
        }

        if !force {
            self.note(|| ".entry program, 5".to_string());
            self.entry(TAG_PROGRAM, 5)?;
            if let Some(seen) = self.seen.get_mut(&identity) {
                seen.delayed = true;
            }
            self.delayed.push(program.clone());
            debug!(program = ?program.identity(), "program body delayed");
            return Ok(());
        }

        self.note(|| ".entry program, 4".to_string());
        self.entry(TAG_PROGRAM, 4)?;
        program_codec::encode_program(self, program)
    }

    fn encode_delayed(&mut self, identity: Identity, id: i64, program: &Program) -> Result<()> {
        self.seen.insert(identity, Seen { id, delayed: false });
        self.delayed.retain(|p| !p.ptr_eq(program));
        self.note(|| format!(".tag delayed, {}", id));
        self.entry(TAG_DELAYED, id)?;
        self.note(|| ".entry program, 4".to_string());
        self.entry(TAG_PROGRAM, 4)?;
        program_codec::encode_program(self, program)
    }

    /// Write the bodies of programs that were only referenced forward.
    fn flush_delayed(&mut self) -> Result<()> {
        while let Some(program) = self.delayed.first().cloned() {
            self.encode_value(&Value::Program(program), true)?;
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════
    // Types
    // ═══════════════════════════════════════════════════════════════════

    fn encode_type_value(&mut self, identity: Identity, ty: &TypeExpr) -> Result<()> {
        if self.canonical {
            return Err(FreezerError::unsupported(
                "Canonical encoding of types is not supported",
            ));
        }
        self.note(|| format!(".type {:?}", ty));
        self.entry(TAG_TYPE, 0)?;
        self.encode_type(ty)?;
        // Types are numbered after their contents.
        self.remember(identity);
        Ok(())
    }

    fn encode_type(&mut self, ty: &TypeExpr) -> Result<()> {
        match ty {
            TypeExpr::Array(t) => {
                self.out.write_u8(T_ARRAY);
                self.encode_type(t)
            }
            TypeExpr::Mapping(k, v) => {
                self.out.write_u8(T_MAPPING);
                self.encode_type(k)?;
                self.encode_type(v)
            }
            TypeExpr::Multiset(t) => {
                self.out.write_u8(T_MULTISET);
                self.encode_type(t)
            }
            TypeExpr::Object { exact, program } => {
                self.out.write_u8(T_OBJECT);
                self.out.write_u8(u8::from(*exact));
                match program {
                    Some(p) => self.encode_value(&Value::Program(p.clone()), false),
                    None => self.encode_value(&Value::Int(0), false),
                }
            }
            TypeExpr::Function { args, rest, ret } => {
                self.out.write_u8(T_FUNCTION);
                for arg in args {
                    self.encode_type(arg)?;
                }
                self.out.write_u8(T_MANY);
                self.encode_type(rest)?;
                self.encode_type(ret)
            }
            TypeExpr::Program(t) => {
                self.out.write_u8(T_PROGRAM);
                self.encode_type(t)
            }
            TypeExpr::String => {
                self.out.write_u8(T_STRING);
                Ok(())
            }
            TypeExpr::Type(t) => {
                self.out.write_u8(T_TYPE);
                self.encode_type(t)
            }
            TypeExpr::Int { min, max } => {
                self.out.write_u8(T_INT);
                self.out.write_be32(*min as u32);
                self.out.write_be32(*max as u32);
                Ok(())
            }
            TypeExpr::Float => {
                self.out.write_u8(T_FLOAT);
                Ok(())
            }
            TypeExpr::Zero => {
                self.out.write_u8(T_ZERO);
                Ok(())
            }
            TypeExpr::Void => {
                self.out.write_u8(T_VOID);
                Ok(())
            }
            TypeExpr::Name(name, t) => {
                self.out.write_u8(T_NAME);
                self.encode_value(&Value::String(name.clone()), false)?;
                self.encode_type(t)
            }
            TypeExpr::Unknown => {
                self.out.write_u8(T_UNKNOWN);
                Ok(())
            }
            TypeExpr::Mixed => {
                self.out.write_u8(T_MIXED);
                Ok(())
            }
            TypeExpr::Not(t) => {
                self.out.write_u8(T_NOT);
                self.encode_type(t)
            }
            TypeExpr::And(a, b) => {
                self.out.write_u8(T_AND);
                self.encode_type(a)?;
                self.encode_type(b)
            }
            TypeExpr::Or(a, b) => {
                self.out.write_u8(T_OR);
                self.encode_type(a)?;
                self.encode_type(b)
            }
        }
    }
}

/// Stable sort by the basic-type order; fails on anything not basic.
fn sort_basic<T>(items: &mut [T], key: impl Fn(&T) -> &Value, what: &str) -> Result<()> {
    if let Some(bad) = items.iter().map(&key).find(|v| !v.is_basic()) {
        return Err(FreezerError::unsupported(format!(
            "Canonical encoding requires basic {}, found {}",
            what,
            bad.type_name()
        )));
    }
    items.sort_by(|a, b| compare_basic(key(a), key(b)).unwrap_or(Ordering::Equal));
    Ok(())
}

/// Base-36 digits of `n`, with a leading `-` when negative.
pub(crate) fn to_base36(n: i64) -> String {
    let mut magnitude = n.unsigned_abs();
    let mut digits = Vec::new();
    loop {
        let digit = (magnitude % 36) as u32;
        digits.push(char::from_digit(digit, 36).unwrap_or('0'));
        magnitude /= 36;
        if magnitude == 0 {
            break;
        }
    }
    if n < 0 {
        digits.push('-');
    }
    digits.iter().rev().collect()
}

/// Split a float into the mantissa and exponent written on the wire.
///
/// The mantissa keeps at most 32 significant bits (rounded) with
/// trailing zero bits stripped. Zeros, infinities and NaN use mantissa
/// 0 and a reserved exponent.
pub(crate) fn float_parts(x: f64) -> (i64, i64) {
    if x.is_nan() {
        return (0, -4);
    }
    if x.is_infinite() {
        return (0, if x > 0.0 { -1 } else { -2 });
    }
    if x == 0.0 {
        return (0, i64::from(x.is_sign_negative()));
    }

    let bits = x.to_bits();
    let negative = bits >> 63 != 0;
    let biased = ((bits >> 52) & 0x7ff) as i64;
    let fraction = bits & ((1u64 << 52) - 1);
    let (mut significand, mut exponent) = if biased == 0 {
        (fraction, -1074)
    } else {
        (fraction | (1u64 << 52), biased - 1075)
    };

    let width = 64 - i64::from(significand.leading_zeros());
    if width > MANTISSA_BITS {
        let shift = (width - MANTISSA_BITS) as u32;
        significand = (significand + (1u64 << (shift - 1))) >> shift;
        exponent += i64::from(shift);
        if significand >> MANTISSA_BITS != 0 {
            significand >>= 1;
            exponent += 1;
        }
    }
    let zeros = significand.trailing_zeros();
    significand >>= zeros;
    exponent += i64::from(zeros);

    let mantissa = significand as i64;
    (if negative { -mantissa } else { mantissa }, exponent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_float_parts() {
        assert_eq!(float_parts(1.5), (3, -1));
        assert_eq!(float_parts(-8.0), (-1, 3));
        assert_eq!(float_parts(0.0), (0, 0));
        assert_eq!(float_parts(-0.0), (0, 1));
        assert_eq!(float_parts(f64::INFINITY), (0, -1));
        assert_eq!(float_parts(f64::NEG_INFINITY), (0, -2));
        assert_eq!(float_parts(f64::NAN), (0, -4));
    }

    #[test]
    fn test_float_mantissa_is_rounded_to_32_bits() {
        let (m, _) = float_parts(std::f64::consts::PI);
        assert!(m > 0 && m < (1i64 << 32));
        assert_eq!(m & 1, 1);
    }

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(-36), "-10");
        assert_eq!(i64::from_str_radix(&to_base36(i64::MIN), 36), Ok(i64::MIN));
        assert_eq!(i64::from_str_radix(&to_base36(i64::MAX), 36), Ok(i64::MAX));
    }

    #[test]
    fn test_header_and_small_int() {
        let bytes = Encoder::new().encode(&Value::Int(1), None).unwrap();
        assert_eq!(bytes, vec![0xb6, b'k', b'e', b'0', TAG_INT | TAG_SMALL | (1 << SIZE_SHIFT)]);
    }

    #[test]
    fn test_canonical_rejects_identity_kinds() {
        let encoder = Encoder::with_options(EncodeOptions::canonical());
        let program = crate::program::ProgramBuilder::new().finish().unwrap();
        let err = encoder.encode(&Value::Program(program), None);
        assert!(matches!(err, Err(FreezerError::Unsupported(_))));

        let mapping = Value::mapping(vec![(Value::array(vec![]), Value::Int(1))]);
        assert!(matches!(
            encoder.encode(&mapping, None),
            Err(FreezerError::Unsupported(_))
        ));
    }

    #[test]
    fn test_depth_limit() {
        let mut value = Value::Int(0);
        for _ in 0..10 {
            value = Value::array(vec![value]);
        }
        let encoder = Encoder::with_options(EncodeOptions::new().with_max_depth(5));
        assert!(matches!(
            encoder.encode(&value, None),
            Err(FreezerError::DepthExceeded { max_depth: 5 })
        ));
    }
}

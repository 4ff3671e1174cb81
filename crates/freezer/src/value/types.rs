//! Type expressions and their byte alphabet

use std::fmt;

use super::{StringValue, Value};
use crate::program::Program;

// Byte alphabet of the serialized type grammar.
pub(crate) const T_ARRAY: u8 = 0;
pub(crate) const T_MAPPING: u8 = 1;
pub(crate) const T_MULTISET: u8 = 2;
pub(crate) const T_OBJECT: u8 = 3;
pub(crate) const T_FUNCTION: u8 = 4;
pub(crate) const T_PROGRAM: u8 = 5;
pub(crate) const T_STRING: u8 = 6;
pub(crate) const T_TYPE: u8 = 7;
pub(crate) const T_INT: u8 = 8;
pub(crate) const T_FLOAT: u8 = 9;
pub(crate) const T_ZERO: u8 = 14;
pub(crate) const T_VOID: u8 = 16;
pub(crate) const T_MANY: u8 = 17;
pub(crate) const T_NAME: u8 = 241;
pub(crate) const T_UNKNOWN: u8 = 247;
pub(crate) const T_MIXED: u8 = 251;
pub(crate) const T_NOT: u8 = 253;
pub(crate) const T_AND: u8 = 254;
pub(crate) const T_OR: u8 = 255;

/// A type expression.
///
/// Object types may point at a [`Program`], which makes types part of the
/// value graph: they are encoded inline and can reference programs that
/// are still being built.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum TypeExpr {
    /// `array(t)`
    Array(Box<TypeExpr>),
    /// `mapping(k:v)`
    Mapping(Box<TypeExpr>, Box<TypeExpr>),
    /// `multiset(t)`
    Multiset(Box<TypeExpr>),
    /// `object`, optionally tied to a program
    Object {
        /// Exactly this program rather than anything implementing it
        exact: bool,
        /// Program the object must come from
        program: Option<Program>,
    },
    /// `function(args..., rest...: ret)`
    Function {
        /// Fixed arguments
        args: Vec<TypeExpr>,
        /// Type of any further arguments (`void` for none)
        rest: Box<TypeExpr>,
        /// Return type
        ret: Box<TypeExpr>,
    },
    /// `program(t)`
    Program(Box<TypeExpr>),
    /// `string`
    String,
    /// `type(t)`
    Type(Box<TypeExpr>),
    /// `int(min..max)`
    Int {
        /// Lower bound
        min: i32,
        /// Upper bound
        max: i32,
    },
    /// `float`
    Float,
    /// The type of the literal zero
    Zero,
    /// `void`
    Void,
    /// A named alias of another type
    Name(StringValue, Box<TypeExpr>),
    /// Placeholder for an unknown type
    Unknown,
    /// `mixed`
    Mixed,
    /// `!t`
    Not(Box<TypeExpr>),
    /// `a & b`
    And(Box<TypeExpr>, Box<TypeExpr>),
    /// `a | b`
    Or(Box<TypeExpr>, Box<TypeExpr>),
}

impl TypeExpr {
    /// Unbounded `int`.
    pub fn int() -> Self {
        TypeExpr::Int {
            min: i32::MIN,
            max: i32::MAX,
        }
    }

    /// `int(min..max)`
    pub fn int_range(min: i32, max: i32) -> Self {
        TypeExpr::Int { min, max }
    }

    /// `array(t)`
    pub fn array(elem: TypeExpr) -> Self {
        TypeExpr::Array(Box::new(elem))
    }

    /// `mapping(k:v)`
    pub fn mapping(key: TypeExpr, value: TypeExpr) -> Self {
        TypeExpr::Mapping(Box::new(key), Box::new(value))
    }

    /// `multiset(t)`
    pub fn multiset(elem: TypeExpr) -> Self {
        TypeExpr::Multiset(Box::new(elem))
    }

    /// `function(args...:ret)` without varargs.
    pub fn function(args: Vec<TypeExpr>, ret: TypeExpr) -> Self {
        TypeExpr::Function {
            args,
            rest: Box::new(TypeExpr::Void),
            ret: Box::new(ret),
        }
    }

    /// `object(program)`
    pub fn object_of(program: &Program) -> Self {
        TypeExpr::Object {
            exact: false,
            program: Some(program.clone()),
        }
    }

    /// `a | b`
    pub fn or(a: TypeExpr, b: TypeExpr) -> Self {
        TypeExpr::Or(Box::new(a), Box::new(b))
    }

    /// Named alias.
    pub fn named(name: &str, inner: TypeExpr) -> Self {
        TypeExpr::Name(StringValue::from(name), Box::new(inner))
    }

    /// Coarse type of a value, used for constant definitions.
    pub fn of_value(value: &Value) -> Self {
        match value {
            Value::Int(n) => match i32::try_from(*n) {
                Ok(n) => TypeExpr::int_range(n, n),
                Err(_) => TypeExpr::int(),
            },
            Value::Float(_) => TypeExpr::Float,
            Value::String(_) => TypeExpr::String,
            Value::Array(_) => TypeExpr::array(TypeExpr::Mixed),
            Value::Mapping(_) => TypeExpr::mapping(TypeExpr::Mixed, TypeExpr::Mixed),
            Value::Multiset(_) => TypeExpr::multiset(TypeExpr::Mixed),
            Value::Object(o) => TypeExpr::object_of(&o.program()),
            Value::Function(_) => TypeExpr::Function {
                args: Vec::new(),
                rest: Box::new(TypeExpr::Mixed),
                ret: Box::new(TypeExpr::Mixed),
            },
            Value::Program(_) => TypeExpr::Program(Box::new(TypeExpr::Mixed)),
            Value::Type(t) => TypeExpr::Type(Box::new(t.clone())),
        }
    }

    /// Run-time kind byte of a variable of this type. Named and
    /// restricted types collapse to their storage kind; anything that
    /// may hold several kinds is `mixed`.
    pub fn run_time_type(&self) -> u8 {
        match self {
            TypeExpr::Name(_, inner) => inner.run_time_type(),
            TypeExpr::Array(_) => T_ARRAY,
            TypeExpr::Mapping(..) => T_MAPPING,
            TypeExpr::Multiset(_) => T_MULTISET,
            TypeExpr::Object { .. } => T_OBJECT,
            TypeExpr::Function { .. } => T_FUNCTION,
            TypeExpr::Program(_) => T_PROGRAM,
            TypeExpr::String => T_STRING,
            TypeExpr::Type(_) => T_TYPE,
            TypeExpr::Int { .. } | TypeExpr::Zero => T_INT,
            TypeExpr::Float => T_FLOAT,
            TypeExpr::Void => T_VOID,
            _ => T_MIXED,
        }
    }
}

impl fmt::Debug for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Array(t) => write!(f, "array({:?})", t),
            TypeExpr::Mapping(k, v) => write!(f, "mapping({:?}:{:?})", k, v),
            TypeExpr::Multiset(t) => write!(f, "multiset({:?})", t),
            TypeExpr::Object { exact, program } => match program {
                Some(p) if *exact => write!(f, "object(={:?})", p),
                Some(p) => write!(f, "object({:?})", p),
                None => write!(f, "object"),
            },
            TypeExpr::Function { args, rest, ret } => {
                write!(f, "function(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}", a)?;
                }
                if **rest != TypeExpr::Void {
                    if !args.is_empty() {
                        write!(f, ", ")?;
                    }
                    write!(f, "{:?}...", rest)?;
                }
                write!(f, ":{:?})", ret)
            }
            TypeExpr::Program(t) => write!(f, "program({:?})", t),
            TypeExpr::String => write!(f, "string"),
            TypeExpr::Type(t) => write!(f, "type({:?})", t),
            TypeExpr::Int { min, max } if *min == i32::MIN && *max == i32::MAX => {
                write!(f, "int")
            }
            TypeExpr::Int { min, max } => write!(f, "int({}..{})", min, max),
            TypeExpr::Float => write!(f, "float"),
            TypeExpr::Zero => write!(f, "zero"),
            TypeExpr::Void => write!(f, "void"),
            TypeExpr::Name(n, t) => write!(f, "{}={:?}", n, t),
            TypeExpr::Unknown => write!(f, "__unknown__"),
            TypeExpr::Mixed => write!(f, "mixed"),
            TypeExpr::Not(t) => write!(f, "!{:?}", t),
            TypeExpr::And(a, b) => write!(f, "{:?} & {:?}", a, b),
            TypeExpr::Or(a, b) => write!(f, "{:?} | {:?}", a, b),
        }
    }
}

//! Callable values: bound members and builtins

use std::fmt;
use std::rc::Rc;

use super::{Identity, Object, StringValue};

/// A native function not backed by any program.
///
/// Builtins have no structure to serialize; they only survive encoding
/// through a codec that can name them.
#[derive(Debug, PartialEq, Eq)]
pub struct Builtin {
    /// Name the runtime knows the builtin by
    pub name: String,
}

/// A function value.
#[derive(Clone)]
pub enum FunctionRef {
    /// Member `reference` of `object`'s program, bound to `object`
    Member {
        /// Instance the function is bound to
        object: Object,
        /// Reference number in the object's program
        reference: usize,
    },
    /// Native function
    Builtin(Rc<Builtin>),
}

impl FunctionRef {
    /// Bind member `reference` of `object`.
    pub fn member(object: Object, reference: usize) -> Self {
        FunctionRef::Member { object, reference }
    }

    /// Create a builtin.
    pub fn builtin(name: impl Into<String>) -> Self {
        FunctionRef::Builtin(Rc::new(Builtin { name: name.into() }))
    }

    /// Member name, for bound members.
    pub fn name(&self) -> Option<StringValue> {
        match self {
            FunctionRef::Member { object, reference } => object.member_name(*reference),
            FunctionRef::Builtin(b) => Some(StringValue::from(b.name.as_str())),
        }
    }

    /// Bound object, for bound members.
    pub fn object(&self) -> Option<&Object> {
        match self {
            FunctionRef::Member { object, .. } => Some(object),
            FunctionRef::Builtin(_) => None,
        }
    }

    pub(crate) fn identity(&self) -> Identity {
        match self {
            FunctionRef::Member { object, reference } => {
                Identity::Member(object.identity(), *reference)
            }
            FunctionRef::Builtin(b) => Identity::Shared(super::refs::address(b)),
        }
    }
}

impl PartialEq for FunctionRef {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                FunctionRef::Member { object: a, reference: x },
                FunctionRef::Member { object: b, reference: y },
            ) => a.ptr_eq(b) && x == y,
            (FunctionRef::Builtin(a), FunctionRef::Builtin(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionRef::Member { object, reference } => match object.member_name(*reference) {
                Some(name) => write!(f, "{:?}->{}", object, name),
                None => write!(f, "{:?}->#{}", object, reference),
            },
            FunctionRef::Builtin(b) => write!(f, "<builtin {}>", b.name),
        }
    }
}

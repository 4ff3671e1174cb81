//! Debug implementation for Value

use std::collections::HashSet;
use std::fmt;

use super::refs::address;
use super::*;

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut open = HashSet::new();
        write_value(self, f, &mut open)
    }
}

// Containers already being printed are shown as `<cycle>`.
fn write_value(v: &Value, f: &mut fmt::Formatter<'_>, open: &mut HashSet<usize>) -> fmt::Result {
    match v {
        Value::Int(n) => write!(f, "{}", n),
        Value::Float(x) => write!(f, "{:?}", x),
        Value::String(s) => write!(f, "{:?}", s),
        Value::Type(t) => write!(f, "type({:?})", t),

        Value::Array(a) => {
            if !open.insert(address(a)) {
                return write!(f, "<cycle>");
            }
            write!(f, "({{")?;
            for (i, item) in a.borrow().iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write_value(item, f, open)?;
            }
            open.remove(&address(a));
            write!(f, "}})")
        }

        Value::Mapping(m) => {
            if !open.insert(address(m)) {
                return write!(f, "<cycle>");
            }
            write!(f, "([")?;
            for (i, (k, val)) in m.borrow().iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write_value(&k.0, f, open)?;
                write!(f, ": ")?;
                write_value(val, f, open)?;
            }
            open.remove(&address(m));
            write!(f, "])")
        }

        Value::Multiset(m) => {
            if !open.insert(address(m)) {
                return write!(f, "<cycle>");
            }
            write!(f, "(<")?;
            for (i, item) in m.borrow().iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write_value(item, f, open)?;
            }
            open.remove(&address(m));
            write!(f, ">)")
        }

        Value::Object(o) => write!(f, "{:?}", o),
        Value::Function(func) => write!(f, "{:?}", func),
        Value::Program(p) => write!(f, "{:?}", p),
    }
}

use std::{fmt, sync::Arc};

use crate::{Namespace, Symbol};

/// Opaque handle to a code object owned by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodeId(pub u64);

/// Values stored in constant and shared-variable tables.
///
/// Everything that is not a namespace or an immediate lives in the object
/// model and is referenced through `Object`.
#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Fixnum(i64),
    Symbol(Symbol),
    Str(Arc<str>),
    Namespace(Arc<Namespace>),
    Object(u64),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Nil, Self::Nil) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Fixnum(a), Self::Fixnum(b)) => a == b,
            (Self::Symbol(a), Self::Symbol(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            // namespaces compare by identity
            (Self::Namespace(a), Self::Namespace(b)) => Arc::ptr_eq(a, b),
            (Self::Object(a), Self::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Fixnum(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(Arc::from(value))
    }
}

impl From<Arc<Namespace>> for Value {
    fn from(value: Arc<Namespace>) -> Self {
        Self::Namespace(value)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Namespace(ns) => write!(f, "Namespace({})", ns.display_name()),
            Self::Object(handle) => write!(f, "Object({handle:#x})"),
            other => write!(f, "{other}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => f.write_str("nil"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Fixnum(n) => write!(f, "{n}"),
            Self::Symbol(s) => write!(f, ":{s}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Namespace(ns) => f.write_str(&ns.display_name()),
            Self::Object(handle) => write!(f, "#<Object:{handle:#x}>"),
        }
    }
}

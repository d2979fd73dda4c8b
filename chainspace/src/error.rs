use std::fmt;

use crate::Symbol;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceError {
    /// alias/undef/visibility target (or a strict constant removal) did not resolve
    NameNotFound { namespace: String, name: Symbol },
    FrozenViolation { namespace: String },
    CyclicAncestry { namespace: String, module: String },
}

impl fmt::Display for NamespaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NameNotFound { namespace, name } => {
                write!(f, "undefined name `{name}` for `{namespace}`")
            }
            Self::FrozenViolation { namespace } => {
                write!(f, "can't modify frozen namespace `{namespace}`")
            }
            Self::CyclicAncestry { namespace, module } => {
                write!(
                    f,
                    "including `{module}` into `{namespace}` would make the ancestry cyclic"
                )
            }
        }
    }
}

impl std::error::Error for NamespaceError {}

use std::fmt;

use crate::{CodeId, Symbol};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    Private,
    Protected,
    ModuleFunction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodBody {
    Code(CodeId),
    /// Resolvable but not callable: dispatch must fail once this is reached.
    Undefined,
}

/// A method table entry.
///
/// Entries are values: alias, visibility changes and mixin copies all install
/// a fresh copy, so edits to one table never show up in another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodEntry {
    pub name: Symbol,
    /// name of the namespace the body was defined in
    pub owner: Symbol,
    pub visibility: Visibility,
    pub body: MethodBody,
}

impl MethodEntry {
    pub fn new(name: Symbol, owner: Symbol, visibility: Visibility, code: CodeId) -> Self {
        Self {
            name,
            owner,
            visibility,
            body: MethodBody::Code(code),
        }
    }

    #[inline]
    pub fn is_undefined(&self) -> bool {
        matches!(self.body, MethodBody::Undefined)
    }

    #[inline]
    pub fn code(&self) -> Option<CodeId> {
        match self.body {
            MethodBody::Code(code) => Some(code),
            MethodBody::Undefined => None,
        }
    }

    pub fn with_name(&self, name: Symbol) -> Self {
        Self {
            name,
            ..self.clone()
        }
    }

    pub fn with_visibility(&self, visibility: Visibility) -> Self {
        Self {
            visibility,
            ..self.clone()
        }
    }

    /// The marker installed by `undef`, attributed to the namespace doing it.
    pub fn undefined(&self, owner: Symbol) -> Self {
        Self {
            name: self.name.clone(),
            owner,
            visibility: self.visibility,
            body: MethodBody::Undefined,
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Protected => "protected",
            Self::ModuleFunction => "module_function",
        };
        f.write_str(name)
    }
}

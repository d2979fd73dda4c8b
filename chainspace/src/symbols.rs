use std::{borrow::Borrow, collections::HashSet, fmt, hash::Hash, sync::Arc};

use parking_lot::RwLock;

/// An interned name. Equality and hashing go by content, so a `Symbol` can be
/// looked up in a table with a plain `&str`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(Arc<str>);

struct SymbolsImpl {
    table: HashSet<Symbol>,
}

/// Table of interned names shared by every namespace of a registry.
pub struct Symbols(RwLock<SymbolsImpl>);

impl Symbol {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` if both symbols share one allocation (same interner).
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ":{}", self.0)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl SymbolsImpl {
    fn new() -> Self {
        Self {
            table: HashSet::new(),
        }
    }

    fn get_or_add(&mut self, value: &str) -> Symbol {
        if let Some(symbol) = self.table.get(value) {
            return symbol.clone();
        }
        let symbol = Symbol::from(value);
        self.table.insert(symbol.clone());
        symbol
    }

    fn get(&self, value: &str) -> Option<Symbol> {
        self.table.get(value).cloned()
    }
}

impl Symbols {
    pub fn new() -> Self {
        Self(RwLock::new(SymbolsImpl::new()))
    }

    pub fn intern(&self, value: &str) -> Symbol {
        if let Some(symbol) = self.0.read().get(value) {
            return symbol;
        }
        self.0.write().get_or_add(value)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.0.read().table.len()
    }
}

impl Default for Symbols {
    fn default() -> Self {
        Self::new()
    }
}

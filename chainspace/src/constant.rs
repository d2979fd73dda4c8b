use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use log::{debug, warn};

use crate::{Namespace, NamespaceError, Notice, Symbol, Value, lookup};

/// A constant binding. Tables share entries through `Arc` so the privacy flag
/// can be flipped in place on whatever entry a lookup returned.
#[derive(Debug)]
pub struct ConstantEntry {
    value: Value,
    private: AtomicBool,
}

impl ConstantEntry {
    pub fn new(value: Value, private: bool) -> Self {
        Self {
            value,
            private: AtomicBool::new(private),
        }
    }

    #[inline]
    pub fn value(&self) -> &Value {
        &self.value
    }

    #[inline]
    pub fn is_private(&self) -> bool {
        self.private.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_private(&self, private: bool) {
        self.private.store(private, Ordering::Release);
    }
}

impl Namespace {
    /// Own table, then the lexical parent's full lookup, then the ancestry.
    pub fn lookup_constant(&self, name: &str) -> Option<Arc<ConstantEntry>> {
        let head = {
            let state = self.state.read();
            if let Some(found) = state.constants.get(name) {
                return Some(found.clone());
            }
            state.head.clone()
        };

        if let Some(parent) = self.lexical_parent() {
            if let Some(found) = parent.lookup_constant(name) {
                return Some(found);
            }
        }

        lookup::find_constant(&head, name)
    }

    /// Own table, then the ancestry; lexical scope is not consulted.
    pub(crate) fn lookup_ancestral_constant(&self, name: &str) -> Option<Arc<ConstantEntry>> {
        let head = {
            let state = self.state.read();
            if let Some(found) = state.constants.get(name) {
                return Some(found.clone());
            }
            state.head.clone()
        };
        lookup::find_constant(&head, name)
    }

    pub fn own_constant(&self, name: &str) -> Option<Arc<ConstantEntry>> {
        self.state.read().constants.get(name).cloned()
    }

    /// Bind `name` in this namespace. Redefinition is allowed and only
    /// reported.
    pub fn set_constant(&self, name: &str, value: Value) -> Result<(), NamespaceError> {
        let _writer = self.shared.writer.lock();
        self.check_frozen()?;
        let name = self.intern(name);
        let previous = self
            .state
            .write()
            .constants
            .insert(name.clone(), Arc::new(ConstantEntry::new(value, false)));
        if previous.is_some() {
            self.report_redefinition(name);
        } else {
            debug!("{}: constant {name}", self.display_name());
        }
        self.new_version();
        Ok(())
    }

    /// Bind `name` here and on the singleton namespace.
    pub fn set_module_constant(&self, name: &str, value: Value) -> Result<(), NamespaceError> {
        let _writer = self.shared.writer.lock();
        self.check_frozen()?;
        let singleton = self.singleton_namespace();
        singleton.check_frozen()?;
        self.set_constant(name, value.clone())?;
        singleton.set_constant(name, value)
    }

    /// Only the own table. Absence is an error in strict mode.
    pub fn remove_constant(&self, name: &str) -> Result<(), NamespaceError> {
        let _writer = self.shared.writer.lock();
        self.check_frozen()?;
        let removed = self.state.write().constants.remove(name);
        if removed.is_none() {
            if self.shared.config.strict_constant_removal {
                return Err(self.name_not_found(name));
            }
            return Ok(());
        }
        debug!("{}: removed constant {name}", self.display_name());
        self.new_version();
        Ok(())
    }

    /// Flag the entry `name` resolves to as private. The namespace holding
    /// the entry must not be frozen and is the one whose version moves.
    pub fn set_constant_private(&self, name: &str) -> Result<(), NamespaceError> {
        let _writer = self.shared.writer.lock();
        self.check_frozen()?;
        let held_here = self.own_constant(name).is_some();
        if !self.mark_constant_private(name, true)? {
            return Err(self.name_not_found(name));
        }
        if !held_here {
            // resolutions from here changed even when the holder is only a
            // lexical parent
            self.new_version();
        }
        Ok(())
    }

    /// Same search order as `lookup_constant` (without the lexical stage
    /// when `lexical` is false). `Ok(false)` means nothing resolved.
    pub(crate) fn mark_constant_private(
        &self,
        name: &str,
        lexical: bool,
    ) -> Result<bool, NamespaceError> {
        let (own, head) = {
            let state = self.state.read();
            (state.constants.get(name).cloned(), state.head.clone())
        };
        if let Some(entry) = own {
            self.check_frozen()?;
            entry.set_private(true);
            debug!("{}: constant {name} is private", self.display_name());
            self.new_version();
            return Ok(true);
        }

        if lexical {
            if let Some(parent) = self.lexical_parent() {
                if parent.mark_constant_private(name, true)? {
                    return Ok(true);
                }
            }
        }

        lookup::mark_constant_private(&head, name)
    }

    pub fn constant_names(&self) -> Vec<Symbol> {
        let mut names: Vec<_> = self.state.read().constants.keys().cloned().collect();
        names.sort();
        names
    }

    fn report_redefinition(&self, name: Symbol) {
        let namespace = self.display_name();
        if self.shared.config.warn_on_constant_redefinition {
            warn!("already initialized constant {namespace}::{name}");
        }
        self.shared.notify(&Notice::ConstantRedefined { namespace, name });
    }
}

use std::collections::BTreeSet;

use log::debug;

use crate::{Namespace, NamespaceError, Symbol, Value, lookup};

// Shared ("class") variables belong to a hierarchy rather than to one
// namespace: reads look here first, writes go to the first existing binding
// in the ancestry and only create a local one when there is none.
impl Namespace {
    pub fn lookup_shared_variable(&self, name: &str) -> Option<Value> {
        let head = {
            let state = self.state.read();
            if let Some(found) = state.shared_variables.get(name) {
                return Some(found.clone());
            }
            state.head.clone()
        };
        lookup::find_shared_variable(&head, name)
    }

    pub fn set_shared_variable(&self, name: &str, value: Value) -> Result<(), NamespaceError> {
        let _writer = self.shared.writer.lock();
        self.check_frozen()?;
        let name = self.intern(name);
        if self.assign_existing_shared_variable(&name, &value)? {
            return Ok(());
        }
        self.bind_shared_variable(name, value);
        Ok(())
    }

    /// Create (or overwrite) a binding in this namespace without looking at
    /// the ancestry.
    pub fn set_shared_variable_local(
        &self,
        name: &str,
        value: Value,
    ) -> Result<(), NamespaceError> {
        let _writer = self.shared.writer.lock();
        self.check_frozen()?;
        let name = self.intern(name);
        let mut state = self.state.write();
        if let Some(slot) = state.shared_variables.get_mut(&name) {
            *slot = value;
            return Ok(());
        }
        drop(state);
        self.bind_shared_variable(name, value);
        Ok(())
    }

    pub fn remove_shared_variable(&self, name: &str) -> Result<(), NamespaceError> {
        let _writer = self.shared.writer.lock();
        self.check_frozen()?;
        if self.state.write().shared_variables.remove(name).is_some() {
            debug!("{}: removed shared variable {name}", self.display_name());
            self.new_version();
        }
        Ok(())
    }

    /// Sorted union of this namespace's and its ancestry's bindings.
    pub fn shared_variable_names(&self) -> Vec<Symbol> {
        let mut names = BTreeSet::new();
        self.collect_shared_variable_names(&mut names);
        names.into_iter().collect()
    }

    pub(crate) fn collect_shared_variable_names(&self, out: &mut BTreeSet<Symbol>) {
        let head = {
            let state = self.state.read();
            out.extend(state.shared_variables.keys().cloned());
            state.head.clone()
        };
        lookup::collect_shared_variable_names(&head, out);
    }

    /// Ancestry first, then the own table. The namespace actually holding
    /// the binding must not be frozen.
    pub(crate) fn assign_existing_shared_variable(
        &self,
        name: &Symbol,
        value: &Value,
    ) -> Result<bool, NamespaceError> {
        let head = self.lookup_head();
        if lookup::assign_existing_shared_variable(&head, name, value)? {
            return Ok(true);
        }

        if !self.state.read().shared_variables.contains_key(name) {
            return Ok(false);
        }
        self.check_frozen()?;
        self.state
            .write()
            .shared_variables
            .insert(name.clone(), value.clone());
        Ok(true)
    }

    // a new binding can shadow an ancestor's, so resolutions change
    fn bind_shared_variable(&self, name: Symbol, value: Value) {
        debug!("{}: new shared variable {name}", self.display_name());
        self.state.write().shared_variables.insert(name, value);
        self.new_version();
    }
}

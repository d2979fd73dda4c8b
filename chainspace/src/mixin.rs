use std::{collections::HashSet, sync::Arc};

use log::debug;

use crate::{ConstantEntry, LookupNode, Namespace, NamespaceError, lookup};

impl Namespace {
    /// Put `module` in front of the current lookup head, so it shadows
    /// earlier inclusions and the superclass but never this namespace's own
    /// tables.
    pub fn include(self: &Arc<Self>, module: &Arc<Namespace>) -> Result<(), NamespaceError> {
        let _writer = self.shared.writer.lock();
        self.check_frozen()?;
        if module.chain_reaches(self.id(), &mut HashSet::new()) {
            return Err(NamespaceError::CyclicAncestry {
                namespace: self.display_name(),
                module: module.display_name(),
            });
        }
        {
            let mut state = self.state.write();
            let next = state.head.clone();
            state.head = Arc::new(LookupNode::Fork {
                module: module.clone(),
                next,
            });
        }
        debug!("{}: include {}", self.display_name(), module.display_name());
        self.new_version();
        module.add_dependent(self);
        Ok(())
    }

    /// Copy this namespace's own constants and methods into `other`. The
    /// copies are independent entries.
    pub fn append_features(&self, other: &Namespace) -> Result<(), NamespaceError> {
        let _writer = self.shared.writer.lock();
        other.check_frozen()?;

        let (constants, methods) = {
            let state = self.state.read();
            let constants: Vec<_> = state
                .constants
                .iter()
                .map(|(name, entry)| (name.clone(), entry.value().clone()))
                .collect();
            let methods: Vec<_> = state.methods.values().cloned().collect();
            (constants, methods)
        };

        {
            let mut state = other.state.write();
            for (name, value) in constants {
                state
                    .constants
                    .insert(name, Arc::new(ConstantEntry::new(value, false)));
            }
            for method in methods {
                state.methods.insert(method.name.clone(), method);
            }
        }
        debug!(
            "{}: appended features to {}",
            self.display_name(),
            other.display_name()
        );
        other.new_version();
        Ok(())
    }

    /// This namespace followed by everything it resolves through, in
    /// resolution order.
    pub fn ancestors(&self) -> Vec<Arc<Namespace>> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        seen.insert(self.id());
        if let Some(me) = self.me.upgrade() {
            out.push((me, false));
        }
        lookup::collect_ancestors(&self.lookup_head(), &mut out, &mut seen);
        out.into_iter().map(|(ns, _)| ns).collect()
    }

    /// Namespaces that entered the ancestry through `include`, including
    /// those included further up the hierarchy.
    pub fn included_modules(&self) -> Vec<Arc<Namespace>> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        seen.insert(self.id());
        lookup::collect_ancestors(&self.lookup_head(), &mut out, &mut seen);
        out.into_iter()
            .filter(|(_, included)| *included)
            .map(|(ns, _)| ns)
            .collect()
    }

    pub fn includes(&self, module: &Namespace) -> bool {
        self.included_modules()
            .iter()
            .any(|ns| ns.id() == module.id())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use crate::{
        CodeId, NamespaceError, Registry, RegistryCreateInfo, Symbol, Value, Visibility,
    };

    fn registry() -> Registry {
        Registry::new(RegistryCreateInfo::default())
    }

    #[test]
    fn include_registers_the_includer_as_dependent() {
        let registry = registry();
        let mixin = registry.define_module("M", None).unwrap();
        let class = registry.define_class("C", None, None).unwrap();
        class.include(&mixin).unwrap();
        assert_eq!(mixin.dependent_count(), 1);

        let before = class.version();
        mixin.define("f", Visibility::Public, CodeId(1)).unwrap();
        assert_ne!(class.version(), before);
    }

    #[test]
    fn most_recent_inclusion_wins() {
        let registry = registry();
        let a = registry.define_module("A", None).unwrap();
        let b = registry.define_module("B", None).unwrap();
        let c = registry.define_class("C", None, None).unwrap();
        a.define("m", Visibility::Public, CodeId(1)).unwrap();
        b.define("m", Visibility::Public, CodeId(2)).unwrap();

        c.include(&a).unwrap();
        c.include(&b).unwrap();
        assert_eq!(c.lookup_method("m").unwrap().owner.as_str(), "B");

        c.define("m", Visibility::Public, CodeId(3)).unwrap();
        assert_eq!(c.lookup_method("m").unwrap().code(), Some(CodeId(3)));
    }

    #[test]
    fn mixins_shadow_superclass() {
        let registry = registry();
        let base = registry.define_class("Base", None, None).unwrap();
        let derived = registry.define_class("Derived", None, Some(&base)).unwrap();
        let mixin = registry.define_module("M", None).unwrap();
        base.define("m", Visibility::Public, CodeId(1)).unwrap();
        mixin.define("m", Visibility::Public, CodeId(2)).unwrap();

        derived.include(&mixin).unwrap();
        assert_eq!(derived.lookup_method("m").unwrap().code(), Some(CodeId(2)));

        let names: Vec<_> = derived.ancestors().iter().map(|ns| ns.display_name()).collect();
        assert_eq!(names, ["Derived", "M", "Base"]);
        let included: Vec<_> = derived
            .included_modules()
            .iter()
            .map(|ns| ns.display_name())
            .collect();
        assert_eq!(included, ["M"]);
        assert!(derived.includes(&mixin));
        assert!(!derived.includes(&base));
        assert!(!base.includes(&mixin));
    }

    #[test]
    fn mutation_of_mixin_invalidates_transitive_users() {
        let registry = registry();
        let mixin = registry.define_module("M", None).unwrap();
        let middle = registry.define_module("Middle", None).unwrap();
        let base = registry.define_class("Base", None, None).unwrap();
        let derived = registry.define_class("Derived", None, Some(&base)).unwrap();
        middle.include(&mixin).unwrap();
        base.include(&middle).unwrap();

        let before: Vec<_> = [&middle, &base, &derived]
            .iter()
            .map(|ns| ns.version())
            .collect();
        mixin.define("m", Visibility::Public, CodeId(1)).unwrap();
        let after: Vec<_> = [&middle, &base, &derived]
            .iter()
            .map(|ns| ns.version())
            .collect();

        for (b, a) in before.iter().zip(&after) {
            assert_ne!(b, a);
        }
        assert_eq!(derived.lookup_method("m").unwrap().owner.as_str(), "M");
    }

    #[test]
    fn unrelated_namespaces_keep_their_version() {
        let registry = registry();
        let mixin = registry.define_module("M", None).unwrap();
        let user = registry.define_class("User", None, None).unwrap();
        let bystander = registry.define_class("Bystander", None, None).unwrap();
        user.include(&mixin).unwrap();

        let before = bystander.version();
        let user_before = user.version();
        user.define("own", Visibility::Public, CodeId(1)).unwrap();
        assert_eq!(bystander.version(), before);
        // dependents point from M to User, not backwards
        let mixin_before = mixin.version();
        user.define("other", Visibility::Public, CodeId(2)).unwrap();
        assert_eq!(mixin.version(), mixin_before);
        assert_ne!(user.version(), user_before);
    }

    #[test]
    fn cyclic_inclusion_is_rejected_without_effects() {
        let registry = registry();
        let a = registry.define_module("A", None).unwrap();
        let b = registry.define_module("B", None).unwrap();

        assert!(matches!(
            a.include(&a),
            Err(NamespaceError::CyclicAncestry { .. })
        ));

        b.include(&a).unwrap();
        let before = a.version();
        let err = a.include(&b).unwrap_err();
        assert_eq!(
            err,
            NamespaceError::CyclicAncestry {
                namespace: "A".to_string(),
                module: "B".to_string(),
            }
        );
        assert_eq!(a.version(), before);
        assert_eq!(a.ancestors().len(), 1);
        assert_eq!(b.dependent_count(), 0);
    }

    #[test]
    fn class_cannot_include_a_descendant() {
        let registry = registry();
        let base = registry.define_class("Base", None, None).unwrap();
        let derived = registry.define_class("Derived", None, Some(&base)).unwrap();
        assert!(base.include(&derived).is_err());
    }

    #[test]
    fn append_features_copies_independent_entries() {
        let registry = registry();
        let source = registry.define_module("Source", None).unwrap();
        let target = registry.define_class("Target", None, None).unwrap();
        source.define("f", Visibility::Public, CodeId(1)).unwrap();
        source.set_constant("C", Value::Fixnum(1)).unwrap();
        source.set_constant_private("C").unwrap();

        let before = target.version();
        source.append_features(&target).unwrap();
        assert_ne!(target.version(), before);
        assert_eq!(target.lookup_method("f").unwrap().code(), Some(CodeId(1)));
        let copied = target.own_constant("C").unwrap();
        assert_eq!(copied.value(), &Value::Fixnum(1));
        assert!(!copied.is_private());

        // the two tables diverge from here on
        source.remove_method("f").unwrap();
        source.set_constant("C", Value::Fixnum(2)).unwrap();
        assert!(target.lookup_method("f").is_some());
        assert_eq!(target.own_constant("C").unwrap().value(), &Value::Fixnum(1));
        // no inclusion happened
        assert!(target.lookup_head().is_terminal());

        let mut all = HashMap::new();
        target.get_methods(&mut all);
        assert!(all.contains_key(&Symbol::from("f")));
    }
}

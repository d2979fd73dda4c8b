use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::{
        Arc, OnceLock, Weak,
        atomic::{AtomicBool, Ordering},
    },
};

use log::debug;
use parking_lot::RwLock;

use crate::{
    ClassInfo, CodeId, ConstantEntry, DefinitionContext, Epoch, LookupNode, MethodEntry,
    NamespaceError, RegistryShared, Resolution, Symbol, Value, Version, Visibility, epoch, lookup,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespaceId(pub u64);

#[derive(Debug)]
pub enum NamespaceKind {
    Module,
    Class(ClassInfo),
}

pub(crate) struct NamespaceState {
    pub methods: HashMap<Symbol, MethodEntry>,
    pub constants: HashMap<Symbol, Arc<ConstantEntry>>,
    pub shared_variables: HashMap<Symbol, Value>,
    pub head: Arc<LookupNode>,
    pub dependents: HashMap<NamespaceId, Weak<Namespace>>,
}

/// A module or class: the container methods, constants and shared variables
/// are resolved against.
///
/// Queries take the per-namespace read lock for the local probe only and never
/// hold two namespace locks at once. Every mutation runs under the registry's
/// writer lock and ends with a version bump that cascades to dependents.
pub struct Namespace {
    id: NamespaceId,
    name: Option<Symbol>,
    kind: NamespaceKind,
    lexical_parent: Option<Weak<Namespace>>,
    pub(crate) shared: Arc<RegistryShared>,
    pub(crate) state: RwLock<NamespaceState>,
    epoch: Epoch,
    frozen: AtomicBool,
    pub(crate) singleton: OnceLock<Arc<Namespace>>,
    pub(crate) me: Weak<Namespace>,
}

impl Namespace {
    pub(crate) fn create(
        shared: Arc<RegistryShared>,
        name: Option<&str>,
        lexical_parent: Option<&Arc<Namespace>>,
        kind: NamespaceKind,
    ) -> Arc<Self> {
        let id = shared.next_id();
        let name = name.filter(|n| !n.is_empty()).map(|n| shared.symbols.intern(n));
        let head = match &kind {
            NamespaceKind::Class(info) => match info.superclass() {
                Some(superclass) => Arc::new(LookupNode::Namespace(superclass.clone())),
                None => LookupNode::terminal(),
            },
            NamespaceKind::Module => LookupNode::terminal(),
        };
        let superclass = match &kind {
            NamespaceKind::Class(info) => info.superclass().cloned(),
            NamespaceKind::Module => None,
        };

        let ns = Arc::new_cyclic(|me| Self {
            id,
            name,
            kind,
            lexical_parent: lexical_parent.map(Arc::downgrade),
            shared,
            state: RwLock::new(NamespaceState {
                methods: HashMap::new(),
                constants: HashMap::new(),
                shared_variables: HashMap::new(),
                head,
                dependents: HashMap::new(),
            }),
            epoch: Epoch::new(),
            frozen: AtomicBool::new(false),
            singleton: OnceLock::new(),
            me: me.clone(),
        });

        if let Some(superclass) = superclass {
            superclass.add_dependent(&ns);
        }
        debug!("created {} ({:?})", ns.display_name(), ns.id);
        ns
    }

    #[inline]
    pub fn id(&self) -> NamespaceId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> Option<&Symbol> {
        self.name.as_ref()
    }

    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.to_string(),
            None if self.is_class() => format!("#<Class:{:#x}>", self.id.0),
            None => format!("#<Module:{:#x}>", self.id.0),
        }
    }

    #[inline]
    pub fn kind(&self) -> &NamespaceKind {
        &self.kind
    }

    #[inline]
    pub fn is_class(&self) -> bool {
        matches!(self.kind, NamespaceKind::Class(_))
    }

    #[inline]
    pub fn is_module(&self) -> bool {
        matches!(self.kind, NamespaceKind::Module)
    }

    pub fn lexical_parent(&self) -> Option<Arc<Namespace>> {
        self.lexical_parent.as_ref().and_then(Weak::upgrade)
    }

    pub fn intern(&self, name: &str) -> Symbol {
        self.shared.symbols.intern(name)
    }

    pub(crate) fn owner_symbol(&self) -> Symbol {
        match &self.name {
            Some(name) => name.clone(),
            None => self.intern(&self.display_name()),
        }
    }

    // versions

    #[inline]
    pub(crate) fn epoch(&self) -> &Epoch {
        &self.epoch
    }

    #[inline]
    pub fn version(&self) -> Version {
        self.epoch.current()
    }

    #[inline]
    pub fn is_current(&self, version: Version) -> bool {
        self.epoch.is_current(version)
    }

    pub(crate) fn new_version(&self) {
        epoch::invalidate(self);
    }

    pub(crate) fn add_dependent(&self, dependent: &Arc<Namespace>) {
        self.state
            .write()
            .dependents
            .insert(dependent.id, Arc::downgrade(dependent));
    }

    /// Upgrade the dependent edges, dropping the ones whose target is gone.
    pub(crate) fn live_dependents(&self) -> Vec<Arc<Namespace>> {
        let mut state = self.state.write();
        let mut live = Vec::with_capacity(state.dependents.len());
        state.dependents.retain(|_, weak| match weak.upgrade() {
            Some(ns) => {
                live.push(ns);
                true
            }
            None => false,
        });
        live
    }

    /// Recorded dependent edges, including ones not yet pruned.
    pub fn dependent_count(&self) -> usize {
        self.state.read().dependents.len()
    }

    pub(crate) fn lookup_head(&self) -> Arc<LookupNode> {
        self.state.read().head.clone()
    }

    pub(crate) fn chain_reaches(
        &self,
        target: NamespaceId,
        visited: &mut HashSet<NamespaceId>,
    ) -> bool {
        if self.id == target {
            return true;
        }
        if !visited.insert(self.id) {
            return false;
        }
        lookup::reaches(&self.lookup_head(), target, visited)
    }

    // freezing

    /// Irreversible.
    pub fn freeze(&self) {
        let _writer = self.shared.writer.lock();
        if !self.frozen.swap(true, Ordering::AcqRel) {
            debug!("froze {}", self.display_name());
        }
    }

    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    pub fn check_frozen(&self) -> Result<(), NamespaceError> {
        if self.is_frozen() {
            return Err(NamespaceError::FrozenViolation {
                namespace: self.display_name(),
            });
        }
        Ok(())
    }

    /// Not interned: names that failed to resolve stay out of the symbol table.
    pub(crate) fn name_not_found(&self, name: &str) -> NamespaceError {
        NamespaceError::NameNotFound {
            namespace: self.display_name(),
            name: Symbol::from(name),
        }
    }

    // methods

    pub fn define_method(&self, entry: MethodEntry) -> Result<(), NamespaceError> {
        let _writer = self.shared.writer.lock();
        self.check_frozen()?;
        debug!("{}: define `{}` ({})", self.display_name(), entry.name, entry.visibility);
        self.state.write().methods.insert(entry.name.clone(), entry);
        self.new_version();
        Ok(())
    }

    /// Define `name` with this namespace as owner.
    pub fn define(
        &self,
        name: &str,
        visibility: Visibility,
        code: CodeId,
    ) -> Result<(), NamespaceError> {
        let entry = MethodEntry::new(self.intern(name), self.owner_symbol(), visibility, code);
        self.define_method(entry)
    }

    /// The path a method-definition construct goes through: the pending
    /// visibility comes from `ctx`. In module-function mode the method is
    /// installed privately here and publicly on the singleton namespace.
    pub fn define_in_context(
        &self,
        ctx: &DefinitionContext,
        name: &str,
        code: CodeId,
    ) -> Result<(), NamespaceError> {
        let _writer = self.shared.writer.lock();
        self.check_frozen()?;
        if ctx.module_function {
            let entry =
                MethodEntry::new(self.intern(name), self.owner_symbol(), Visibility::Private, code);
            self.install_module_function(&entry)
        } else {
            self.define(name, ctx.visibility, code)
        }
    }

    pub fn remove_method(&self, name: &str) -> Result<(), NamespaceError> {
        let _writer = self.shared.writer.lock();
        self.check_frozen()?;
        if self.state.write().methods.remove(name).is_some() {
            debug!("{}: removed `{name}`", self.display_name());
        }
        self.new_version();
        Ok(())
    }

    /// Shadow `name` with an undefined marker so the ancestors' definitions
    /// become unreachable from here.
    pub fn undefine(&self, name: &str) -> Result<(), NamespaceError> {
        let _writer = self.shared.writer.lock();
        self.check_frozen()?;
        let Some(found) = self.lookup_callable(name) else {
            return Err(self.name_not_found(name));
        };
        self.define_method(found.undefined(self.owner_symbol()))
    }

    pub fn alias(&self, new_name: &str, old_name: &str) -> Result<(), NamespaceError> {
        let _writer = self.shared.writer.lock();
        self.check_frozen()?;
        let Some(found) = self.lookup_callable(old_name) else {
            return Err(self.name_not_found(old_name));
        };
        self.define_method(found.with_name(self.intern(new_name)))
    }

    /// With no names, sets the default for later definitions in `ctx`.
    /// Otherwise every name must resolve; nothing changes if one does not.
    pub fn set_visibility(
        &self,
        ctx: &mut DefinitionContext,
        names: &[&str],
        visibility: Visibility,
    ) -> Result<(), NamespaceError> {
        if names.is_empty() {
            ctx.set_default(visibility);
            return Ok(());
        }

        let _writer = self.shared.writer.lock();
        self.check_frozen()?;
        let mut resolved = Vec::with_capacity(names.len());
        for name in names {
            match self.lookup_callable(name) {
                Some(found) => resolved.push(found),
                None => return Err(self.name_not_found(name)),
            }
        }

        for found in resolved {
            if visibility == Visibility::ModuleFunction {
                self.install_module_function(&found.with_visibility(Visibility::Private))?;
            } else {
                self.define_method(found.with_visibility(visibility))?;
            }
        }
        Ok(())
    }

    fn install_module_function(&self, entry: &MethodEntry) -> Result<(), NamespaceError> {
        let singleton = self.singleton_namespace();
        singleton.check_frozen()?;
        self.define_method(entry.clone())?;
        singleton.define_method(entry.with_visibility(Visibility::Public))
    }

    pub fn lookup_method(&self, name: &str) -> Option<MethodEntry> {
        let head = {
            let state = self.state.read();
            if let Some(found) = state.methods.get(name) {
                return Some(found.clone());
            }
            state.head.clone()
        };
        lookup::find_method(&head, name)
    }

    /// Like `lookup_method`, but an undefined marker counts as absent.
    pub fn lookup_callable(&self, name: &str) -> Option<MethodEntry> {
        self.lookup_method(name).filter(|m| !m.is_undefined())
    }

    /// Lookup tagged with the version read before the walk started.
    pub fn resolve_method(&self, name: &str) -> Resolution<MethodEntry> {
        let version = self.version();
        Resolution {
            result: self.lookup_method(name),
            version,
        }
    }

    /// Ancestors first, then this namespace's own entries on top.
    pub fn get_methods(&self, out: &mut HashMap<Symbol, MethodEntry>) {
        let head = self.lookup_head();
        lookup::collect_methods(&head, out);
        let state = self.state.read();
        for (name, entry) in &state.methods {
            out.insert(name.clone(), entry.clone());
        }
    }

    pub fn declared_methods(&self) -> Vec<MethodEntry> {
        let mut methods: Vec<_> = self.state.read().methods.values().cloned().collect();
        methods.sort_by(|a, b| a.name.cmp(&b.name));
        methods
    }

    /// Sorted names that resolve to something callable.
    pub fn method_names(&self) -> Vec<Symbol> {
        let mut all = HashMap::new();
        self.get_methods(&mut all);
        let mut names: Vec<_> = all
            .into_iter()
            .filter(|(_, entry)| !entry.is_undefined())
            .map(|(name, _)| name)
            .collect();
        names.sort();
        names
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("id", &self.id)
            .field("name", &self.display_name())
            .field("version", &self.version())
            .field("frozen", &self.is_frozen())
            .finish()
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Registry, RegistryCreateInfo};

    fn registry() -> Registry {
        Registry::new(RegistryCreateInfo::default())
    }

    #[test]
    fn last_write_wins() {
        let registry = registry();
        let ns = registry.define_module("N", None).unwrap();
        ns.define("f", Visibility::Public, CodeId(1)).unwrap();
        ns.define("f", Visibility::Public, CodeId(2)).unwrap();
        assert_eq!(ns.lookup_method("f").unwrap().code(), Some(CodeId(2)));

        ns.remove_method("f").unwrap();
        assert!(ns.lookup_method("f").is_none());
    }

    #[test]
    fn undefine_does_not_fall_through() {
        let registry = registry();
        let base = registry.define_class("Base", None, None).unwrap();
        let derived = registry.define_class("Derived", None, Some(&base)).unwrap();
        base.define("f", Visibility::Public, CodeId(1)).unwrap();

        derived.undefine("f").unwrap();
        let found = derived.lookup_method("f").unwrap();
        assert!(found.is_undefined());
        assert_eq!(found.owner.as_str(), "Derived");
        assert!(derived.lookup_callable("f").is_none());
        // the ancestor is untouched
        assert!(!base.lookup_method("f").unwrap().is_undefined());

        // undefining again has nothing to resolve
        assert!(matches!(
            derived.undefine("f"),
            Err(NamespaceError::NameNotFound { .. })
        ));
    }

    #[test]
    fn undefine_unknown_name_fails() {
        let registry = registry();
        let ns = registry.define_module("N", None).unwrap();
        let before = ns.version();
        let err = ns.undefine("nope").unwrap_err();
        assert_eq!(
            err,
            NamespaceError::NameNotFound {
                namespace: "N".to_string(),
                name: Symbol::from("nope"),
            }
        );
        assert_eq!(ns.version(), before);
    }

    #[test]
    fn undefine_then_define_restores() {
        let registry = registry();
        let ns = registry.define_module("N", None).unwrap();
        ns.define("f", Visibility::Public, CodeId(1)).unwrap();
        ns.undefine("f").unwrap();
        ns.define("f", Visibility::Public, CodeId(3)).unwrap();
        assert_eq!(ns.lookup_callable("f").unwrap().code(), Some(CodeId(3)));
    }

    #[test]
    fn alias_survives_removal() {
        let registry = registry();
        let ns = registry.define_module("N", None).unwrap();
        ns.define("f", Visibility::Public, CodeId(1)).unwrap();
        ns.alias("g", "f").unwrap();
        ns.remove_method("f").unwrap();

        let g = ns.lookup_method("g").unwrap();
        assert_eq!(g.code(), Some(CodeId(1)));
        assert_eq!(g.name.as_str(), "g");
        assert!(ns.lookup_method("f").is_none());
    }

    #[test]
    fn alias_copies_ancestor_entry_locally() {
        let registry = registry();
        let base = registry.define_class("Base", None, None).unwrap();
        let derived = registry.define_class("Derived", None, Some(&base)).unwrap();
        base.define("f", Visibility::Public, CodeId(5)).unwrap();

        derived.alias("g", "f").unwrap();
        assert_eq!(derived.declared_methods().len(), 1);
        base.remove_method("f").unwrap();
        assert_eq!(derived.lookup_method("g").unwrap().code(), Some(CodeId(5)));
        assert!(derived.lookup_method("f").is_none());

        assert!(matches!(
            derived.alias("h", "missing"),
            Err(NamespaceError::NameNotFound { .. })
        ));
    }

    #[test]
    fn visibility_with_names_reinstalls_copies() {
        let registry = registry();
        let base = registry.define_class("Base", None, None).unwrap();
        let derived = registry.define_class("Derived", None, Some(&base)).unwrap();
        base.define("f", Visibility::Public, CodeId(1)).unwrap();

        let mut ctx = DefinitionContext::default();
        derived
            .set_visibility(&mut ctx, &["f"], Visibility::Private)
            .unwrap();
        assert_eq!(derived.lookup_method("f").unwrap().visibility, Visibility::Private);
        assert_eq!(base.lookup_method("f").unwrap().visibility, Visibility::Public);
        // the pending default is untouched
        assert_eq!(ctx.visibility, Visibility::Public);
    }

    #[test]
    fn visibility_is_all_or_nothing() {
        let registry = registry();
        let ns = registry.define_module("N", None).unwrap();
        ns.define("f", Visibility::Public, CodeId(1)).unwrap();
        let before = ns.version();

        let mut ctx = DefinitionContext::default();
        let err = ns
            .set_visibility(&mut ctx, &["f", "missing"], Visibility::Protected)
            .unwrap_err();
        assert!(matches!(err, NamespaceError::NameNotFound { ref name, .. } if name.as_str() == "missing"));
        assert_eq!(ns.lookup_method("f").unwrap().visibility, Visibility::Public);
        assert_eq!(ns.version(), before);
    }

    #[test]
    fn empty_visibility_sets_context_default() {
        let registry = registry();
        let ns = registry.define_module("N", None).unwrap();
        let mut ctx = DefinitionContext::default();
        let before = ns.version();

        ns.set_visibility(&mut ctx, &[], Visibility::Private).unwrap();
        assert_eq!(ns.version(), before);
        ns.define_in_context(&ctx, "hidden", CodeId(9)).unwrap();
        assert_eq!(
            ns.lookup_method("hidden").unwrap().visibility,
            Visibility::Private
        );
    }

    #[test]
    fn module_function_installs_singleton_copy() {
        let registry = registry();
        let ns = registry.define_module("Util", None).unwrap();
        let mut ctx = DefinitionContext::default();
        ns.set_visibility(&mut ctx, &[], Visibility::ModuleFunction)
            .unwrap();
        ns.define_in_context(&ctx, "helper", CodeId(4)).unwrap();

        let local = ns.lookup_method("helper").unwrap();
        assert_eq!(local.visibility, Visibility::Private);
        let on_singleton = ns.singleton_namespace().lookup_method("helper").unwrap();
        assert_eq!(on_singleton.visibility, Visibility::Public);
        assert_eq!(on_singleton.code(), Some(CodeId(4)));

        ns.define("other", Visibility::Public, CodeId(5)).unwrap();
        ns.set_visibility(&mut ctx, &["other"], Visibility::ModuleFunction)
            .unwrap();
        assert_eq!(ns.lookup_method("other").unwrap().visibility, Visibility::Private);
        assert!(ns.singleton_namespace().lookup_method("other").is_some());
    }

    #[test]
    fn aggregate_prefers_own_entries() {
        let registry = registry();
        let base = registry.define_class("Base", None, None).unwrap();
        let derived = registry.define_class("Derived", None, Some(&base)).unwrap();
        base.define("f", Visibility::Public, CodeId(1)).unwrap();
        base.define("g", Visibility::Public, CodeId(2)).unwrap();
        derived.define("f", Visibility::Public, CodeId(3)).unwrap();
        derived.undefine("g").unwrap();

        let mut all = HashMap::new();
        derived.get_methods(&mut all);
        assert_eq!(all["f"].code(), Some(CodeId(3)));
        assert!(all["g"].is_undefined());

        assert_eq!(derived.method_names(), [Symbol::from("f")]);
    }

    #[test]
    fn frozen_namespace_rejects_every_mutation() {
        let registry = registry();
        let ns = registry.define_module("N", None).unwrap();
        let other = registry.define_module("O", None).unwrap();
        ns.define("f", Visibility::Public, CodeId(1)).unwrap();
        ns.freeze();
        assert!(ns.is_frozen());
        let before = ns.version();
        let mut ctx = DefinitionContext::default();

        let frozen = |r: Result<(), NamespaceError>| {
            assert!(matches!(r, Err(NamespaceError::FrozenViolation { .. })))
        };
        frozen(ns.define("g", Visibility::Public, CodeId(2)));
        frozen(ns.remove_method("f"));
        frozen(ns.undefine("f"));
        frozen(ns.alias("h", "f"));
        frozen(ns.set_visibility(&mut ctx, &["f"], Visibility::Private));
        frozen(ns.include(&other));
        frozen(ns.set_constant("C", Value::Nil));
        frozen(ns.remove_constant("C"));
        frozen(ns.set_shared_variable("@@x", Value::Nil));
        frozen(ns.remove_shared_variable("@@x"));
        frozen(ns.set_shared_variable_local("@@x", Value::Nil));
        frozen(ns.set_constant_private("C"));
        frozen(ns.set_module_constant("C", Value::Nil));
        frozen(ns.define_in_context(&ctx, "g", CodeId(2)));
        frozen(other.append_features(&ns));

        assert_eq!(ns.version(), before);
        assert!(ns.singleton.get().is_none());
        assert_eq!(ns.declared_methods().len(), 1);
        assert!(ns.lookup_constant("C").is_none());
        assert!(ns.lookup_shared_variable("@@x").is_none());
        assert!(ns.lookup_head().is_terminal());
    }

    #[test]
    fn frozen_holders_are_untouched_through_descendants() {
        let registry = registry();
        let outer = registry.define_module("Outer", None).unwrap();
        let base = registry.define_class("Base", None, None).unwrap();
        let derived = registry
            .define_class("Derived", Some(&outer), Some(&base))
            .unwrap();
        base.set_constant("LIMIT", Value::Fixnum(1)).unwrap();
        base.set_shared_variable("@@count", Value::Fixnum(0)).unwrap();
        base.define("f", Visibility::Public, CodeId(1)).unwrap();
        outer.set_constant("NAME", Value::from("outer")).unwrap();
        base.freeze();
        outer.freeze();
        let (base_before, outer_before) = (base.version(), outer.version());

        let frozen = |r: Result<(), NamespaceError>| {
            assert!(matches!(r, Err(NamespaceError::FrozenViolation { .. })))
        };
        frozen(derived.set_constant_private("LIMIT"));
        frozen(derived.set_constant_private("NAME"));
        frozen(derived.set_shared_variable("@@count", Value::Fixnum(1)));

        // edits confined to the child's own tables still go through
        derived.define("f", Visibility::Private, CodeId(2)).unwrap();
        derived.set_constant("LIMIT", Value::Fixnum(2)).unwrap();
        derived.set_shared_variable_local("@@own", Value::Nil).unwrap();

        assert_eq!(base.version(), base_before);
        assert_eq!(outer.version(), outer_before);
        let limit = base.own_constant("LIMIT").unwrap();
        assert_eq!(limit.value(), &Value::Fixnum(1));
        assert!(!limit.is_private());
        assert!(!outer.own_constant("NAME").unwrap().is_private());
        assert_eq!(base.lookup_shared_variable("@@count"), Some(Value::Fixnum(0)));
        let f = base.lookup_method("f").unwrap();
        assert_eq!((f.code(), f.visibility), (Some(CodeId(1)), Visibility::Public));
    }

    #[test]
    fn anonymous_namespaces_display_by_id() {
        let registry = registry();
        let anon = registry.anonymous_module();
        assert!(anon.name().is_none());
        assert!(anon.display_name().starts_with("#<Module:"));
        let empty = registry.define_module("", None).unwrap();
        assert!(empty.name().is_none());
    }
}

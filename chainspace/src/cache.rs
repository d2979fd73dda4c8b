use std::sync::{Arc, Weak};

use crate::{MethodEntry, Namespace, Symbol, Version};

/// A resolution result together with the version it is valid for.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution<T> {
    pub result: Option<T>,
    pub version: Version,
}

struct CacheEntry {
    receiver: Weak<Namespace>,
    version: Version,
    result: Option<MethodEntry>,
}

/// Monomorphic method cache for one call site.
///
/// A hit is a pointer comparison plus a version comparison; any structural
/// change reachable from the receiver moves its version and turns the next
/// lookup into a miss.
pub struct InlineCache {
    name: Symbol,
    entry: Option<CacheEntry>,
    hits: u64,
    misses: u64,
}

impl InlineCache {
    pub fn new(name: Symbol) -> Self {
        Self {
            name,
            entry: None,
            hits: 0,
            misses: 0,
        }
    }

    pub fn name(&self) -> &Symbol {
        &self.name
    }

    pub fn lookup(&mut self, receiver: &Arc<Namespace>) -> Option<MethodEntry> {
        if let Some(entry) = &self.entry {
            let same_receiver = entry
                .receiver
                .upgrade()
                .is_some_and(|cached| Arc::ptr_eq(&cached, receiver));
            if same_receiver && receiver.is_current(entry.version) {
                self.hits += 1;
                return entry.result.clone();
            }
        }

        self.misses += 1;
        let resolution = receiver.resolve_method(self.name.as_str());
        self.entry = Some(CacheEntry {
            receiver: Arc::downgrade(receiver),
            version: resolution.version,
            result: resolution.result.clone(),
        });
        resolution.result
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CodeId, Registry, RegistryCreateInfo, Visibility};

    #[test]
    fn hit_until_ancestor_changes() {
        let registry = Registry::new(RegistryCreateInfo::default());
        let mixin = registry.define_module("M", None).unwrap();
        let class = registry.define_class("C", None, None).unwrap();
        class.include(&mixin).unwrap();
        mixin.define("run", Visibility::Public, CodeId(1)).unwrap();

        let mut cache = InlineCache::new(registry.intern("run"));
        assert_eq!(cache.lookup(&class).unwrap().code(), Some(CodeId(1)));
        assert_eq!(cache.lookup(&class).unwrap().code(), Some(CodeId(1)));
        assert_eq!((cache.hits(), cache.misses()), (1, 1));

        mixin.define("run", Visibility::Public, CodeId(2)).unwrap();
        assert_eq!(cache.lookup(&class).unwrap().code(), Some(CodeId(2)));
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn negative_results_are_cached_too() {
        let registry = Registry::new(RegistryCreateInfo::default());
        let class = registry.define_class("C", None, None).unwrap();
        let mut cache = InlineCache::new(registry.intern("missing"));
        assert!(cache.lookup(&class).is_none());
        assert!(cache.lookup(&class).is_none());
        assert_eq!(cache.hits(), 1);

        class.define("missing", Visibility::Public, CodeId(3)).unwrap();
        assert!(cache.lookup(&class).is_some());
    }

    #[test]
    fn different_receiver_misses() {
        let registry = Registry::new(RegistryCreateInfo::default());
        let a = registry.define_class("A", None, None).unwrap();
        let b = registry.define_class("B", None, None).unwrap();
        a.define("f", Visibility::Public, CodeId(1)).unwrap();
        b.define("f", Visibility::Public, CodeId(2)).unwrap();

        let mut cache = InlineCache::new(registry.intern("f"));
        assert_eq!(cache.lookup(&a).unwrap().code(), Some(CodeId(1)));
        assert_eq!(cache.lookup(&b).unwrap().code(), Some(CodeId(2)));
        assert_eq!(cache.misses(), 2);

        cache.invalidate();
        cache.lookup(&b);
        assert_eq!(cache.misses(), 3);
    }

    #[test]
    fn resolution_version_predates_mutation() {
        let registry = Registry::new(RegistryCreateInfo::default());
        let class = registry.define_class("C", None, None).unwrap();
        let resolution = class.resolve_method("f");
        assert!(resolution.result.is_none());
        assert!(class.is_current(resolution.version));
        class.define("f", Visibility::Public, CodeId(1)).unwrap();
        assert!(!class.is_current(resolution.version));
    }
}

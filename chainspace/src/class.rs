use std::sync::{Arc, Weak};

use crate::{Namespace, NamespaceKind};

/// What kind of object `new` on a class has to produce. Allocation itself
/// is done by the object model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Allocator {
    Object,
    Module,
    Class,
    /// singleton namespaces never have instances
    Forbidden,
}

#[derive(Debug)]
pub struct ClassInfo {
    superclass: Option<Arc<Namespace>>,
    allocator: Allocator,
    /// set for singleton namespaces: the namespace they belong to
    attached: Option<Weak<Namespace>>,
}

impl ClassInfo {
    /// Without an explicit allocator the superclass's is inherited; a root
    /// class allocates plain objects.
    pub fn new(superclass: Option<Arc<Namespace>>, allocator: Option<Allocator>) -> Self {
        let allocator = allocator
            .or_else(|| superclass.as_ref().and_then(|s| s.allocator()))
            .unwrap_or(Allocator::Object);
        Self {
            superclass,
            allocator,
            attached: None,
        }
    }

    fn singleton(superclass: Option<Arc<Namespace>>, attached: Weak<Namespace>) -> Self {
        Self {
            superclass,
            allocator: Allocator::Forbidden,
            attached: Some(attached),
        }
    }

    #[inline]
    pub fn superclass(&self) -> Option<&Arc<Namespace>> {
        self.superclass.as_ref()
    }

    #[inline]
    pub fn allocator(&self) -> Allocator {
        self.allocator
    }
}

impl Namespace {
    pub fn superclass(&self) -> Option<&Arc<Namespace>> {
        match self.kind() {
            NamespaceKind::Class(info) => info.superclass(),
            NamespaceKind::Module => None,
        }
    }

    /// `None` for modules.
    pub fn allocator(&self) -> Option<Allocator> {
        match self.kind() {
            NamespaceKind::Class(info) => Some(info.allocator()),
            NamespaceKind::Module => None,
        }
    }

    pub fn is_singleton(&self) -> bool {
        matches!(self.kind(), NamespaceKind::Class(info) if info.attached.is_some())
    }

    /// The namespace a singleton namespace belongs to, if it is still alive.
    pub fn attached(&self) -> Option<Arc<Namespace>> {
        match self.kind() {
            NamespaceKind::Class(info) => info.attached.as_ref().and_then(Weak::upgrade),
            NamespaceKind::Module => None,
        }
    }

    /// The namespace holding class-level definitions, created on first use.
    /// A class's singleton resolves through its superclass's singleton.
    pub fn singleton_namespace(&self) -> Arc<Namespace> {
        if let Some(singleton) = self.singleton.get() {
            return singleton.clone();
        }

        // creation happens under the writer lock so only one thread
        // ever runs the initializer
        let _writer = self.shared.writer.lock();
        self.singleton
            .get_or_init(|| {
                let superclass = self.superclass().map(|s| s.singleton_namespace());
                let name = format!("#<Class:{}>", self.display_name());
                Namespace::create(
                    self.shared.clone(),
                    Some(&name),
                    None,
                    NamespaceKind::Class(ClassInfo::singleton(superclass, self.me.clone())),
                )
            })
            .clone()
    }
}

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use parking_lot::{ReentrantMutex, RwLock};

use crate::{
    Allocator, ClassInfo, Namespace, NamespaceError, NamespaceId, NamespaceKind, Symbol, Symbols,
    Value,
};

/// Non-fatal events for the diagnostics layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    ConstantRedefined { namespace: String, name: Symbol },
}

pub trait NoticeSink: Send + Sync {
    fn notice(&self, notice: &Notice);
}

#[derive(Debug, Clone, Copy)]
pub struct RegistryCreateInfo {
    /// `remove_constant` on an absent name fails instead of doing nothing
    pub strict_constant_removal: bool,
    pub warn_on_constant_redefinition: bool,
}

impl Default for RegistryCreateInfo {
    fn default() -> Self {
        Self {
            strict_constant_removal: false,
            warn_on_constant_redefinition: true,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NamespaceCreateInfo<'a> {
    pub name: Option<&'a str>,
    pub lexical_parent: Option<&'a Arc<Namespace>>,
    /// classes only
    pub superclass: Option<&'a Arc<Namespace>>,
    /// classes only; inherited from the superclass when `None`
    pub allocator: Option<Allocator>,
}

/// State every namespace of one runtime shares.
pub(crate) struct RegistryShared {
    /// the single writer lock; reentrant so compound mutations can nest
    pub writer: ReentrantMutex<()>,
    pub symbols: Symbols,
    pub config: RegistryCreateInfo,
    ids: AtomicU64,
    notices: RwLock<Option<Arc<dyn NoticeSink>>>,
}

/// Entry point for creating namespaces. Cheap to clone; every namespace it
/// creates keeps the shared state alive.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryShared>,
}

impl RegistryShared {
    pub fn next_id(&self) -> NamespaceId {
        NamespaceId(self.ids.fetch_add(1, Ordering::Relaxed) + 1)
    }

    pub fn notify(&self, notice: &Notice) {
        let sink = self.notices.read().clone();
        if let Some(sink) = sink {
            sink.notice(notice);
        }
    }
}

impl Registry {
    pub fn new(info: RegistryCreateInfo) -> Self {
        let inner = RegistryShared {
            writer: ReentrantMutex::new(()),
            symbols: Symbols::new(),
            config: info,
            ids: AtomicU64::new(0),
            notices: RwLock::new(None),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn intern(&self, name: &str) -> Symbol {
        self.inner.symbols.intern(name)
    }

    pub fn set_notice_sink(&self, sink: Option<Arc<dyn NoticeSink>>) {
        *self.inner.notices.write() = sink;
    }

    pub fn create_module(&self, info: NamespaceCreateInfo<'_>) -> Result<Arc<Namespace>, NamespaceError> {
        self.create(info, NamespaceKind::Module)
    }

    pub fn create_class(&self, info: NamespaceCreateInfo<'_>) -> Result<Arc<Namespace>, NamespaceError> {
        let class = ClassInfo::new(info.superclass.cloned(), info.allocator);
        self.create(info, NamespaceKind::Class(class))
    }

    pub fn define_module(
        &self,
        name: &str,
        lexical_parent: Option<&Arc<Namespace>>,
    ) -> Result<Arc<Namespace>, NamespaceError> {
        self.create_module(NamespaceCreateInfo {
            name: Some(name),
            lexical_parent,
            ..Default::default()
        })
    }

    pub fn define_class(
        &self,
        name: &str,
        lexical_parent: Option<&Arc<Namespace>>,
        superclass: Option<&Arc<Namespace>>,
    ) -> Result<Arc<Namespace>, NamespaceError> {
        self.create_class(NamespaceCreateInfo {
            name: Some(name),
            lexical_parent,
            superclass,
            allocator: None,
        })
    }

    pub fn anonymous_module(&self) -> Arc<Namespace> {
        Namespace::create(self.inner.clone(), None, None, NamespaceKind::Module)
    }

    /// A named namespace with a lexical parent is bound as a constant there,
    /// which is what keeps it alive.
    fn create(
        &self,
        info: NamespaceCreateInfo<'_>,
        kind: NamespaceKind,
    ) -> Result<Arc<Namespace>, NamespaceError> {
        let _writer = self.inner.writer.lock();
        if let Some(parent) = info.lexical_parent {
            parent.check_frozen()?;
        }

        let ns = Namespace::create(self.inner.clone(), info.name, info.lexical_parent, kind);
        if let (Some(parent), Some(name)) = (info.lexical_parent, ns.name()) {
            parent.set_constant(name.as_str(), Value::Namespace(ns.clone()))?;
        }
        Ok(ns)
    }
}

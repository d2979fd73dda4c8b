use std::{
    collections::HashSet,
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use log::debug;

use crate::Namespace;

/// Snapshot of a namespace's epoch. Cached resolutions carry one and are
/// valid while it still equals the namespace's current version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version(pub u64);

#[derive(Debug, Default)]
pub struct Epoch(AtomicU64);

impl Epoch {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    #[inline]
    pub fn current(&self) -> Version {
        Version(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_current(&self, version: Version) -> bool {
        self.current() == version
    }

    #[inline]
    pub fn bump(&self) -> Version {
        Version(self.0.fetch_add(1, Ordering::AcqRel) + 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Bump `root` and every namespace reachable through dependent edges.
///
/// The dependent graph is a DAG in general (a mixin shared by a class and its
/// subclass reaches the subclass twice), so each namespace is bumped at most
/// once per pass. Returns the number of namespaces bumped.
///
/// Must be called with the registry's writer lock held.
pub(crate) fn invalidate(root: &Namespace) -> usize {
    let mut visited = HashSet::new();
    visited.insert(root.id());
    root.epoch().bump();

    let mut pending = root.live_dependents();
    let mut count = 1;
    while let Some(ns) = pending.pop() {
        if !visited.insert(ns.id()) {
            continue;
        }
        ns.epoch().bump();
        count += 1;
        pending.extend(ns.live_dependents());
    }

    debug!(
        "new version of {}: invalidated {count} namespace(s)",
        root.display_name()
    );
    count
}

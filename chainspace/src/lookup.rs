use std::{
    collections::{BTreeSet, HashMap, HashSet},
    sync::Arc,
};

use log::trace;

use crate::{ConstantEntry, MethodEntry, Namespace, NamespaceError, NamespaceId, Symbol, Value};

/// One link of a namespace's ancestry.
///
/// A chain is a singly linked list ending in `Terminal`. Including a module
/// pushes a `Fork` in front of the current head; a class's superclass is
/// the `Namespace` node the chain starts out with.
#[derive(Debug)]
pub enum LookupNode {
    /// Search the namespace (own tables, then its own chain) and stop.
    Namespace(Arc<Namespace>),
    /// Search the included module, then continue with `next`.
    Fork {
        module: Arc<Namespace>,
        next: Arc<LookupNode>,
    },
    Terminal,
}

impl LookupNode {
    pub fn terminal() -> Arc<Self> {
        Arc::new(Self::Terminal)
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal)
    }
}

pub fn find_method(mut node: &LookupNode, name: &str) -> Option<MethodEntry> {
    loop {
        match node {
            LookupNode::Terminal => {
                trace!("method `{name}` reached terminal");
                return None;
            }
            LookupNode::Namespace(ns) => return ns.lookup_method(name),
            LookupNode::Fork { module, next } => {
                if let Some(found) = module.lookup_method(name) {
                    return Some(found);
                }
                node = next.as_ref();
            }
        }
    }
}

/// Ancestry half of constant lookup. Ancestors contribute their own tables
/// and chains but not their lexical scope.
pub fn find_constant(mut node: &LookupNode, name: &str) -> Option<Arc<ConstantEntry>> {
    loop {
        match node {
            LookupNode::Terminal => {
                trace!("constant `{name}` reached terminal");
                return None;
            }
            LookupNode::Namespace(ns) => return ns.lookup_ancestral_constant(name),
            LookupNode::Fork { module, next } => {
                if let Some(found) = module.lookup_ancestral_constant(name) {
                    return Some(found);
                }
                node = next.as_ref();
            }
        }
    }
}

/// Flag the first ancestral constant `name` as private. The holder checks
/// its own frozen flag and bumps its own version.
pub fn mark_constant_private(mut node: &LookupNode, name: &str) -> Result<bool, NamespaceError> {
    loop {
        match node {
            LookupNode::Terminal => return Ok(false),
            LookupNode::Namespace(ns) => return ns.mark_constant_private(name, false),
            LookupNode::Fork { module, next } => {
                if module.mark_constant_private(name, false)? {
                    return Ok(true);
                }
                node = next.as_ref();
            }
        }
    }
}

pub fn find_shared_variable(mut node: &LookupNode, name: &str) -> Option<Value> {
    loop {
        match node {
            LookupNode::Terminal => return None,
            LookupNode::Namespace(ns) => return ns.lookup_shared_variable(name),
            LookupNode::Fork { module, next } => {
                if let Some(found) = module.lookup_shared_variable(name) {
                    return Some(found);
                }
                node = next.as_ref();
            }
        }
    }
}

/// Overwrite the first existing binding of `name`, wherever it lives.
/// `Ok(false)` means no namespace on the chain binds it.
pub fn assign_existing_shared_variable(
    mut node: &LookupNode,
    name: &Symbol,
    value: &Value,
) -> Result<bool, NamespaceError> {
    loop {
        match node {
            LookupNode::Terminal => return Ok(false),
            LookupNode::Namespace(ns) => return ns.assign_existing_shared_variable(name, value),
            LookupNode::Fork { module, next } => {
                if module.assign_existing_shared_variable(name, value)? {
                    return Ok(true);
                }
                node = next.as_ref();
            }
        }
    }
}

/// Older links first so later writes in `out` reflect lookup precedence.
pub fn collect_methods(node: &LookupNode, out: &mut HashMap<Symbol, MethodEntry>) {
    match node {
        LookupNode::Terminal => {}
        LookupNode::Namespace(ns) => ns.get_methods(out),
        LookupNode::Fork { module, next } => {
            collect_methods(next, out);
            module.get_methods(out);
        }
    }
}

pub fn collect_shared_variable_names(mut node: &LookupNode, out: &mut BTreeSet<Symbol>) {
    loop {
        match node {
            LookupNode::Terminal => return,
            LookupNode::Namespace(ns) => return ns.collect_shared_variable_names(out),
            LookupNode::Fork { module, next } => {
                module.collect_shared_variable_names(out);
                node = next.as_ref();
            }
        }
    }
}

/// `true` if `target` is somewhere in the ancestry below `node`.
pub fn reaches(
    mut node: &LookupNode,
    target: NamespaceId,
    visited: &mut HashSet<NamespaceId>,
) -> bool {
    loop {
        match node {
            LookupNode::Terminal => return false,
            LookupNode::Namespace(ns) => return ns.chain_reaches(target, visited),
            LookupNode::Fork { module, next } => {
                if module.chain_reaches(target, visited) {
                    return true;
                }
                node = next.as_ref();
            }
        }
    }
}

/// Ancestors in resolution order, first occurrence wins. The flag is `true`
/// for namespaces that entered through an inclusion.
pub fn collect_ancestors(
    mut node: &LookupNode,
    out: &mut Vec<(Arc<Namespace>, bool)>,
    seen: &mut HashSet<NamespaceId>,
) {
    loop {
        let (ns, included) = match node {
            LookupNode::Terminal => return,
            LookupNode::Namespace(ns) => (ns, false),
            LookupNode::Fork { module, .. } => (module, true),
        };
        if seen.insert(ns.id()) {
            out.push((ns.clone(), included));
            collect_ancestors(&ns.lookup_head(), out, seen);
        }
        match node {
            LookupNode::Fork { next, .. } => node = next.as_ref(),
            _ => return,
        }
    }
}

mod cache;
mod class;
mod constant;
mod context;
mod epoch;
mod error;
pub mod lookup;
mod method;
mod mixin;
mod namespace;
mod registry;
pub mod script;
mod shared;
mod symbols;
mod value;

pub use cache::{InlineCache, Resolution};
pub use class::*;
pub use constant::*;
pub use context::*;
pub use epoch::{Epoch, Version};
pub use error::*;
pub use lookup::LookupNode;
pub use method::*;
pub use namespace::{Namespace, NamespaceId, NamespaceKind};
pub(crate) use registry::RegistryShared;
pub use registry::{NamespaceCreateInfo, Notice, NoticeSink, Registry, RegistryCreateInfo};
pub use symbols::*;
pub use value::*;

//! Process-wide registry of instrumentation descriptors.
//!
//! Descriptors are keyed by `(owner, kind, operation)` and stored
//! type-erased so operations with different argument types share one map.
//! Entries are never implicitly removed; re-registering an operation
//! overwrites its descriptor, and live stubs pick up the replacement on
//! their next call.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::descriptor::{Descriptor, OwnerKind};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RegistryKey {
    owner: String,
    kind: OwnerKind,
    operation: String,
}

type Stored = Arc<dyn Any + Send + Sync>;

static REGISTRY: Lazy<RwLock<HashMap<RegistryKey, Stored>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Store a descriptor, overwriting any previous entry for the same
/// operation.
pub fn register<A: 'static>(descriptor: Arc<Descriptor<A>>) {
    let key = RegistryKey {
        owner: descriptor.owner().to_string(),
        kind: descriptor.owner_kind(),
        operation: descriptor.operation().to_string(),
    };
    REGISTRY.write().insert(key, descriptor);
}

/// Look up the descriptor for an operation.
///
/// Returns `None` when nothing is registered under the key or when the
/// stored descriptor's argument type does not match `A`; both are fatal
/// programming errors for the interception stub, which fails loudly rather
/// than silently delegating.
pub fn lookup<A: 'static>(
    owner: &str,
    kind: OwnerKind,
    operation: &str,
) -> Option<Arc<Descriptor<A>>> {
    let key =
        RegistryKey { owner: owner.to_string(), kind, operation: operation.to_string() };
    let stored = REGISTRY.read().get(&key).cloned()?;
    stored.downcast::<Descriptor<A>>().ok()
}

/// Whether any descriptor is registered for the operation.
pub fn contains(owner: &str, kind: OwnerKind, operation: &str) -> bool {
    let key =
        RegistryKey { owner: owner.to_string(), kind, operation: operation.to_string() };
    REGISTRY.read().contains_key(&key)
}

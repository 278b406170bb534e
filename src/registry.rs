//! gatebridge/src/registry.rs
//! The callback registry: the "proxy pool" of spec §3 that the host calls
//! back into over the inbound channel.

use crate::proxy::MaterializedValue;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A locally-held object registered as an implementation of one or more
/// host interfaces (spec §3 "Callback proxy", design note "Callback object
/// registration"). Implement this for any type you want the host to be able
/// to call back into.
///
/// `invoke` is synchronous: it receives already-materialized arguments
/// (scalars decoded, and any host object reference rewrapped into a proxy
/// bound to the client that owns this registry) and returns a value or an
/// error message verbatim per spec §4.G. Implementations that need to do
/// further async work may spawn their own task and block on it, or simply
/// keep their own work synchronous — the callback server processes commands
/// on one inbound connection strictly in arrival order (spec §5), so a slow
/// `invoke` only stalls that one connection.
pub trait LocalObject: Send + Sync {
    /// The host interface names this object implements, sent alongside its
    /// registered ID whenever it is encoded as a callback-proxy argument.
    fn interfaces(&self) -> Vec<String>;

    /// Handle one inbound call. `method` and `args` come straight from the
    /// callback server's command parser (spec §4.G).
    fn invoke(&self, method: &str, args: Vec<MaterializedValue>) -> Result<MaterializedValue, String>;
}

/// Monotone-counter registry mapping `p<n>` IDs to registered local objects.
/// Shared between the outbound argument encoder (which registers) and the
/// callback server (which looks up and removes) — see spec §9's "Cyclic
/// references between Client and Callback Server" design note.
#[derive(Default)]
pub struct ProxyRegistry {
    counter: AtomicU64,
    objects: DashMap<String, Arc<dyn LocalObject>>,
}

impl ProxyRegistry {
    pub fn new() -> Self {
        ProxyRegistry {
            counter: AtomicU64::new(0),
            objects: DashMap::new(),
        }
    }

    /// Register `obj`, returning its new `p<n>` ID. IDs are never reused
    /// within a session (spec §3 invariant).
    pub fn register(&self, obj: Arc<dyn LocalObject>) -> String {
        let id = format!("p{}", self.counter.fetch_add(1, Ordering::SeqCst));
        self.objects.insert(id.clone(), obj);
        id
    }

    /// Resolve a callback-proxy ID to its registered object, or `None` if
    /// absent (spec §4.A tag `f` decode rule).
    pub fn lookup(&self, id: &str) -> Option<Arc<dyn LocalObject>> {
        self.objects.get(id).map(|entry| entry.value().clone())
    }

    /// Remove an entry. Idempotent: removing an already-absent ID is a
    /// no-op, not an error (spec §3 invariant).
    pub fn remove(&self, id: &str) {
        self.objects.remove(id);
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;
    impl LocalObject for Echo {
        fn interfaces(&self) -> Vec<String> {
            vec!["com.example.Echo".to_string()]
        }
        fn invoke(&self, _method: &str, args: Vec<MaterializedValue>) -> Result<MaterializedValue, String> {
            Ok(args.into_iter().next().unwrap_or(MaterializedValue::Null))
        }
    }

    #[test]
    fn registration_yields_increasing_never_reused_ids() {
        let registry = ProxyRegistry::new();
        let a = registry.register(Arc::new(Echo));
        let b = registry.register(Arc::new(Echo));
        assert_eq!(a, "p0");
        assert_eq!(b, "p1");
        assert_ne!(a, b);
    }

    #[test]
    fn remove_is_idempotent() {
        let registry = ProxyRegistry::new();
        let id = registry.register(Arc::new(Echo));
        assert!(registry.lookup(&id).is_some());
        registry.remove(&id);
        assert!(registry.lookup(&id).is_none());
        // Removing again must not panic or error.
        registry.remove(&id);
    }

    #[test]
    fn lookup_of_missing_id_is_none() {
        let registry = ProxyRegistry::new();
        assert!(registry.lookup("p999").is_none());
    }
}

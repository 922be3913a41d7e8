//! Lazily created, independently configured caches per namespace.
//!
//! A [`ScopedCacheRegistry`] maps an outer namespace identity (for example,
//! "which provider minted these keys") to its own [`Cache`]. Every cache is
//! stamped from the same [`CacheBuilder`] template, so all namespaces share a
//! configuration but never share entries.
//!
//! ## Example Usage
//!
//! ```
//! use memograph::builder::CacheBuilder;
//! use memograph::context::GenerationContext;
//! use memograph::registry::ScopedCacheRegistry;
//!
//! let registry = ScopedCacheRegistry::new(
//!     CacheBuilder::<u32, u32>::new()
//!         .builder(|_: &mut GenerationContext<u32, u32>, key: &u32| Ok(key * 10)),
//! );
//!
//! let a = registry.get_scoped_cache(&"provider-a");
//! let b = registry.get_scoped_cache(&"provider-b");
//! a.get_or_add(&1).unwrap();
//!
//! assert!(a.ptr_eq(&registry.get_scoped_cache(&"provider-a")));
//! assert!(!b.contains(&1));
//! ```

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::builder::CacheBuilder;
use crate::cache::Cache;
use crate::traits::KeyScope;

type ScopeFn<N, K> = dyn Fn(&N, &K) -> bool + Send + Sync;

/// Key scope bound to one namespace.
struct NamespaceScope<N, K> {
    namespace: N,
    belongs: Arc<ScopeFn<N, K>>,
}

impl<N, K> KeyScope<K> for NamespaceScope<N, K>
where
    N: Send + Sync,
{
    fn owns(&self, key: &K) -> bool {
        (self.belongs)(&self.namespace, key)
    }
}

/// Registry of one [`Cache`] per namespace.
pub struct ScopedCacheRegistry<N, K, V> {
    template: CacheBuilder<K, V>,
    key_scope: Option<Arc<ScopeFn<N, K>>>,
    caches: RwLock<FxHashMap<N, Cache<K, V>>>,
}

impl<N, K, V> ScopedCacheRegistry<N, K, V>
where
    N: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    /// Creates a registry whose caches copy `template`'s builder factory,
    /// placeholder factory and failure policy.
    pub fn new(template: CacheBuilder<K, V>) -> Self {
        Self {
            template,
            key_scope: None,
            caches: RwLock::new(FxHashMap::default()),
        }
    }

    /// Installs a namespace ownership check on every cache created from now
    /// on: a key is accepted by namespace `n`'s cache only if
    /// `belongs(n, key)` holds.
    pub fn with_key_scope<F>(mut self, belongs: F) -> Self
    where
        F: Fn(&N, &K) -> bool + Send + Sync + 'static,
    {
        self.key_scope = Some(Arc::new(belongs));
        self
    }

    /// Returns the cache for `namespace`, creating it on first use.
    ///
    /// Equal namespaces always receive the same cache instance.
    pub fn get_scoped_cache(&self, namespace: &N) -> Cache<K, V> {
        if let Some(cache) = self.caches.read().get(namespace) {
            return cache.clone();
        }

        let mut caches = self.caches.write();
        caches
            .entry(namespace.clone())
            .or_insert_with(|| {
                debug!(namespace = ?namespace, "creating scoped cache");
                self.create_cache(namespace)
            })
            .clone()
    }

    /// Returns `true` if a cache was already created for `namespace`.
    pub fn contains_namespace(&self, namespace: &N) -> bool {
        self.caches.read().contains_key(namespace)
    }

    /// Number of namespaces with a cache.
    pub fn len(&self) -> usize {
        self.caches.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the namespaces with a cache, in no particular order.
    pub fn namespaces(&self) -> Vec<N> {
        self.caches.read().keys().cloned().collect()
    }

    fn create_cache(&self, namespace: &N) -> Cache<K, V> {
        let template = self.template.clone();
        match &self.key_scope {
            Some(belongs) => template
                .shared_key_scope(Arc::new(NamespaceScope {
                    namespace: namespace.clone(),
                    belongs: Arc::clone(belongs),
                }))
                .build(),
            None => template.build(),
        }
    }
}

impl<N, K, V> fmt::Debug for ScopedCacheRegistry<N, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedCacheRegistry")
            .field("namespaces", &self.caches.read().len())
            .field("template", &self.template)
            .field("scoped", &self.key_scope.is_some())
            .finish()
    }
}

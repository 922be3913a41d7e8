//! Configuration builder for [`Cache`] instances.
//!
//! Configuration is fixed at construction: which builder factory derives
//! values (none means read-only), which placeholder factory breaks cycles,
//! whether derivation failures are memoized, and which keys the cache owns.
//!
//! ## Example
//!
//! ```rust
//! use memograph::builder::CacheBuilder;
//! use memograph::context::GenerationContext;
//! use memograph::placeholder::PlaceholderValue;
//!
//! let cache = CacheBuilder::<u32, u32>::new()
//!     .builder(|_: &mut GenerationContext<u32, u32>, key: &u32| Ok(key + 1))
//!     .placeholder_factory(|_: &u32| PlaceholderValue::sentinel(0))
//!     .cache_failures(true)
//!     .build();
//!
//! assert_eq!(cache.get_or_add(&1).unwrap(), 2);
//! assert!(cache.caches_failures());
//! ```

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use crate::cache::{Cache, CacheConfig};
use crate::context::GenerationContext;
use crate::error::EngineError;
use crate::traits::{Builder, BuilderFactory, KeyScope, PlaceholderFactory};

/// Builder for creating [`Cache`] instances.
///
/// `CacheBuilder` is cheap to clone; every collaborator is shared, so a
/// template can stamp out any number of identically configured caches.
pub struct CacheBuilder<K, V> {
    builder_factory: Option<Arc<dyn BuilderFactory<K, V>>>,
    placeholder_factory: Option<Arc<dyn PlaceholderFactory<K, V>>>,
    key_scope: Option<Arc<dyn KeyScope<K>>>,
    cache_failures: bool,
}

impl<K, V> CacheBuilder<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    /// Creates a builder for a read-only cache that does not memoize failures.
    pub fn new() -> Self {
        Self {
            builder_factory: None,
            placeholder_factory: None,
            key_scope: None,
            cache_failures: false,
        }
    }

    /// Sets the factory that creates a fresh [`Builder`] for each pass.
    pub fn builder_factory<F>(mut self, factory: F) -> Self
    where
        F: BuilderFactory<K, V> + 'static,
    {
        self.builder_factory = Some(Arc::new(factory));
        self
    }

    /// Shares one stateless builder function across every pass.
    pub fn builder<F>(self, builder: F) -> Self
    where
        F: Fn(&mut GenerationContext<K, V>, &K) -> Result<V, EngineError> + Send + Sync + 'static,
    {
        let builder = Arc::new(builder);
        self.builder_factory(move || Arc::clone(&builder) as Arc<dyn Builder<K, V>>)
    }

    /// Sets the factory consulted when a pending key is requested again.
    pub fn placeholder_factory<F>(mut self, factory: F) -> Self
    where
        F: PlaceholderFactory<K, V> + 'static,
    {
        self.placeholder_factory = Some(Arc::new(factory));
        self
    }

    /// Sets whether derivation failures are remembered and replayed.
    pub fn cache_failures(mut self, enabled: bool) -> Self {
        self.cache_failures = enabled;
        self
    }

    /// Restricts the cache to keys accepted by `scope`.
    pub fn key_scope<F>(mut self, scope: F) -> Self
    where
        F: KeyScope<K> + 'static,
    {
        self.key_scope = Some(Arc::new(scope));
        self
    }

    pub(crate) fn shared_key_scope(mut self, scope: Arc<dyn KeyScope<K>>) -> Self {
        self.key_scope = Some(scope);
        self
    }

    /// Builds the cache.
    pub fn build(self) -> Cache<K, V> {
        Cache::from_config(CacheConfig {
            builder_factory: self.builder_factory,
            placeholder_factory: self.placeholder_factory,
            key_scope: self.key_scope,
            cache_failures: self.cache_failures,
        })
    }
}

impl<K, V> Clone for CacheBuilder<K, V> {
    fn clone(&self) -> Self {
        Self {
            builder_factory: self.builder_factory.clone(),
            placeholder_factory: self.placeholder_factory.clone(),
            key_scope: self.key_scope.clone(),
            cache_failures: self.cache_failures,
        }
    }
}

impl<K, V> Default for CacheBuilder<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for CacheBuilder<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheBuilder")
            .field("has_builder", &self.builder_factory.is_some())
            .field("has_placeholders", &self.placeholder_factory.is_some())
            .field("scoped", &self.key_scope.is_some())
            .field("cache_failures", &self.cache_failures)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::placeholder::PlaceholderValue;
    use crate::traits::builder_fn;

    #[test]
    fn defaults_to_read_only_without_failure_caching() {
        let cache = CacheBuilder::<u32, u32>::default().build();
        assert!(cache.is_read_only());
        assert!(!cache.caches_failures());
        assert!(cache.is_empty());
    }

    #[test]
    fn factory_is_invoked_once_per_pass() {
        let passes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&passes);
        let cache = CacheBuilder::new()
            .builder_factory(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                builder_fn(|ctx: &mut GenerationContext<u32, u32>, key: &u32| {
                    if *key == 0 {
                        return Ok(0);
                    }
                    Ok(ctx.try_get_or_build(&(key - 1))?.unwrap_or_default() + 1)
                })
            })
            .build();

        assert_eq!(cache.get_or_add(&3).unwrap(), 3);
        assert_eq!(passes.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get_or_add(&5).unwrap(), 5);
        assert_eq!(passes.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 6);
    }

    #[test]
    fn clones_build_independent_caches() {
        let template = CacheBuilder::<u32, u32>::new()
            .builder(|_: &mut GenerationContext<u32, u32>, key: &u32| Ok(*key))
            .placeholder_factory(|_: &u32| PlaceholderValue::sentinel(0))
            .cache_failures(true);

        let a = template.clone().build();
        let b = template.build();
        a.get_or_add(&1).unwrap();

        assert!(a.contains(&1));
        assert!(!b.contains(&1));
        assert!(!a.ptr_eq(&b));
        assert!(b.caches_failures());
    }
}

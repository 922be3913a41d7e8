//! Shared, thread-safe store of derived values for one key namespace.
//!
//! ## Architecture
//!
//! ```text
//!   Cache<K, V>  (cheap Arc handle)
//!   ┌─────────────────────────────────────────────────────────────────────┐
//!   │ store:     RwLock<FxHashMap<K, V>>            published entries     │
//!   │ failures:  RwLock<FxHashMap<K, Err>>          memoized errors       │
//!   │ in_flight: Mutex<FxHashMap<K, Arc<InFlight>>> one pass per root key │
//!   │ builder_factory / placeholder_factory / key_scope / cache_failures  │
//!   └─────────────────────────────────────────────────────────────────────┘
//!
//!   get_or_add(K)
//!     │ hit? ───────────────────────────────────────────────▶ return value
//!     │ memoized failure? ──────────────────────────────────▶ return same error
//!     │ K in flight elsewhere? ──▶ wait for it, then start over
//!     ▼
//!   claim K ─▶ re-check ─▶ GenerationContext pass for K
//!                            │
//!                            ▼
//!              try_commit_results ─▶ one write lock, all-or-nothing
//!                            │ conflict
//!                            └──▶ new pass, reusing what others published
//! ```
//!
//! ## Key Components
//!
//! - `get_or_add`: memoized derivation with single-flight semantics.
//! - `try_add` / `set`: direct insertion for callers that already hold a value.
//! - `create_context`: a [`GenerationContext`] bound to this cache, for callers
//!   that drive a pass by hand.
//!
//! ## Concurrency
//!
//! Reads take a shared lock and never wait on a running derivation.
//! Single flight is tracked per requested key: the first caller to miss
//! claims the key and runs the pass, later callers for the same key block
//! until that pass ends and then reuse its published value (or its memoized
//! failure). Passes for different keys run side by side. When two passes
//! derive the same dependency differently, the losing commit publishes
//! nothing and its pass is retried; the retry finds the winner's values in
//! the store instead of rebuilding them.
//!
//! A builder may call `get_or_add` on its own cache for other keys, from
//! its own thread or from threads it waits on. Asking for the key it is
//! deriving on the same thread fails with
//! [`InvariantError::UnresolvableReentry`]; doing so from a thread it waits
//! on never returns. Published entries are immutable.
//!
//! ## Example Usage
//!
//! ```
//! use memograph::builder::CacheBuilder;
//! use memograph::context::GenerationContext;
//!
//! let cache = CacheBuilder::<String, usize>::new()
//!     .builder(|_: &mut GenerationContext<String, usize>, key: &String| Ok(key.len()))
//!     .build();
//!
//! assert_eq!(cache.get_or_add(&"hello".to_string()).unwrap(), 5);
//! assert!(cache.contains(&"hello".to_string()));
//! ```

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex, RwLock};
use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

use crate::context::GenerationContext;
use crate::error::{DerivationError, EngineError, InvariantError};
#[cfg(feature = "metrics")]
use crate::metrics::{EngineCounters, EngineMetricsSnapshot, MetricsReset, MetricsSnapshotProvider};
use crate::traits::{BuilderFactory, KeyScope, PlaceholderFactory};

/// Passes attempted per `get_or_add` call before a conflict is reported.
const MAX_PASS_ATTEMPTS: usize = 4;

pub(crate) struct CacheConfig<K, V> {
    pub(crate) builder_factory: Option<Arc<dyn BuilderFactory<K, V>>>,
    pub(crate) placeholder_factory: Option<Arc<dyn PlaceholderFactory<K, V>>>,
    pub(crate) key_scope: Option<Arc<dyn KeyScope<K>>>,
    pub(crate) cache_failures: bool,
}

/// A pass running for one requested key.
struct InFlight {
    owner: ThreadId,
    done: Mutex<bool>,
    finished: Condvar,
}

impl InFlight {
    fn new() -> Self {
        Self {
            owner: thread::current().id(),
            done: Mutex::new(false),
            finished: Condvar::new(),
        }
    }

    fn wait(&self) {
        let mut done = self.done.lock();
        while !*done {
            self.finished.wait(&mut done);
        }
    }

    fn finish(&self) {
        *self.done.lock() = true;
        self.finished.notify_all();
    }
}

/// Releases a claimed key and wakes its waiters, even if the pass panics.
struct Claim<'a, K: Eq + Hash, V> {
    inner: &'a CacheInner<K, V>,
    key: K,
    cell: Arc<InFlight>,
}

impl<K: Eq + Hash, V> Drop for Claim<'_, K, V> {
    fn drop(&mut self) {
        self.inner.in_flight.lock().remove(&self.key);
        self.cell.finish();
    }
}

struct CacheInner<K, V> {
    store: RwLock<FxHashMap<K, V>>,
    failures: RwLock<FxHashMap<K, DerivationError>>,
    in_flight: Mutex<FxHashMap<K, Arc<InFlight>>>,
    config: CacheConfig<K, V>,
    #[cfg(feature = "metrics")]
    counters: EngineCounters,
}

/// Shared store of derived values.
///
/// Cloning a `Cache` yields another handle to the same store.
pub struct Cache<K, V> {
    inner: Arc<CacheInner<K, V>>,
}

impl<K, V> Clone for Cache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    pub(crate) fn from_config(config: CacheConfig<K, V>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                store: RwLock::new(FxHashMap::default()),
                failures: RwLock::new(FxHashMap::default()),
                in_flight: Mutex::new(FxHashMap::default()),
                config,
                #[cfg(feature = "metrics")]
                counters: EngineCounters::default(),
            }),
        }
    }

    /// Returns the value for `key`, deriving and publishing it on a miss.
    ///
    /// Concurrent callers for the same key share one derivation.
    ///
    /// # Errors
    ///
    /// - [`InvariantError::ForeignKey`] for keys outside this cache's namespace.
    /// - [`InvariantError::ReadOnlyCache`] when no builder factory is configured.
    /// - [`InvariantError::UnresolvableReentry`] when a builder asks, on its
    ///   own thread, for the key it is deriving.
    /// - [`EngineError::Derivation`] when the builder fails. With
    ///   `cache_failures` enabled, the same failure instance is returned on
    ///   every later call until a value is published for `key`.
    /// - [`EngineError::Conflict`] when every pass attempt conflicted with
    ///   concurrently published values and none was published for `key`.
    pub fn get_or_add(&self, key: &K) -> Result<V, EngineError> {
        self.check_key(key)?;
        self.note_get_call();

        if let Some(value) = self.peek(key) {
            self.note_get_hit();
            return Ok(value);
        }
        if let Some(err) = self.replay_failure(key) {
            return Err(err);
        }
        self.note_get_miss();

        let Some(factory) = &self.inner.config.builder_factory else {
            return Err(InvariantError::ReadOnlyCache {
                key: InvariantError::key(key),
            }
            .into());
        };

        let _claim = loop {
            if let Some(claim) = self.claim(key)? {
                break claim;
            }
            // Another thread's pass for `key` ended; it may have published.
            if let Some(value) = self.peek(key) {
                return Ok(value);
            }
            if let Some(err) = self.replay_failure(key) {
                return Err(err);
            }
        };

        // Published or failed between our miss and the claim.
        if let Some(value) = self.peek(key) {
            return Ok(value);
        }
        if let Some(err) = self.replay_failure(key) {
            return Err(err);
        }

        self.derive(key, &**factory)
    }

    /// Claims `key` for this thread, or waits for the pass that holds it and
    /// returns `None`.
    fn claim(&self, key: &K) -> Result<Option<Claim<'_, K, V>>, InvariantError> {
        let running = {
            let mut in_flight = self.inner.in_flight.lock();
            match in_flight.get(key) {
                Some(cell) => Arc::clone(cell),
                None => {
                    let cell = Arc::new(InFlight::new());
                    in_flight.insert(key.clone(), Arc::clone(&cell));
                    return Ok(Some(Claim {
                        inner: &*self.inner,
                        key: key.clone(),
                        cell,
                    }));
                },
            }
        };

        if running.owner == thread::current().id() {
            return Err(InvariantError::UnresolvableReentry {
                key: InvariantError::key(key),
            });
        }
        trace!(key = ?key, "waiting on in-flight pass");
        running.wait();
        Ok(None)
    }

    /// Runs generation passes for `key` until one commits.
    fn derive(&self, key: &K, factory: &dyn BuilderFactory<K, V>) -> Result<V, EngineError> {
        for attempt in 1..=MAX_PASS_ATTEMPTS {
            debug!(key = ?key, attempt, "starting generation pass");
            self.note_pass();

            let mut ctx = GenerationContext::attached(
                self.clone(),
                Some(factory.create_builder()),
                self.inner.config.placeholder_factory.clone(),
            );

            let value = match ctx.build_root(key) {
                Ok(value) => value,
                Err(err) => {
                    self.remember_failure(key, &err);
                    return Err(err);
                },
            };

            if ctx.try_commit_results()? {
                return Ok(value);
            }
            if let Some(published) = self.peek(key) {
                return Ok(published);
            }
            debug!(key = ?key, attempt, "generation pass lost a commit race, retrying");
        }

        Err(EngineError::Conflict {
            key: InvariantError::key(key),
        })
    }

    /// Returns the published value for `key`, if any.
    ///
    /// # Errors
    ///
    /// [`InvariantError::ForeignKey`] for keys outside this cache's namespace.
    pub fn get(&self, key: &K) -> Result<Option<V>, InvariantError> {
        self.check_key(key)?;
        Ok(self.peek(key))
    }

    /// Inserts `value` directly, bypassing derivation.
    ///
    /// Returns `Ok(false)` if a different value is already published for
    /// `key`; inserting an equal value succeeds.
    pub fn try_add(&self, key: K, value: V) -> Result<bool, InvariantError> {
        self.check_key(&key)?;
        let mut store = self.inner.store.write();
        if let Some(existing) = store.get(&key) {
            return Ok(*existing == value);
        }
        self.inner.failures.write().remove(&key);
        store.insert(key, value);
        Ok(true)
    }

    /// Inserts `value` directly, failing on a conflicting published value.
    pub fn set(&self, key: K, value: V) -> Result<(), InvariantError> {
        let rendered = InvariantError::key(&key);
        if self.try_add(key, value)? {
            Ok(())
        } else {
            Err(InvariantError::DuplicateKey { key: rendered })
        }
    }

    /// Returns `true` if a value is published for `key`.
    ///
    /// Performs no namespace check: a foreign key is simply never contained.
    /// Use [`get`](Self::get) to have foreign keys rejected.
    pub fn contains(&self, key: &K) -> bool {
        self.inner.store.read().contains_key(key)
    }

    /// Number of published entries.
    pub fn len(&self) -> usize {
        self.inner.store.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` when no builder factory is configured.
    pub fn is_read_only(&self) -> bool {
        self.inner.config.builder_factory.is_none()
    }

    pub fn caches_failures(&self) -> bool {
        self.inner.config.cache_failures
    }

    /// Forgets every memoized derivation failure.
    pub fn clear_failures(&self) {
        self.inner.failures.write().clear();
    }

    /// Returns `true` if both handles refer to the same cache.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Creates a generation context that commits into this cache, using a
    /// fresh builder from the configured factory (if any) and the configured
    /// placeholder factory.
    pub fn create_context(&self) -> GenerationContext<K, V> {
        GenerationContext::attached(
            self.clone(),
            self.inner
                .config
                .builder_factory
                .as_ref()
                .map(|factory| factory.create_builder()),
            self.inner.config.placeholder_factory.clone(),
        )
    }

    /// Rejects keys outside this cache's namespace.
    pub(crate) fn check_key(&self, key: &K) -> Result<(), InvariantError> {
        match &self.inner.config.key_scope {
            Some(scope) if !scope.owns(key) => Err(InvariantError::ForeignKey {
                key: InvariantError::key(key),
            }),
            _ => Ok(()),
        }
    }

    /// Publishes a pass's entries all-or-nothing. Returns `false` and
    /// publishes nothing if any entry conflicts with a published value.
    pub(crate) fn publish(&self, entries: Vec<(K, V)>) -> bool {
        let mut store = self.inner.store.write();

        let mut staged = Vec::with_capacity(entries.len());
        let mut conflicts = 0usize;
        for (key, value) in entries {
            match store.get(&key) {
                None => staged.push((key, value)),
                Some(existing) if *existing == value => {},
                Some(_) => {
                    warn!(key = ?key, "generation pass conflicts with published value");
                    conflicts += 1;
                },
            }
        }

        if conflicts > 0 {
            self.note_commit_conflict();
            return false;
        }

        if !staged.is_empty() {
            let mut failures = self.inner.failures.write();
            for (key, _) in &staged {
                failures.remove(key);
            }
        }
        trace!(inserted = staged.len(), "generation pass published");
        store.extend(staged);
        self.note_commit();
        true
    }

    fn peek(&self, key: &K) -> Option<V> {
        self.inner.store.read().get(key).cloned()
    }

    fn replay_failure(&self, key: &K) -> Option<EngineError> {
        if !self.inner.config.cache_failures {
            return None;
        }
        let failure = self.inner.failures.read().get(key).cloned()?;
        trace!(key = ?key, "replaying memoized failure");
        self.note_failure_replay();
        Some(EngineError::Derivation(failure))
    }

    fn remember_failure(&self, key: &K, err: &EngineError) {
        if !self.inner.config.cache_failures {
            return;
        }
        if let EngineError::Derivation(failure) = err {
            warn!(key = ?key, error = %failure, "memoizing derivation failure");
            self.inner
                .failures
                .write()
                .entry(key.clone())
                .or_insert_with(|| Arc::clone(failure));
        }
    }
}

// ---------------------------------------------------------------------------
// Metrics hooks
// ---------------------------------------------------------------------------

#[cfg(feature = "metrics")]
impl<K, V> Cache<K, V> {
    pub(crate) fn counters(&self) -> &EngineCounters {
        &self.inner.counters
    }

    #[inline]
    fn note_get_call(&self) {
        self.inner.counters.inc_get_call();
    }

    #[inline]
    fn note_get_hit(&self) {
        self.inner.counters.inc_get_hit();
    }

    #[inline]
    fn note_get_miss(&self) {
        self.inner.counters.inc_get_miss();
    }

    #[inline]
    fn note_pass(&self) {
        self.inner.counters.inc_pass();
    }

    #[inline]
    fn note_commit(&self) {
        self.inner.counters.inc_commit();
    }

    #[inline]
    fn note_commit_conflict(&self) {
        self.inner.counters.inc_commit_conflict();
    }

    #[inline]
    fn note_failure_replay(&self) {
        self.inner.counters.inc_failure_replay();
    }
}

#[cfg(not(feature = "metrics"))]
impl<K, V> Cache<K, V> {
    #[inline(always)]
    fn note_get_call(&self) {}
    #[inline(always)]
    fn note_get_hit(&self) {}
    #[inline(always)]
    fn note_get_miss(&self) {}
    #[inline(always)]
    fn note_pass(&self) {}
    #[inline(always)]
    fn note_commit(&self) {}
    #[inline(always)]
    fn note_commit_conflict(&self) {}
    #[inline(always)]
    fn note_failure_replay(&self) {}
}

#[cfg(feature = "metrics")]
impl<K, V> MetricsSnapshotProvider<EngineMetricsSnapshot> for Cache<K, V> {
    fn snapshot(&self) -> EngineMetricsSnapshot {
        let mut snapshot = self.inner.counters.snapshot();
        snapshot.cache_len = self.inner.store.read().len();
        snapshot.failures_len = self.inner.failures.read().len();
        snapshot
    }
}

#[cfg(feature = "metrics")]
impl<K, V> MetricsReset for Cache<K, V> {
    fn reset_metrics(&self) {
        self.inner.counters.reset();
    }
}

impl<K, V> fmt::Debug for Cache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("len", &self.inner.store.read().len())
            .field("read_only", &self.inner.config.builder_factory.is_none())
            .field("has_placeholders", &self.inner.config.placeholder_factory.is_some())
            .field("scoped", &self.inner.config.key_scope.is_some())
            .field("cache_failures", &self.inner.config.cache_failures)
            .finish()
    }
}

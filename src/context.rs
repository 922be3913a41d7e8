//! Per-pass workspace for deriving a graph of values.
//!
//! A [`GenerationContext`] tracks every key touched by one derivation pass:
//! keys whose builder is still running, placeholders issued for re-entrant
//! requests, and values resolved during the pass. Nothing becomes visible to
//! other threads until [`GenerationContext::try_commit_results`] publishes the
//! whole pass into the parent [`Cache`] in one step.
//!
//! ## Entry States
//!
//! ```text
//!   Unseen ──try_get_or_build──▶ Pending ──builder returns / add──▶ Resolved
//!                                   │                                  ▲
//!                                   │ re-entrant request               │ add resolves
//!                                   ▼                                  │ the placeholder
//!                            PlaceholderIssued ────────────────────────┘
//! ```
//!
//! ## Core Operations
//!
//! - `try_get_or_build`: parent cache, then this pass, then build or
//!   placeholder.
//! - `add` / `overwrite`: record a terminal value, resolving any placeholder
//!   issued for the key.
//! - `try_commit_results`: atomic publication into the parent cache.
//!
//! ## Example Usage
//!
//! ```
//! use memograph::context::GenerationContext;
//!
//! // Probe-then-add workflow without a builder.
//! let mut ctx: GenerationContext<&str, u32> = GenerationContext::new();
//! assert_eq!(ctx.try_get_or_build(&"a").unwrap(), None);
//! assert_eq!(ctx.pending_len(), 1);
//!
//! ctx.add("a", 1).unwrap();
//! assert_eq!(ctx.get(&"a").unwrap(), 1);
//! assert_eq!(ctx.len(), 1);
//! ```
//!
//! ## Thread Safety
//!
//! A context is the single-threaded workspace of one recursive call stack.
//! Cycle detection relies on seeing that stack's pending keys, so a context
//! is deliberately not shared between threads.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::cache::Cache;
use crate::error::{EngineError, InvariantError};
use crate::placeholder::PlaceholderValue;
use crate::traits::{Builder, PlaceholderFactory};

/// State of one key within a pass.
enum Entry<V> {
    /// The key's builder was invoked and has not returned.
    Pending,
    /// The key was requested re-entrantly and handed a placeholder.
    PlaceholderIssued(PlaceholderValue<V>),
    /// A terminal value was recorded.
    Resolved(V),
}

impl<V> Entry<V> {
    fn resolved(&self) -> Option<&V> {
        match self {
            Entry::Resolved(value) => Some(value),
            _ => None,
        }
    }
}

/// The private workspace of a single derivation pass.
pub struct GenerationContext<K, V> {
    entries: FxHashMap<K, Entry<V>>,
    parent: Option<Cache<K, V>>,
    builder: Option<Arc<dyn Builder<K, V>>>,
    placeholders: Option<Arc<dyn PlaceholderFactory<K, V>>>,
}

impl<K, V> GenerationContext<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    /// Creates a detached context with no parent cache, no builder and no
    /// placeholder factory.
    pub fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
            parent: None,
            builder: None,
            placeholders: None,
        }
    }

    /// Creates a context that commits into `parent`.
    pub(crate) fn attached(
        parent: Cache<K, V>,
        builder: Option<Arc<dyn Builder<K, V>>>,
        placeholders: Option<Arc<dyn PlaceholderFactory<K, V>>>,
    ) -> Self {
        Self {
            entries: FxHashMap::default(),
            parent: Some(parent),
            builder,
            placeholders,
        }
    }

    /// Sets the builder invoked for keys this pass has not seen.
    pub fn with_builder(mut self, builder: Arc<dyn Builder<K, V>>) -> Self {
        self.builder = Some(builder);
        self
    }

    /// Sets the factory consulted for re-entrant requests.
    pub fn with_placeholder_factory(
        mut self,
        factory: Arc<dyn PlaceholderFactory<K, V>>,
    ) -> Self {
        self.placeholders = Some(factory);
        self
    }

    /// The cache this context commits into, if any.
    pub fn parent(&self) -> Option<&Cache<K, V>> {
        self.parent.as_ref()
    }

    /// Returns `true` if a terminal value is recorded for `key` in this pass.
    pub fn contains(&self, key: &K) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| entry.resolved().is_some())
    }

    /// Number of keys with a terminal value in this pass.
    pub fn len(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.resolved().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of keys still pending or waiting on an issued placeholder.
    pub fn pending_len(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.resolved().is_none())
            .count()
    }

    /// Returns the value recorded for `key` in this pass.
    ///
    /// # Errors
    ///
    /// [`InvariantError::KeyNotFound`] when no terminal value exists; pending
    /// keys and issued placeholders are not values.
    pub fn get(&self, key: &K) -> Result<V, InvariantError> {
        self.entries
            .get(key)
            .and_then(Entry::resolved)
            .cloned()
            .ok_or_else(|| InvariantError::KeyNotFound {
                key: InvariantError::key(key),
            })
    }

    /// Iterates the terminal values recorded in this pass.
    pub fn entries(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries
            .iter()
            .filter_map(|(key, entry)| entry.resolved().map(|value| (key, value)))
    }

    /// Drops every entry, pending marker and placeholder of this pass.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Resolves `key` within this pass.
    ///
    /// Lookup order:
    /// 1. a value already published in the parent cache;
    /// 2. a value recorded earlier in this pass;
    /// 3. a re-entrant request for a pending key is answered with a
    ///    placeholder stand-in;
    /// 4. without a builder, the first request marks the key pending and
    ///    returns `Ok(None)` so the caller can derive and [`add`](Self::add)
    ///    it itself;
    /// 5. with a builder, the key is marked pending, built, and recorded.
    ///
    /// The builder's return value is what gets recorded, replacing anything
    /// the builder itself [`add`](Self::add)ed for `key`. A placeholder that
    /// such an `add` already resolved keeps the earlier value.
    ///
    /// # Errors
    ///
    /// - [`InvariantError::UnresolvableReentry`] for a re-entrant request
    ///   when no placeholder factory is configured.
    /// - [`InvariantError::ForeignKey`] when the parent cache rejects `key`.
    /// - Whatever the builder returns. The key stays pending, so the pass
    ///   can no longer be committed.
    pub fn try_get_or_build(&mut self, key: &K) -> Result<Option<V>, EngineError> {
        if let Some(parent) = &self.parent {
            if let Some(value) = parent.get(key)? {
                return Ok(Some(value));
            }
        }

        match self.entries.get(key) {
            Some(Entry::Resolved(value)) => return Ok(Some(value.clone())),
            Some(Entry::PlaceholderIssued(placeholder)) => {
                return Ok(Some(placeholder.stand_in().clone()));
            },
            Some(Entry::Pending) => return self.issue_placeholder(key).map(Some),
            None => {},
        }

        self.entries.insert(key.clone(), Entry::Pending);

        let Some(builder) = self.builder.clone() else {
            trace!(key = ?key, "marked pending without builder");
            return Ok(None);
        };

        trace!(key = ?key, "invoking builder");
        self.note_builder_invocation();

        let value = builder.build(self, key)?;
        self.record(key.clone(), value.clone(), true)?;
        Ok(Some(value))
    }

    /// Derives `key` with the configured builder, failing with
    /// [`InvariantError::ReadOnlyCache`] when there is none.
    pub(crate) fn build_root(&mut self, key: &K) -> Result<V, EngineError> {
        match self.try_get_or_build(key)? {
            Some(value) => Ok(value),
            None => Err(InvariantError::ReadOnlyCache {
                key: InvariantError::key(key),
            }
            .into()),
        }
    }

    /// Records a terminal value for `key`.
    ///
    /// Any placeholder issued for `key` during this pass is resolved before
    /// this returns.
    ///
    /// # Errors
    ///
    /// [`InvariantError::DuplicateKey`] if a *different* value is already
    /// recorded. Re-adding an equal value is a no-op.
    pub fn add(&mut self, key: K, value: V) -> Result<(), InvariantError> {
        self.record(key, value, false)
    }

    /// Records a terminal value for `key`, replacing any existing value.
    pub fn overwrite(&mut self, key: K, value: V) -> Result<(), InvariantError> {
        self.record(key, value, true)
    }

    fn record(&mut self, key: K, value: V, overwrite: bool) -> Result<(), InvariantError> {
        if let Some(parent) = &self.parent {
            parent.check_key(&key)?;
        }

        match self.entries.get(&key) {
            Some(Entry::Resolved(existing)) if !overwrite => {
                if *existing == value {
                    return Ok(());
                }
                return Err(InvariantError::DuplicateKey {
                    key: InvariantError::key(&key),
                });
            },
            Some(Entry::PlaceholderIssued(placeholder)) => {
                placeholder.resolve(value.clone());
                trace!(key = ?key, "placeholder resolved");
            },
            _ => {},
        }

        self.entries.insert(key, Entry::Resolved(value));
        Ok(())
    }

    /// Publishes this pass into the parent cache.
    ///
    /// Returns `Ok(false)` without publishing anything if any value of this
    /// pass differs from one already in the cache. Committing again after a
    /// success is a no-op that returns `Ok(true)`.
    ///
    /// # Errors
    ///
    /// - [`InvariantError::PendingAtCommit`] /
    ///   [`InvariantError::UnresolvedPlaceholder`] while any key is in flight.
    /// - [`InvariantError::DetachedCommit`] when there is no parent cache,
    ///   including for an empty context.
    pub fn try_commit_results(&mut self) -> Result<bool, InvariantError> {
        for (key, entry) in &self.entries {
            match entry {
                Entry::Pending => {
                    return Err(InvariantError::PendingAtCommit {
                        key: InvariantError::key(key),
                    });
                },
                Entry::PlaceholderIssued(_) => {
                    return Err(InvariantError::UnresolvedPlaceholder {
                        key: InvariantError::key(key),
                    });
                },
                Entry::Resolved(_) => {},
            }
        }

        let Some(parent) = &self.parent else {
            return Err(InvariantError::DetachedCommit);
        };

        let staged: Vec<(K, V)> = self
            .entries()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        debug!(entries = staged.len(), "committing generation pass");
        Ok(parent.publish(staged))
    }

    fn issue_placeholder(&mut self, key: &K) -> Result<V, EngineError> {
        let Some(factory) = &self.placeholders else {
            return Err(InvariantError::UnresolvableReentry {
                key: InvariantError::key(key),
            }
            .into());
        };

        let placeholder = factory.create(key);
        let stand_in = placeholder.stand_in().clone();
        trace!(key = ?key, kind = ?placeholder.kind(), "placeholder issued");
        self.note_placeholder_issued();

        self.entries
            .insert(key.clone(), Entry::PlaceholderIssued(placeholder));
        Ok(stand_in)
    }

    #[inline]
    fn note_builder_invocation(&self) {
        #[cfg(feature = "metrics")]
        if let Some(parent) = &self.parent {
            parent.counters().inc_builder_invocation();
        }
    }

    #[inline]
    fn note_placeholder_issued(&self) {
        #[cfg(feature = "metrics")]
        if let Some(parent) = &self.parent {
            parent.counters().inc_placeholder_issued();
        }
    }
}

impl<K, V> Default for GenerationContext<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Clone + PartialEq + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for GenerationContext<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationContext")
            .field("entries", &self.entries.len())
            .field("attached", &self.parent.is_some())
            .field("has_builder", &self.builder.is_some())
            .field("has_placeholders", &self.placeholders.is_some())
            .finish()
    }
}

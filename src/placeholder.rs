//! Placeholders that break cycles during a generation pass.
//!
//! When a key is requested while its own derivation is still running, the
//! [`GenerationContext`](crate::context::GenerationContext) asks the configured
//! [`PlaceholderFactory`](crate::traits::PlaceholderFactory) for a
//! [`PlaceholderValue`] and hands its stand-in back to the caller instead of
//! recursing.
//!
//! ## Architecture
//!
//! ```text
//!   PlaceholderValue<V>
//!   ┌───────────────────────────────────────────────┐
//!   │ stand_in: V  ──(forwarding only)──┐           │
//!   │                                   ▼           │
//!   │ handle: PlaceholderHandle<V> ─▶ OnceLock<V>   │
//!   └───────────────────────────────────────────────┘
//!                                       ▲
//!            GenerationContext::add(key, value) resolves it
//! ```
//!
//! ## Strategies
//!
//! - **Forwarding**: the stand-in captures a clone of its own handle and reads
//!   [`PlaceholderHandle::result`] at *use* time, so self-referential values
//!   become fully usable once the pass records the real value.
//! - **Sentinel**: the stand-in ignores the handle and fails in a
//!   domain-specific way whenever it is exercised. The failure is deferred to
//!   first use instead of surfacing during derivation.
//!
//! ## Example Usage
//!
//! ```
//! use memograph::placeholder::{PlaceholderHandle, PlaceholderValue};
//!
//! #[derive(Clone)]
//! enum Node {
//!     Leaf(u32),
//!     Link(PlaceholderHandle<Node>),
//! }
//!
//! let placeholder = PlaceholderValue::forwarding(Node::Link);
//! assert!(!placeholder.is_resolved());
//! assert!(placeholder.result().is_err());
//!
//! match placeholder.stand_in() {
//!     Node::Link(handle) => assert!(!handle.is_resolved()),
//!     Node::Leaf(_) => unreachable!(),
//! }
//! ```
//!
//! ## Thread Safety
//!
//! Handles are `Send + Sync` when `V` is, so forwarding stand-ins may be
//! published into a shared [`Cache`](crate::cache::Cache) and read from any
//! thread.
//!
//! A forwarding stand-in that ends up inside its own resolved value forms an
//! `Arc` cycle. Cache entries are never evicted, so this is not reclaimed.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::error::InvariantError;

/// Which placeholder strategy produced a [`PlaceholderValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderKind {
    /// The stand-in defers to the resolved value.
    Forwarding,
    /// The stand-in is a terminal value that ignores resolution.
    Sentinel,
}

/// Write-once forwarding cell shared between a placeholder and its stand-in.
pub struct PlaceholderHandle<V> {
    cell: Arc<OnceLock<V>>,
}

impl<V> PlaceholderHandle<V> {
    fn new() -> Self {
        Self {
            cell: Arc::new(OnceLock::new()),
        }
    }

    /// Returns `true` once the owning context recorded the real value.
    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Borrows the resolved value, if any.
    #[inline]
    pub fn get(&self) -> Option<&V> {
        self.cell.get()
    }

    /// Returns `true` if both handles point at the same cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    /// Records the real value. Later calls are ignored and return `false`.
    pub(crate) fn resolve(&self, value: V) -> bool {
        self.cell.set(value).is_ok()
    }
}

impl<V: Clone> PlaceholderHandle<V> {
    /// Returns the resolved value.
    ///
    /// # Errors
    ///
    /// [`InvariantError::PlaceholderUnresolved`] while the key is still being
    /// derived.
    pub fn result(&self) -> Result<V, InvariantError> {
        self.cell
            .get()
            .cloned()
            .ok_or(InvariantError::PlaceholderUnresolved)
    }
}

impl<V> Clone for PlaceholderHandle<V> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<V> fmt::Debug for PlaceholderHandle<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaceholderHandle")
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

impl<V> PartialEq for PlaceholderHandle<V> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<V> Eq for PlaceholderHandle<V> {}

/// A stand-in for a key that is mid-derivation, paired with the cell that
/// receives the key's real value.
pub struct PlaceholderValue<V> {
    handle: PlaceholderHandle<V>,
    stand_in: V,
    kind: PlaceholderKind,
}

impl<V> PlaceholderValue<V> {
    /// Creates a forwarding placeholder. `make_stand_in` receives a handle to
    /// the placeholder's own cell and must consult it lazily.
    pub fn forwarding<F>(make_stand_in: F) -> Self
    where
        F: FnOnce(PlaceholderHandle<V>) -> V,
    {
        let handle = PlaceholderHandle::new();
        let stand_in = make_stand_in(handle.clone());
        Self {
            handle,
            stand_in,
            kind: PlaceholderKind::Forwarding,
        }
    }

    /// Creates a sentinel placeholder whose stand-in never looks at the
    /// resolved value.
    pub fn sentinel(stand_in: V) -> Self {
        Self {
            handle: PlaceholderHandle::new(),
            stand_in,
            kind: PlaceholderKind::Sentinel,
        }
    }

    /// The value handed to callers in place of the real one.
    #[inline]
    pub fn stand_in(&self) -> &V {
        &self.stand_in
    }

    #[inline]
    pub fn handle(&self) -> &PlaceholderHandle<V> {
        &self.handle
    }

    #[inline]
    pub fn kind(&self) -> PlaceholderKind {
        self.kind
    }

    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.handle.is_resolved()
    }

    pub(crate) fn resolve(&self, value: V) -> bool {
        self.handle.resolve(value)
    }
}

impl<V: Clone> PlaceholderValue<V> {
    /// Returns the resolved value; fails while unresolved.
    pub fn result(&self) -> Result<V, InvariantError> {
        self.handle.result()
    }
}

impl<V> fmt::Debug for PlaceholderValue<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaceholderValue")
            .field("kind", &self.kind)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

//! Error types for the memograph engine.
//!
//! ## Key Components
//!
//! - [`InvariantError`]: a defect in a collaborator's builder logic or in the
//!   way a generation pass was driven (committing while keys are in flight,
//!   unresolvable re-entry, foreign keys, ...). Always raised immediately.
//! - [`EngineError`]: everything `get_or_add` / `try_get_or_build` can fail
//!   with: invariant violations, domain derivation failures, and publication
//!   conflicts that could not be reconciled.
//! - [`DerivationError`]: the shared, identity-carrying form of a builder's
//!   domain error. Memoized failures are replayed as the *same* `Arc`.
//!
//! Commit conflicts inside a generation pass are not errors: they surface as
//! `Ok(false)` from
//! [`GenerationContext::try_commit_results`](crate::context::GenerationContext::try_commit_results).
//!
//! ## Example Usage
//!
//! ```
//! use memograph::error::{EngineError, InvariantError};
//!
//! let err = EngineError::from(InvariantError::ReadOnlyCache { key: "k".into() });
//! assert!(err.is_invariant());
//!
//! let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
//! let failure = EngineError::derivation(io);
//! assert!(failure.same_failure(&failure.clone()));
//! ```

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// A builder's domain failure, shared so that memoized failures can be
/// replayed by identity.
pub type DerivationError = Arc<dyn StdError + Send + Sync + 'static>;

// ---------------------------------------------------------------------------
// InvariantError
// ---------------------------------------------------------------------------

/// A violated engine invariant.
///
/// Each variant carries the offending key rendered with `Debug`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantError {
    /// A commit was attempted while a key's builder had not returned.
    #[error("cannot commit generation pass: key {key} is still pending")]
    PendingAtCommit { key: String },

    /// A commit was attempted while a placeholder issued for a key was never
    /// resolved.
    #[error("cannot commit generation pass: placeholder for key {key} was never resolved")]
    UnresolvedPlaceholder { key: String },

    /// A key was requested re-entrantly with no placeholder factory configured.
    #[error("re-entrant request for pending key {key} with no placeholder factory")]
    UnresolvableReentry { key: String },

    /// `get_or_add` was called on a cache without a builder factory.
    #[error("cache is read-only: no builder factory configured to derive key {key}")]
    ReadOnlyCache { key: String },

    /// The key does not belong to the cache's namespace.
    #[error("key {key} does not belong to this cache's namespace")]
    ForeignKey { key: String },

    /// A generation context with no parent cache was committed.
    #[error("generation context has no parent cache to commit into")]
    DetachedCommit,

    /// A placeholder's result was read before the placeholder was resolved.
    #[error("placeholder has not been resolved yet")]
    PlaceholderUnresolved,

    /// An indexed lookup found no resolved entry.
    #[error("no value recorded for key {key}")]
    KeyNotFound { key: String },

    /// A different value was recorded for a key that already has one.
    #[error("a different value is already recorded for key {key}")]
    DuplicateKey { key: String },
}

impl InvariantError {
    pub(crate) fn key<K: fmt::Debug>(key: &K) -> String {
        format!("{key:?}")
    }
}

// ---------------------------------------------------------------------------
// EngineError
// ---------------------------------------------------------------------------

/// Error returned by derivation-facing engine operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// A defect in builder logic or pass handling.
    #[error(transparent)]
    Invariant(#[from] InvariantError),

    /// The builder raised a domain error while producing a value.
    #[error("derivation failed: {0}")]
    Derivation(DerivationError),

    /// The pass derived a value that conflicts with one already published,
    /// and no published value exists for the requested key.
    #[error("generation pass for key {key} conflicts with published entries")]
    Conflict { key: String },
}

impl EngineError {
    /// Wraps a domain error raised by a builder.
    pub fn derivation<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Derivation(Arc::new(err))
    }

    /// Returns `true` for invariant violations.
    pub fn is_invariant(&self) -> bool {
        matches!(self, Self::Invariant(_))
    }

    /// Returns the invariant violation, if this is one.
    pub fn as_invariant(&self) -> Option<&InvariantError> {
        match self {
            Self::Invariant(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the shared domain failure, if this is one.
    pub fn as_derivation(&self) -> Option<&DerivationError> {
        match self {
            Self::Derivation(err) => Some(err),
            _ => None,
        }
    }

    /// Returns `true` when both errors wrap the identical derivation failure
    /// instance (not merely equal messages).
    pub fn same_failure(&self, other: &EngineError) -> bool {
        match (self, other) {
            (Self::Derivation(a), Self::Derivation(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Boom;

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("boom")
        }
    }

    impl StdError for Boom {}

    // -- InvariantError ---------------------------------------------------

    #[test]
    fn invariant_display_names_key() {
        let err = InvariantError::PendingAtCommit {
            key: InvariantError::key(&"Node"),
        };
        assert!(err.to_string().contains("\"Node\""));
        assert!(err.to_string().contains("pending"));
    }

    #[test]
    fn invariant_clone_and_eq() {
        let a = InvariantError::DetachedCommit;
        let b = a.clone();
        assert_eq!(a, b);
    }

    #[test]
    fn invariant_implements_std_error() {
        fn assert_error<T: StdError>() {}
        assert_error::<InvariantError>();
    }

    // -- EngineError ------------------------------------------------------

    #[test]
    fn invariant_converts_transparently() {
        let err: EngineError = InvariantError::DetachedCommit.into();
        assert!(err.is_invariant());
        assert_eq!(err.to_string(), InvariantError::DetachedCommit.to_string());
        assert_eq!(err.as_invariant(), Some(&InvariantError::DetachedCommit));
    }

    #[test]
    fn derivation_identity_survives_clone() {
        let err = EngineError::derivation(Boom);
        let copy = err.clone();
        assert!(err.same_failure(&copy));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn distinct_derivations_are_not_same_failure() {
        let a = EngineError::derivation(Boom);
        let b = EngineError::derivation(Boom);
        assert!(!a.same_failure(&b));
        assert!(!a.same_failure(&InvariantError::DetachedCommit.into()));
    }

    #[test]
    fn engine_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EngineError>();
    }
}

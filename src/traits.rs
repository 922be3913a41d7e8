//! # Collaborator Traits
//!
//! The engine never interprets keys or values. Everything domain-specific is
//! injected through the small capability traits in this module.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────┐   once per pass   ┌──────────────────────────┐
//!   │   BuilderFactory<K, V>   │ ────────────────▶ │      Builder<K, V>       │
//!   │   create_builder()       │                   │  build(&mut ctx, &K)     │
//!   └──────────────────────────┘                   └─────────────┬────────────┘
//!                                                                │ recurses via
//!                                                                ▼
//!                                                  ┌──────────────────────────┐
//!                                                  │ GenerationContext<K, V>  │
//!                                                  │  try_get_or_build / add  │
//!                                                  └─────────────┬────────────┘
//!                                                                │ on re-entry
//!                                                                ▼
//!                                                  ┌──────────────────────────┐
//!                                                  │ PlaceholderFactory<K, V> │
//!                                                  │  create(&K)              │
//!                                                  └──────────────────────────┘
//! ```
//!
//! ## Trait Summary
//!
//! | Trait                | Bound          | Purpose                                   |
//! |----------------------|----------------|-------------------------------------------|
//! | `Builder`            | -              | Derive one value, recursing through ctx   |
//! | `BuilderFactory`     | `Send + Sync`  | Fresh builder for each generation pass    |
//! | `PlaceholderFactory` | `Send + Sync`  | Stand-in for a key that is mid-derivation |
//! | `KeyScope`           | `Send + Sync`  | Namespace ownership check for keys        |
//!
//! Closures of the matching shape implement every trait, so most callers
//! never name them:
//!
//! ```
//! use memograph::builder::CacheBuilder;
//! use memograph::context::GenerationContext;
//! use memograph::traits::builder_fn;
//!
//! let cache = CacheBuilder::<u32, u64>::new()
//!     .builder_factory(|| {
//!         builder_fn(|ctx: &mut GenerationContext<u32, u64>, key: &u32| {
//!             if *key == 0 {
//!                 return Ok(1);
//!             }
//!             let prev = ctx.try_get_or_build(&(key - 1))?.unwrap_or(0);
//!             Ok(prev * u64::from(*key))
//!         })
//!     })
//!     .build();
//!
//! assert_eq!(cache.get_or_add(&5).unwrap(), 120);
//! assert_eq!(cache.len(), 6);
//! ```

use std::sync::Arc;

use crate::context::GenerationContext;
use crate::error::EngineError;
use crate::placeholder::PlaceholderValue;

/// Produces the value for one key.
///
/// The builder receives the pass's context at call time and may call
/// [`GenerationContext::try_get_or_build`] or [`GenerationContext::add`]
/// re-entrantly, including for `key` itself.
pub trait Builder<K, V> {
    fn build(&self, ctx: &mut GenerationContext<K, V>, key: &K) -> Result<V, EngineError>;
}

impl<K, V, F> Builder<K, V> for F
where
    F: Fn(&mut GenerationContext<K, V>, &K) -> Result<V, EngineError>,
{
    fn build(&self, ctx: &mut GenerationContext<K, V>, key: &K) -> Result<V, EngineError> {
        self(ctx, key)
    }
}

/// Boxes a closure as a shareable [`Builder`], pinning down its signature.
pub fn builder_fn<K, V, F>(f: F) -> Arc<dyn Builder<K, V>>
where
    F: Fn(&mut GenerationContext<K, V>, &K) -> Result<V, EngineError> + 'static,
{
    Arc::new(f)
}

/// Creates a fresh [`Builder`] for each generation pass.
pub trait BuilderFactory<K, V>: Send + Sync {
    fn create_builder(&self) -> Arc<dyn Builder<K, V>>;
}

impl<K, V, F> BuilderFactory<K, V> for F
where
    F: Fn() -> Arc<dyn Builder<K, V>> + Send + Sync,
{
    fn create_builder(&self) -> Arc<dyn Builder<K, V>> {
        self()
    }
}

/// Produces a stand-in for a key that is requested while already pending.
///
/// Implementations choose between a forwarding stand-in
/// ([`PlaceholderValue::forwarding`]) and a sentinel
/// ([`PlaceholderValue::sentinel`]).
pub trait PlaceholderFactory<K, V>: Send + Sync {
    fn create(&self, key: &K) -> PlaceholderValue<V>;
}

impl<K, V, F> PlaceholderFactory<K, V> for F
where
    F: Fn(&K) -> PlaceholderValue<V> + Send + Sync,
{
    fn create(&self, key: &K) -> PlaceholderValue<V> {
        self(key)
    }
}

/// Decides whether a key was minted in a cache's namespace.
pub trait KeyScope<K>: Send + Sync {
    fn owns(&self, key: &K) -> bool;
}

impl<K, F> KeyScope<K> for F
where
    F: Fn(&K) -> bool + Send + Sync,
{
    fn owns(&self, key: &K) -> bool {
        self(key)
    }
}

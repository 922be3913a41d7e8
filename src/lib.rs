//! memograph: a memoizing build engine for cyclic graphs of derived values.
//!
//! A [`Cache`](cache::Cache) derives values on demand through a
//! caller-supplied [`Builder`](traits::Builder). Each miss runs one
//! generation pass in a private [`GenerationContext`](context::GenerationContext):
//! the builder may recurse into other keys, including the key being built, in
//! which case a [`PlaceholderValue`](placeholder::PlaceholderValue) stands in
//! until the real value is recorded. The finished pass is published to the
//! cache atomically.
//!
//! See `DESIGN.md` for internal architecture and invariants.

pub mod builder;
pub mod cache;
pub mod context;
pub mod error;
pub mod placeholder;
pub mod registry;
pub mod traits;

#[cfg(feature = "metrics")]
pub mod metrics;

pub mod prelude;

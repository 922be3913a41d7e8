pub use crate::builder::CacheBuilder;
pub use crate::cache::Cache;
pub use crate::context::GenerationContext;
pub use crate::error::{DerivationError, EngineError, InvariantError};
#[cfg(feature = "metrics")]
pub use crate::metrics::{EngineMetricsSnapshot, MetricsSnapshotProvider};
pub use crate::placeholder::{PlaceholderHandle, PlaceholderKind, PlaceholderValue};
pub use crate::registry::ScopedCacheRegistry;
pub use crate::traits::{Builder, BuilderFactory, KeyScope, PlaceholderFactory, builder_fn};

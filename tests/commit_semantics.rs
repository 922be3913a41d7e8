// ==============================================
// GENERATION PASS COMMIT TESTS (integration)
// ==============================================
//
// Publication of a generation pass into its parent cache: all-or-nothing on
// conflict, idempotent after success, and refused while any key is in flight.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use memograph::prelude::*;

fn seeded_cache() -> Cache<&'static str, u32> {
    let cache = CacheBuilder::new().build();
    cache.set("published", 1).unwrap();
    cache
}

// ==============================================
// Atomicity
// ==============================================

mod atomicity {
    use super::*;

    #[test]
    fn conflict_leaves_cache_untouched() {
        let cache = seeded_cache();
        let before = cache.len();

        let mut ctx = cache.create_context();
        ctx.add("fresh-a", 10).unwrap();
        ctx.add("fresh-b", 11).unwrap();
        ctx.add("published", 2).unwrap();

        assert_eq!(ctx.try_commit_results(), Ok(false));
        assert_eq!(cache.len(), before);
        assert!(!cache.contains(&"fresh-a"));
        assert!(!cache.contains(&"fresh-b"));
        assert_eq!(cache.get(&"published").unwrap(), Some(1));
    }

    #[test]
    fn conflicting_pass_can_be_discarded_and_retried() {
        let cache = seeded_cache();

        let mut ctx = cache.create_context();
        ctx.add("fresh", 10).unwrap();
        ctx.add("published", 2).unwrap();
        assert_eq!(ctx.try_commit_results(), Ok(false));

        ctx.clear();
        ctx.add("fresh", 10).unwrap();
        ctx.add("published", 1).unwrap();
        assert_eq!(ctx.try_commit_results(), Ok(true));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn equal_values_are_not_conflicts() {
        let cache = seeded_cache();
        let mut ctx = cache.create_context();
        ctx.add("published", 1).unwrap();
        ctx.add("fresh", 3).unwrap();

        assert_eq!(ctx.try_commit_results(), Ok(true));
        assert_eq!(cache.len(), 2);
    }
}

// ==============================================
// Idempotence
// ==============================================

mod idempotence {
    use super::*;

    #[test]
    fn second_commit_returns_true_and_inserts_nothing() {
        let cache = seeded_cache();
        let mut ctx = cache.create_context();
        ctx.add("a", 1).unwrap();
        ctx.add("b", 2).unwrap();

        assert_eq!(ctx.try_commit_results(), Ok(true));
        let count = cache.len();
        assert_eq!(ctx.try_commit_results(), Ok(true));
        assert_eq!(cache.len(), count);
    }

    #[test]
    fn empty_attached_context_commits_trivially() {
        let cache = seeded_cache();
        let mut ctx = cache.create_context();
        assert_eq!(ctx.try_commit_results(), Ok(true));
        assert_eq!(cache.len(), 1);
    }
}

// ==============================================
// In-flight keys block commit
// ==============================================

mod in_flight {
    use super::*;

    #[test]
    fn pending_key_is_an_invariant_violation() {
        let cache = seeded_cache();
        let mut ctx = cache.create_context();
        ctx.add("done", 5).unwrap();
        assert_eq!(ctx.try_get_or_build(&"probe").unwrap(), None);

        let err = ctx.try_commit_results().unwrap_err();
        assert!(matches!(err, InvariantError::PendingAtCommit { .. }));
        assert!(!cache.contains(&"done"));

        // Once the probed key is recorded the pass is complete.
        ctx.add("probe", 6).unwrap();
        assert_eq!(ctx.try_commit_results(), Ok(true));
        assert!(cache.contains(&"probe"));
    }

    #[test]
    fn commit_from_inside_a_builder_is_refused() {
        let observed = Arc::new(parking_lot::Mutex::new(None));
        let slot = Arc::clone(&observed);
        let cache = CacheBuilder::new()
            .builder(move |ctx: &mut GenerationContext<u32, u32>, key: &u32| {
                *slot.lock() = Some(ctx.try_commit_results());
                Ok(*key)
            })
            .build();

        assert_eq!(cache.get_or_add(&9).unwrap(), 9);
        let result = observed.lock().take().unwrap();
        assert!(matches!(result, Err(InvariantError::PendingAtCommit { .. })));
    }

    #[test]
    fn empty_detached_context_cannot_commit() {
        let mut ctx: GenerationContext<u32, u32> = GenerationContext::new();
        assert_eq!(
            ctx.try_commit_results(),
            Err(InvariantError::DetachedCommit)
        );
    }

    #[test]
    fn detached_context_with_values_cannot_commit() {
        let mut ctx: GenerationContext<u32, u32> = GenerationContext::new();
        ctx.add(1, 1).unwrap();
        assert_eq!(
            ctx.try_commit_results(),
            Err(InvariantError::DetachedCommit)
        );
    }
}

// ==============================================
// Failure memoization
// ==============================================

mod failure_policy {
    use super::*;

    #[derive(Debug)]
    struct NoShape(&'static str);

    impl std::fmt::Display for NoShape {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "no shape for {}", self.0)
        }
    }

    impl std::error::Error for NoShape {}

    fn failing(cache_failures: bool) -> (Cache<&'static str, u32>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let cache = CacheBuilder::new()
            .builder(
                move |_: &mut GenerationContext<&'static str, u32>, key: &&'static str| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(EngineError::derivation(NoShape(*key)))
                },
            )
            .cache_failures(cache_failures)
            .build();
        (cache, calls)
    }

    #[test]
    fn uncached_failures_are_distinct_instances() {
        let (cache, calls) = failing(false);
        let first = cache.get_or_add(&"int").unwrap_err();
        let second = cache.get_or_add(&"int").unwrap_err();

        assert!(!first.same_failure(&second));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(first.to_string(), "derivation failed: no shape for int");
    }

    #[test]
    fn cached_failures_are_the_same_instance() {
        let (cache, calls) = failing(true);
        let first = cache.get_or_add(&"int").unwrap_err();
        let second = cache.get_or_add(&"int").unwrap_err();

        assert!(first.same_failure(&second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn invariant_violations_are_never_memoized() {
        let cache = CacheBuilder::new()
            .builder(|ctx: &mut GenerationContext<u32, u32>, key: &u32| {
                // Re-entry without a placeholder factory.
                ctx.try_get_or_build(key)?;
                Ok(0)
            })
            .cache_failures(true)
            .build();

        for _ in 0..2 {
            let err = cache.get_or_add(&1).unwrap_err();
            assert!(matches!(
                err,
                EngineError::Invariant(InvariantError::UnresolvableReentry { .. })
            ));
        }
    }
}

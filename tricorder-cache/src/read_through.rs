//! Deduplicated read-through lookups.
//!
//! [`ReadThrough`] ties the [`Interlock`] and the [`TtlMap`] to a
//! [`Fetcher`]: per key, one leader fetches while everyone else waits, and
//! both successes and failures are remembered for their TTL.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use tricorder_core::constants::{NEGATIVE_CACHE_TTL_SECS, TX_CACHE_MAX_AGE_SECS};
use tricorder_core::error::Result;
use tricorder_core::traits::Fetcher;

use crate::interlock::Interlock;
use crate::ttl_map::{CacheStats, Cached, TtlMap};

/// TTLs applied to fetch outcomes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CachePolicy {
    /// How long a successful fetch is served from cache
    pub positive_ttl: Duration,
    /// How long a failed fetch suppresses new attempts
    pub negative_ttl: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            positive_ttl: Duration::from_secs(TX_CACHE_MAX_AGE_SECS),
            negative_ttl: Duration::from_secs(NEGATIVE_CACHE_TTL_SECS),
        }
    }
}

/// Read-through cache in front of a [`Fetcher`].
///
/// `get_or_fetch` answers in three ways:
///
/// - `Ok(Some(value))`: the value is authoritative, fresh or cached.
/// - `Ok(None)`: an earlier fetch for this key failed and is still inside its
///   negative window. Nothing was fetched.
/// - `Err(e)`: this call fetched and the fetch failed just now.
///
/// Only the caller that triggered a failing fetch sees its error; callers
/// that waited on it get `Ok(None)`.
pub struct ReadThrough<F: Fetcher> {
    fetcher: F,
    cache: Arc<TtlMap<F::Value>>,
    interlock: Arc<Interlock>,
    policy: CachePolicy,
}

impl<F: Fetcher> ReadThrough<F> {
    /// Creates a read-through cache with the default policy.
    pub fn new(fetcher: F) -> Self {
        Self::with_policy(fetcher, CachePolicy::default())
    }

    /// Creates a read-through cache with a custom policy.
    pub fn with_policy(fetcher: F, policy: CachePolicy) -> Self {
        Self::from_parts(
            fetcher,
            Arc::new(TtlMap::new()),
            Arc::new(Interlock::new()),
            policy,
        )
    }

    /// Assembles a read-through cache from existing parts.
    pub fn from_parts(
        fetcher: F,
        cache: Arc<TtlMap<F::Value>>,
        interlock: Arc<Interlock>,
        policy: CachePolicy,
    ) -> Self {
        Self {
            fetcher,
            cache,
            interlock,
            policy,
        }
    }

    /// Returns the cached outcome for `key`, fetching it at most once per
    /// outstanding key.
    ///
    /// Only the round leader calls the fetcher. A follower that wakes to an
    /// empty cache (the leader was cancelled, or the entry already expired)
    /// queues for the next round instead of fetching on its own.
    #[instrument(skip(self))]
    pub async fn get_or_fetch(&self, key: &str) -> Result<Option<F::Value>> {
        let mut rounds: u32 = 0;

        loop {
            rounds += 1;

            // Released on every exit path, after the cache write below
            let round = self.interlock.acquire(key).await;

            if let Some(cached) = self.cache.get(key) {
                debug!(
                    leader = round.is_leader(),
                    positive = cached.is_positive(),
                    "Served from cache"
                );
                return Ok(cached.into_value());
            }

            if !round.is_leader() {
                debug!(rounds, "Cache empty after wait, requeueing");
                continue;
            }

            debug!(rounds, "Cache miss, fetching");

            return match self.fetcher.fetch(key).await {
                Ok(value) => {
                    self.cache
                        .put(key, Cached::Positive(value.clone()), self.policy.positive_ttl);
                    info!(rounds, "Fetched and cached");
                    Ok(Some(value))
                }
                Err(err) => {
                    warn!(rounds, error = %err, "Fetch failed, caching negative result");
                    self.cache.put(key, Cached::Negative, self.policy.negative_ttl);
                    Err(err)
                }
            };
        }
    }

    /// Drops any cached outcome for `key` so the next lookup fetches again.
    pub fn invalidate(&self, key: &str) {
        self.cache.remove(key);
    }

    /// Shared cache handle, for the sweeper and for stats.
    pub fn cache(&self) -> &Arc<TtlMap<F::Value>> {
        &self.cache
    }

    /// Shared interlock handle.
    pub fn interlock(&self) -> &Arc<Interlock> {
        &self.interlock
    }

    /// Underlying fetcher.
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// TTL policy in effect.
    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Snapshot of cache and interlock occupancy.
    pub fn stats(&self) -> ReadThroughStats {
        ReadThroughStats {
            cache: self.cache.stats(),
            in_flight: self.interlock.in_flight(),
        }
    }
}

/// Occupancy snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadThroughStats {
    /// Cache entry counts
    pub cache: CacheStats,
    /// Keys with a fetch in flight
    pub in_flight: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use futures::future::join_all;
    use tricorder_core::error::TricorderError;

    /// Counts calls; fails the first `failures` of them.
    struct Scripted {
        calls: AtomicUsize,
        failures: usize,
        delay: Duration,
    }

    impl Scripted {
        fn ok(delay: Duration) -> Self {
            Self::failing(0, delay)
        }

        fn failing(failures: usize, delay: Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                failures,
                delay,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for Scripted {
        type Value = String;

        async fn fetch(&self, key: &str) -> Result<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if call < self.failures {
                return Err(TricorderError::HttpError(format!("503 for {}", key)));
            }
            Ok(format!("tx:{}", key))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_one_fetch() {
        let reader = Arc::new(ReadThrough::new(Scripted::ok(Duration::from_millis(50))));

        let results = join_all((0..5).map(|_| {
            let reader = reader.clone();
            tokio::spawn(async move { reader.get_or_fetch("sigA").await })
        }))
        .await;

        for result in results {
            let value = result.unwrap().unwrap();
            assert_eq!(value.as_deref(), Some("tx:sigA"));
        }
        assert_eq!(reader.fetcher().calls(), 1);
        assert_eq!(reader.interlock().in_flight(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_many_callers_many_keys() {
        let reader = Arc::new(ReadThrough::new(Scripted::ok(Duration::from_millis(10))));

        let results = join_all((0..64).map(|i| {
            let reader = reader.clone();
            let key = format!("sig{}", i % 4);
            tokio::spawn(async move { (key.clone(), reader.get_or_fetch(&key).await) })
        }))
        .await;

        for result in results {
            let (key, value) = result.unwrap();
            assert_eq!(value.unwrap(), Some(format!("tx:{}", key)));
        }
        assert_eq!(reader.fetcher().calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_positive_result_cached_for_ttl() {
        let policy = CachePolicy {
            positive_ttl: Duration::from_secs(60),
            negative_ttl: Duration::from_secs(10),
        };
        let reader = ReadThrough::with_policy(Scripted::ok(Duration::ZERO), policy);

        assert_eq!(reader.get_or_fetch("sigA").await.unwrap().as_deref(), Some("tx:sigA"));
        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(reader.get_or_fetch("sigA").await.unwrap().as_deref(), Some("tx:sigA"));
        assert_eq!(reader.fetcher().calls(), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        reader.get_or_fetch("sigA").await.unwrap();
        assert_eq!(reader.fetcher().calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_negative_caching() {
        let policy = CachePolicy {
            positive_ttl: Duration::from_secs(60),
            negative_ttl: Duration::from_secs(30),
        };
        let reader = ReadThrough::with_policy(Scripted::failing(1, Duration::ZERO), policy);

        // Fresh failure surfaces the error
        let err = reader.get_or_fetch("sigA").await.unwrap_err();
        assert!(matches!(err, TricorderError::HttpError(_)));

        // Inside the negative window: muted, no new fetch
        tokio::time::advance(Duration::from_secs(29)).await;
        assert_eq!(reader.get_or_fetch("sigA").await.unwrap(), None);
        assert_eq!(reader.fetcher().calls(), 1);

        // Window elapsed: fetched again
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(
            reader.get_or_fetch("sigA").await.unwrap().as_deref(),
            Some("tx:sigA")
        );
        assert_eq!(reader.fetcher().calls(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_followers_of_failed_fetch_get_muted_signal() {
        let reader = Arc::new(ReadThrough::new(Scripted::failing(
            usize::MAX,
            Duration::from_millis(50),
        )));

        let results = join_all((0..5).map(|_| {
            let reader = reader.clone();
            tokio::spawn(async move { reader.get_or_fetch("sigA").await })
        }))
        .await;

        let mut errors = 0;
        let mut muted = 0;
        for result in results {
            match result.unwrap() {
                Err(_) => errors += 1,
                Ok(None) => muted += 1,
                Ok(Some(v)) => panic!("unexpected value {}", v),
            }
        }

        assert_eq!(errors, 1);
        assert_eq!(muted, 4);
        assert_eq!(reader.fetcher().calls(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cancelled_leader_hands_off_to_one_follower() {
        let reader = Arc::new(ReadThrough::new(Scripted::ok(Duration::from_millis(200))));

        let leader = {
            let reader = reader.clone();
            tokio::spawn(async move { reader.get_or_fetch("sigA").await })
        };
        while reader.fetcher().calls() == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        let followers: Vec<_> = (0..8)
            .map(|_| {
                let reader = reader.clone();
                tokio::spawn(async move { reader.get_or_fetch("sigA").await })
            })
            .collect();
        tokio::time::sleep(Duration::from_millis(20)).await;

        leader.abort();
        assert!(leader.await.unwrap_err().is_cancelled());

        for result in join_all(followers).await {
            let value = result.unwrap().unwrap();
            assert_eq!(value.as_deref(), Some("tx:sigA"));
        }

        // The aborted fetch plus exactly one replacement
        assert_eq!(reader.fetcher().calls(), 2);
        assert_eq!(reader.interlock().in_flight(), 0);
    }

    #[tokio::test]
    async fn test_empty_round_requeues_follower_as_leader() {
        let cache = Arc::new(TtlMap::new());
        let interlock = Arc::new(Interlock::new());
        let reader = ReadThrough::from_parts(
            Scripted::ok(Duration::ZERO),
            cache.clone(),
            interlock.clone(),
            CachePolicy::default(),
        );

        // Another round is active and finishes without storing anything
        let ticket = interlock.wait_or_start("sigA").await;
        let handle = {
            let interlock = interlock.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                interlock.clear_wait("sigA", ticket);
            })
        };

        let value = reader.get_or_fetch("sigA").await.unwrap();
        handle.await.unwrap();

        assert_eq!(value.as_deref(), Some("tx:sigA"));
        assert_eq!(reader.fetcher().calls(), 1);
        assert!(!interlock.is_in_flight("sigA"));
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let reader = ReadThrough::new(Scripted::ok(Duration::ZERO));

        reader.get_or_fetch("sigA").await.unwrap();
        reader.invalidate("sigA");
        reader.get_or_fetch("sigA").await.unwrap();

        assert_eq!(reader.fetcher().calls(), 2);
    }

    #[tokio::test]
    async fn test_stats() {
        let reader = ReadThrough::new(Scripted::failing(1, Duration::ZERO));

        let _ = reader.get_or_fetch("sigA").await;
        reader.get_or_fetch("sigB").await.unwrap();

        let stats = reader.stats();
        assert_eq!(stats.in_flight, 0);
        assert_eq!(stats.cache.positive_entries, 1);
        assert_eq!(stats.cache.negative_entries, 1);
    }

    #[tokio::test]
    async fn test_shared_parts() {
        let cache = Arc::new(TtlMap::new());
        let interlock = Arc::new(Interlock::new());
        cache.put_positive("sigA", "preloaded".to_string(), Duration::from_secs(60));

        let reader = ReadThrough::from_parts(
            Scripted::ok(Duration::ZERO),
            cache.clone(),
            interlock,
            CachePolicy::default(),
        );

        assert_eq!(
            reader.get_or_fetch("sigA").await.unwrap().as_deref(),
            Some("preloaded")
        );
        assert_eq!(reader.fetcher().calls(), 0);
        assert!(Arc::ptr_eq(reader.cache(), &cache));
    }
}

//! Common traits for Tricorder.
//!
//! The cache core only ever talks to the backend through [`Fetcher`], so the
//! RPC client, test doubles and any future backend are interchangeable.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

// ═══════════════════════════════════════════════════════════════════════════════
// FETCHER TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// The slow, rate-limited, occasionally failing lookup behind the cache.
///
/// Implementations own their retry, backoff, rate-limiting and failover
/// policy. Callers treat any `Err` as "fetch failed" and do not look at the
/// variant.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Payload produced by a successful fetch.
    type Value: Clone + Send + Sync + 'static;

    /// Fetches the value for `key`.
    async fn fetch(&self, key: &str) -> Result<Self::Value>;
}

#[async_trait]
impl<F: Fetcher + ?Sized> Fetcher for Arc<F> {
    type Value = F::Value;

    async fn fetch(&self, key: &str) -> Result<Self::Value> {
        (**self).fetch(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TricorderError;

    struct Echo;

    #[async_trait]
    impl Fetcher for Echo {
        type Value = String;

        async fn fetch(&self, key: &str) -> Result<String> {
            if key.is_empty() {
                return Err(TricorderError::ValidationError("empty key".into()));
            }
            Ok(key.to_uppercase())
        }
    }

    #[tokio::test]
    async fn test_fetcher_through_arc() {
        let fetcher = Arc::new(Echo);
        assert_eq!(fetcher.fetch("sig").await.unwrap(), "SIG");
        assert!(fetcher.fetch("").await.is_err());
    }
}

//! Duplicate suppression for external callbacks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::Result;

/// Key/value store with atomic set-if-absent and expiry.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Stores a marker for `key` unless an unexpired one exists.
    ///
    /// Returns true if this call created the marker.
    async fn set_if_absent(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Deletes the marker for `key`, if any.
    async fn remove(&self, key: &str) -> Result<()>;

    /// Deletes every expired marker. Returns how many were removed.
    async fn purge_expired(&self) -> Result<u64>;
}

#[async_trait]
impl<T: IdempotencyStore + ?Sized> IdempotencyStore for Arc<T> {
    async fn set_if_absent(&self, key: &str, ttl: Duration) -> Result<bool> {
        (**self).set_if_absent(key, ttl).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key).await
    }

    async fn purge_expired(&self) -> Result<u64> {
        (**self).purge_expired().await
    }
}

fn marker_key(key: &str) -> String {
    format!("idempotency:{key}")
}

/// Claims the right to process a caller-supplied token exactly once per TTL.
///
/// Store failures fail open: the caller proceeds as if the token were new.
/// Losing a genuine payment callback is worse than processing a duplicate.
#[derive(Clone)]
pub struct IdempotencyGuard<S> {
    store: S,
}

impl<S: IdempotencyStore> IdempotencyGuard<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns true for the first caller with `key` within `ttl`, false for
    /// every later caller until the marker expires.
    pub async fn ensure(&self, key: &str, ttl: Duration) -> bool {
        match self.store.set_if_absent(&marker_key(key), ttl).await {
            Ok(true) => true,
            Ok(false) => {
                metrics::counter!("payment_idempotency_duplicates_total").increment(1);
                tracing::info!(idempotency_key = %key, "duplicate request detected");
                false
            }
            Err(e) => {
                metrics::counter!("payment_idempotency_fail_open_total").increment(1);
                tracing::error!(
                    idempotency_key = %key,
                    error = %e,
                    "idempotency check failed, proceeding as first request"
                );
                true
            }
        }
    }

    /// Drops a claimed key so a retry of a failed operation is not mistaken
    /// for a replay.
    pub async fn release(&self, key: &str) {
        if let Err(e) = self.store.remove(&marker_key(key)).await {
            tracing::warn!(
                idempotency_key = %key,
                error = %e,
                "failed to release idempotency key, it will expire on its own"
            );
        }
    }
}

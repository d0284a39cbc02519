//! Per-payment mutual exclusion built on expiring leases.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::PaymentId;
use futures_util::FutureExt;
use thiserror::Error;
use tokio::time::Instant;
use uuid::Uuid;

use crate::StoreError;

/// Identifies one acquisition of a lock. Only its holder may release it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockToken(Uuid);

impl LockToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for LockToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Backend that can atomically take and give back a keyed lease.
#[async_trait]
pub trait LockManager: Send + Sync {
    /// Takes the lease for `key` unless another holder has an unexpired one.
    ///
    /// Returns true if `holder` now owns the lease.
    async fn try_acquire(
        &self,
        key: &str,
        holder: LockToken,
        lease: Duration,
    ) -> Result<bool, StoreError>;

    /// Gives the lease back if `holder` still owns it.
    ///
    /// Returns false when the lease had expired or was taken over, in which
    /// case nothing is removed.
    async fn release(&self, key: &str, holder: LockToken) -> Result<bool, StoreError>;
}

#[async_trait]
impl<T: LockManager + ?Sized> LockManager for Arc<T> {
    async fn try_acquire(
        &self,
        key: &str,
        holder: LockToken,
        lease: Duration,
    ) -> Result<bool, StoreError> {
        (**self).try_acquire(key, holder, lease).await
    }

    async fn release(&self, key: &str, holder: LockToken) -> Result<bool, StoreError> {
        (**self).release(key, holder).await
    }
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error("Timed out after {waited:?} waiting for the lock on payment {payment_id}")]
    Timeout {
        payment_id: PaymentId,
        waited: Duration,
    },

    #[error("Lock store error: {0}")]
    Store(#[from] StoreError),
}

/// Timing for [`PaymentLockCoordinator`].
#[derive(Debug, Clone, Copy)]
pub struct LockSettings {
    /// How long to keep trying before giving up.
    pub wait: Duration,
    /// How long an acquired lease lives without being released.
    pub lease: Duration,
    /// Pause between acquisition attempts.
    pub retry_interval: Duration,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            wait: Duration::from_secs(5),
            lease: Duration::from_secs(30),
            retry_interval: Duration::from_millis(25),
        }
    }
}

/// Lock key for a payment.
pub fn lock_key(payment_id: PaymentId) -> String {
    format!("lock:payment:{payment_id}")
}

/// Runs closures while holding the lock of one payment.
///
/// The lease is not renewed, so critical sections must finish well within
/// `LockSettings::lease`. If the process dies or the future is dropped
/// mid-section, the lease simply expires.
#[derive(Clone)]
pub struct PaymentLockCoordinator<L> {
    locks: L,
    settings: LockSettings,
}

impl<L: LockManager> PaymentLockCoordinator<L> {
    pub fn new(locks: L, settings: LockSettings) -> Self {
        Self { locks, settings }
    }

    pub fn settings(&self) -> LockSettings {
        self.settings
    }

    /// Acquires the payment's lock, runs `f`, then releases the lock.
    ///
    /// If the lock cannot be taken within `settings.wait`, returns
    /// `LockError::Timeout` without calling `f`. The lock is released whether
    /// `f` succeeds, fails or panics; a panic is resumed after release.
    pub async fn with_lock<T, E, F, Fut>(&self, payment_id: PaymentId, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<LockError>,
    {
        let key = lock_key(payment_id);
        let token = self.acquire(payment_id, &key).await?;

        let outcome = AssertUnwindSafe(f()).catch_unwind().await;
        self.release(payment_id, &key, token).await;

        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    async fn acquire(&self, payment_id: PaymentId, key: &str) -> Result<LockToken, LockError> {
        let token = LockToken::new();
        let started = Instant::now();
        let deadline = started + self.settings.wait;

        loop {
            if self
                .locks
                .try_acquire(key, token, self.settings.lease)
                .await?
            {
                metrics::histogram!("payment_lock_wait_seconds")
                    .record(started.elapsed().as_secs_f64());
                tracing::debug!(%payment_id, "payment lock acquired");
                return Ok(token);
            }

            let now = Instant::now();
            if now >= deadline {
                metrics::counter!("payment_lock_timeouts_total").increment(1);
                tracing::warn!(
                    %payment_id,
                    waited_ms = self.settings.wait.as_millis() as u64,
                    "timed out waiting for payment lock"
                );
                return Err(LockError::Timeout {
                    payment_id,
                    waited: self.settings.wait,
                });
            }
            tokio::time::sleep(self.settings.retry_interval.min(deadline - now)).await;
        }
    }

    async fn release(&self, payment_id: PaymentId, key: &str, token: LockToken) {
        match self.locks.release(key, token).await {
            Ok(true) => tracing::debug!(%payment_id, "payment lock released"),
            Ok(false) => tracing::warn!(
                %payment_id,
                "payment lock lease expired before release"
            ),
            Err(e) => tracing::error!(
                %payment_id,
                error = %e,
                "failed to release payment lock, waiting for lease expiry"
            ),
        }
    }
}

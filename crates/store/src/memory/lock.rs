use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::{LockManager, LockToken, StoreError};

#[derive(Debug, Clone, Copy)]
struct Lease {
    holder: LockToken,
    expires_at: Instant,
}

/// Process-local lease table.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLockManager {
    leases: Arc<Mutex<HashMap<String, Lease>>>,
}

impl InMemoryLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `key` has an unexpired lease.
    pub fn is_locked(&self, key: &str) -> bool {
        let leases = self.leases.lock().unwrap_or_else(|e| e.into_inner());
        leases
            .get(key)
            .is_some_and(|lease| lease.expires_at > Instant::now())
    }
}

#[async_trait]
impl LockManager for InMemoryLockManager {
    async fn try_acquire(
        &self,
        key: &str,
        holder: LockToken,
        lease: Duration,
    ) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut leases = self.leases.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(current) = leases.get(key)
            && current.expires_at > now
        {
            return Ok(false);
        }

        leases.insert(
            key.to_string(),
            Lease {
                holder,
                expires_at: now + lease,
            },
        );
        Ok(true)
    }

    async fn release(&self, key: &str, holder: LockToken) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut leases = self.leases.lock().unwrap_or_else(|e| e.into_inner());

        match leases.get(key) {
            Some(lease) if lease.holder == holder && lease.expires_at > now => {
                leases.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

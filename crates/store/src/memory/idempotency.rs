use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::{IdempotencyStore, Result};

/// Process-local marker table with expiry.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIdempotencyStore {
    markers: Arc<Mutex<HashMap<String, Instant>>>,
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of markers held, expired ones included until swept.
    pub fn marker_count(&self) -> usize {
        self.markers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Drops expired markers. Returns how many were removed.
fn sweep(markers: &mut HashMap<String, Instant>, now: Instant) -> u64 {
    let before = markers.len();
    markers.retain(|_, expires_at| *expires_at > now);
    (before - markers.len()) as u64
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn set_if_absent(&self, key: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        let mut markers = self.markers.lock().unwrap_or_else(|e| e.into_inner());

        sweep(&mut markers, now);
        if markers.contains_key(key) {
            return Ok(false);
        }

        markers.insert(key.to_string(), now + ttl);
        Ok(true)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut markers = self.markers.lock().unwrap_or_else(|e| e.into_inner());
        markers.remove(key);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64> {
        let mut markers = self.markers.lock().unwrap_or_else(|e| e.into_inner());
        Ok(sweep(&mut markers, Instant::now()))
    }
}

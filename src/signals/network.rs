use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

/// Read-mostly total-network-user counter, owned by an external aggregator
/// (spec §5 "Shared resources", §6 "Network-size counter").
///
/// Stale reads are acceptable for rate composition within the configured
/// freshness window; the engine never blocks session-open on a fresh read.
#[async_trait]
pub trait NetworkSizeProvider: Send + Sync {
    /// Current best-known total user count and the unix timestamp it was
    /// observed at, so callers can apply their own staleness bound.
    async fn total_users(&self) -> (u64, u64);
}

/// A provider backed by an in-process counter updated by a separate
/// aggregator task. Suited for tests and for embedding the engine next to a
/// trusted in-process aggregator.
pub struct InMemoryNetworkSize {
    total_users: Arc<AtomicU64>,
    observed_at: Arc<AtomicU64>,
}

impl InMemoryNetworkSize {
    pub fn new(initial_total_users: u64, now: u64) -> Self {
        InMemoryNetworkSize {
            total_users: Arc::new(AtomicU64::new(initial_total_users)),
            observed_at: Arc::new(AtomicU64::new(now)),
        }
    }

    pub fn set(&self, total_users: u64, now: u64) {
        self.total_users.store(total_users, Ordering::SeqCst);
        self.observed_at.store(now, Ordering::SeqCst);
    }
}

#[async_trait]
impl NetworkSizeProvider for InMemoryNetworkSize {
    async fn total_users(&self) -> (u64, u64) {
        (
            self.total_users.load(Ordering::SeqCst),
            self.observed_at.load(Ordering::SeqCst),
        )
    }
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

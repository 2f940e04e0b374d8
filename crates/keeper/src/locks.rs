use alloy::primitives::U256;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per pool id. Holding the guard serialises the
/// read-decide-submit sequence for that pool inside this process.
#[derive(Clone, Default)]
pub struct PoolLocks {
    locks: Arc<DashMap<U256, Arc<Mutex<()>>>>,
}

impl PoolLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, pool_id: U256) -> OwnedMutexGuard<()> {
        let lock = self.locks.entry(pool_id).or_default().clone();
        lock.lock_owned().await
    }
}

//! Per-instance execution locks

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// (user, bot, symbol)
pub type InstanceKey = (i64, i64, String);

/// Serializes entry, exit and close-all for one strategy instance within this process.
/// Cross-process exclusion comes from the store's transactional insert and the run lock.
#[derive(Clone, Default)]
pub struct InstanceLocks {
    locks: Arc<DashMap<InstanceKey, Arc<Mutex<()>>>>,
}

impl InstanceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, user_id: i64, bot_id: i64, symbol: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry((user_id, bot_id, symbol.to_string()))
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_instance_is_serialized() {
        let locks = InstanceLocks::new();
        let guard = locks.acquire(1, 2, "BTCUSDT").await;

        let contender = locks.clone();
        let waiting = tokio::spawn(async move {
            let _guard = contender.acquire(1, 2, "BTCUSDT").await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        // A different instance is not blocked
        let _other = locks.acquire(1, 3, "BTCUSDT").await;
        assert_eq!(locks.len(), 2);

        drop(guard);
        waiting.await.unwrap();
    }
}

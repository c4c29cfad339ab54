//! 内存槽位锁：串行化同一地图 id 的锁检查与提交。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time;

/// 等待超时仍未获得槽位锁。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotBusy;

/// 按地图 id 管理的异步互斥锁。
#[derive(Debug, Default)]
pub struct SlotLocks {
    locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl SlotLocks {
    /// 创建新的槽位锁管理器实例。
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// 在给定超时时间内获取槽位锁。
    pub async fn lock_slot_with_timeout(
        &self,
        map_id: i64,
        timeout: Duration,
    ) -> Result<OwnedMutexGuard<()>, SlotBusy> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(map_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        time::timeout(timeout, lock.lock_owned())
            .await
            .map_err(|_| SlotBusy)
    }

    /// 移除无人持有的槽位锁，返回剩余数量。
    pub async fn prune_idle(&self) -> usize {
        let mut locks = self.locks.lock().await;
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.len()
    }
}

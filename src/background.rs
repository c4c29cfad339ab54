//! 暂存文件清理与槽位锁回收的后台任务。

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::atomic::remove_stale_temp_files;
use crate::config::TEMP_CLEAN_INTERVAL_SECS;
use crate::maps::MapService;

/// 启动后台任务。
pub fn spawn_background_tasks(maps: Arc<MapService>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(TEMP_CLEAN_INTERVAL_SECS));
        loop {
            interval.tick().await;
            run_maintenance(&maps).await;
        }
    });
}

/// 执行一轮清理。
pub async fn run_maintenance(maps: &MapService) {
    match remove_stale_temp_files(&maps.uploads_dir(), maps.config().temp_ttl).await {
        Ok(0) => {}
        Ok(removed) => debug!(removed, "removed stale map temp files"),
        Err(err) => warn!(error = %err, "map temp cleanup failed"),
    }
    let remaining = maps.slots().prune_idle().await;
    debug!(remaining, "slot lock table pruned");
}

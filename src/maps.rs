//! 地图上传/下载共享的目录、配置与槽位锁。

use std::io;
use std::path::PathBuf;

use crate::config::MapConfig;
use crate::locking::SlotLocks;
use crate::map_id::{CounterError, UploadWindow, last_map_id};
use crate::storage::Storage;

/// 地图处理器共享的状态，通过 `Arc` 共享。
#[derive(Debug)]
pub struct MapService {
    pub(crate) config: MapConfig,
    pub(crate) uploads: Storage,
    pub(crate) downloads: Storage,
    pub(crate) slots: SlotLocks,
}

impl MapService {
    pub fn new(config: MapConfig) -> Self {
        let uploads = Storage::new(config.uploads_dir.clone());
        let downloads = Storage::new(config.downloads_dir.clone());
        Self {
            config,
            uploads,
            downloads,
            slots: SlotLocks::new(),
        }
    }

    pub async fn ensure_dirs(&self) -> io::Result<()> {
        self.uploads.ensure_root().await?;
        self.downloads.ensure_root().await
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.uploads.root_path().to_path_buf()
    }

    pub fn slots(&self) -> &SlotLocks {
        &self.slots
    }

    /// 读取计数文件；每次请求重新读取，不做缓存。
    pub async fn last_map_id(&self) -> Result<i64, CounterError> {
        last_map_id(self.uploads.root_path()).await
    }

    pub async fn upload_window(&self) -> Result<UploadWindow, CounterError> {
        let last_id = self.last_map_id().await?;
        Ok(UploadWindow::new(
            last_id,
            self.config.last_allowed_id_range,
        ))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::{
        DEFAULT_MAP_UPLOAD_ID_RANGE, DEFAULT_MAP_UPLOAD_MAX_FILE_SIZE,
        DEFAULT_MAP_UPLOAD_MAX_FILES,
    };
    use crate::testing::write_counter;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    /// 基于临时目录创建服务，计数文件记录 `last_id`。
    pub fn make_service(last_id: i32) -> (TempDir, Arc<MapService>) {
        let temp = tempfile::tempdir().expect("tempdir");
        let uploads_dir = temp.path().join("uploads");
        let downloads_dir = temp.path().join("downloads");
        std::fs::create_dir_all(&uploads_dir).expect("create uploads");
        std::fs::create_dir_all(&downloads_dir).expect("create downloads");
        write_counter(&uploads_dir, last_id);
        let config = MapConfig {
            uploads_dir,
            downloads_dir,
            max_files: DEFAULT_MAP_UPLOAD_MAX_FILES,
            max_file_size: DEFAULT_MAP_UPLOAD_MAX_FILE_SIZE,
            last_allowed_id_range: DEFAULT_MAP_UPLOAD_ID_RANGE,
            slot_lock_timeout: Duration::from_secs(5),
            temp_ttl: Duration::from_secs(60),
        };
        (temp, Arc::new(MapService::new(config)))
    }
}

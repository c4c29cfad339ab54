//! 地图 id 解析与允许范围计算。

use std::path::Path;
use thiserror::Error;

use crate::config::ID_COUNTS_FILE;
use crate::nbt::{FormatError, MapContainer};

const MAP_FILE_PREFIX: &str = "map_";
const MAP_FILE_SUFFIX: &str = ".dat";

/// 计数文件无法提供最新地图 id。
#[derive(Debug, Error)]
pub enum CounterError {
    #[error("counter file unreadable: {0}")]
    Unreadable(#[from] FormatError),
    #[error("counter file has no integer `map` field")]
    MissingMapField,
}

/// 从 `uploads_dir` 下的 `idcounts.dat` 读取已分配的最大地图 id。
pub async fn last_map_id(uploads_dir: &Path) -> Result<i64, CounterError> {
    let counter = MapContainer::load_compressed(&uploads_dir.join(ID_COUNTS_FILE)).await?;
    counter
        .get_integer("map")
        .ok_or(CounterError::MissingMapField)
}

/// 从 `map_<数字>.dat` 形式的文件名中解析地图 id。
pub fn parse_file_map_id(filename: &str) -> Option<i64> {
    let digits = filename
        .strip_prefix(MAP_FILE_PREFIX)?
        .strip_suffix(MAP_FILE_SUFFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// 按地图 id 生成文件名。
pub fn map_file_name(map_id: i64) -> String {
    format!("{MAP_FILE_PREFIX}{map_id}{MAP_FILE_SUFFIX}")
}

/// `last_id - range < id <= last_id`
pub fn is_id_in_upload_range(id: i64, last_id: i64, range: i64) -> bool {
    last_id.saturating_sub(range) < id && id <= last_id
}

/// `0 <= id <= last_id`
pub fn is_id_in_download_range(id: i64, last_id: i64) -> bool {
    0 <= id && id <= last_id
}

/// 当前允许上传的 id 范围，显示在上传页面上。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadWindow {
    pub lower: i64,
    pub upper: i64,
}

impl UploadWindow {
    pub fn new(last_id: i64, range: i64) -> Self {
        Self {
            lower: last_id.saturating_sub(range).saturating_add(1),
            upper: last_id,
        }
    }
}

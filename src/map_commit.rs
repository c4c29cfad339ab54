//! 地图槽位的锁状态检查与“替换并加锁”提交。

use std::io;
use std::path::Path;
use tokio::fs;

use crate::nbt::{FormatError, MapContainer};

pub const LOCKED_FIELD: &str = "locked";

/// 磁盘上地图槽位当前的锁状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Empty,
    Unlocked,
    Locked,
}

/// 读取目标路径上已有地图文件的锁状态。
pub async fn existing_slot_state(target: &Path) -> Result<SlotState, FormatError> {
    match fs::metadata(target).await {
        Ok(metadata) if metadata.is_file() => {}
        Ok(_) => return Ok(SlotState::Empty),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(SlotState::Empty),
        Err(err) => return Err(FormatError::Read(err)),
    }
    let existing = MapContainer::load_compressed(target).await?;
    if existing.get_integer(LOCKED_FIELD) == Some(1) {
        Ok(SlotState::Locked)
    } else {
        Ok(SlotState::Unlocked)
    }
}

/// 以加锁后的 `container` 替换 `target` 处的地图。
///
/// 编码前先写入锁标记，只做一次暂存文件重命名；读取方只会看到旧文件或新的已加锁文件。
/// 提交后回读校验锁标记。
pub async fn replace_and_lock(target: &Path, mut container: MapContainer) -> io::Result<()> {
    container.set_byte_field(LOCKED_FIELD, 1);
    container.save_compressed(target).await?;

    let committed = MapContainer::load_compressed(target)
        .await
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err.to_string()))?;
    if committed.get_integer(LOCKED_FIELD) != Some(1) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "committed map is not locked",
        ));
    }
    Ok(())
}

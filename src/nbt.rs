//! gzip 压缩的 NBT 容器读写，以及 `data` 记录内字段的存取。

use fastnbt::Value;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::path::Path;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::atomic::AtomicFile;

/// 存放地图与计数字段的复合标签名。
pub const DATA_RECORD: &str = "data";
/// 解压后 NBT 数据的上限。
pub const MAX_DECODED_BYTES: u64 = 1024 * 1024;

/// 字节无法解析为 [`MapContainer`] 的错误。
///
/// 调用方对所有变体一视同仁，区分变体只为记录原因。
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("gzip decode failed: {0}")]
    Decompress(#[source] io::Error),
    #[error("nbt parse failed: {0}")]
    Parse(#[source] fastnbt::error::Error),
    #[error("nbt root is not a compound")]
    NotCompound,
    #[error("read failed: {0}")]
    Read(#[source] io::Error),
}

/// 以复合标签为根的 NBT 标签树。
#[derive(Debug, Clone, PartialEq)]
pub struct MapContainer {
    root: HashMap<String, Value>,
}

impl MapContainer {
    pub fn new(root: HashMap<String, Value>) -> Self {
        Self { root }
    }

    /// 解压并解析内存中的 NBT 数据。
    pub fn from_compressed(bytes: &[u8]) -> Result<Self, FormatError> {
        let mut decoder = GzDecoder::new(bytes).take(MAX_DECODED_BYTES + 1);
        let mut raw = Vec::new();
        decoder
            .read_to_end(&mut raw)
            .map_err(FormatError::Decompress)?;
        if raw.len() as u64 > MAX_DECODED_BYTES {
            return Err(FormatError::Decompress(io::Error::new(
                io::ErrorKind::InvalidData,
                "decoded nbt exceeds size limit",
            )));
        }
        match fastnbt::from_bytes::<Value>(&raw).map_err(FormatError::Parse)? {
            Value::Compound(root) => Ok(Self { root }),
            _ => Err(FormatError::NotCompound),
        }
    }

    /// 从磁盘读取并解析 NBT 文件。
    pub async fn load_compressed(path: &Path) -> Result<Self, FormatError> {
        let bytes = fs::read(path).await.map_err(FormatError::Read)?;
        Self::from_compressed(&bytes)
    }

    /// 在 `data` 复合标签中查找字段。
    pub fn get_field(&self, name: &str) -> Option<&Value> {
        match self.root.get(DATA_RECORD) {
            Some(Value::Compound(data)) => data.get(name),
            _ => None,
        }
    }

    /// 以整数形式读取字段，兼容各种 NBT 整数宽度。
    pub fn get_integer(&self, name: &str) -> Option<i64> {
        self.get_field(name).and_then(integer_value)
    }

    /// 在 `data` 下写入 Byte 字段，必要时创建该记录。
    pub fn set_byte_field(&mut self, name: &str, value: i8) {
        let data = self
            .root
            .entry(DATA_RECORD.to_string())
            .or_insert_with(|| Value::Compound(HashMap::new()));
        if !matches!(data, Value::Compound(_)) {
            *data = Value::Compound(HashMap::new());
        }
        if let Value::Compound(fields) = data {
            fields.insert(name.to_string(), Value::Byte(value));
        }
    }

    /// 编码并 gzip 压缩。
    pub fn to_compressed(&self) -> io::Result<Vec<u8>> {
        let raw = fastnbt::to_bytes(&Value::Compound(self.root.clone()))
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err.to_string()))?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw)?;
        encoder.finish()
    }

    /// 编码并原子替换 `path` 处的文件。
    pub async fn save_compressed(&self, path: &Path) -> io::Result<()> {
        let bytes = self.to_compressed()?;
        let mut staged = AtomicFile::new(path).await?;
        if let Err(err) = staged.file_mut().write_all(&bytes).await {
            staged.cleanup().await;
            return Err(err);
        }
        staged.finalize().await
    }
}

/// 将任意整数宽度的 NBT 值转换为 i64。
pub fn integer_value(value: &Value) -> Option<i64> {
    match value {
        Value::Byte(v) => Some(i64::from(*v)),
        Value::Short(v) => Some(i64::from(*v)),
        Value::Int(v) => Some(i64::from(*v)),
        Value::Long(v) => Some(*v),
        _ => None,
    }
}

//! 单元测试共用的测试数据。

use fastnbt::{ByteArray, Value};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use crate::config::ID_COUNTS_FILE;
use crate::nbt::{DATA_RECORD, MapContainer};

pub fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).expect("gzip write");
    encoder.finish().expect("gzip finish")
}

/// 未加锁的主世界地图的 `data` 字段。
pub fn map_fields() -> HashMap<String, Value> {
    let mut data = HashMap::new();
    data.insert(
        "dimension".to_string(),
        Value::String("minecraft:overworld".to_string()),
    );
    data.insert("locked".to_string(), Value::Byte(0));
    data.insert(
        "colors".to_string(),
        Value::ByteArray(ByteArray::new(vec![4i8; 128])),
    );
    data.insert("scale".to_string(), Value::Byte(0));
    data.insert("trackingPosition".to_string(), Value::Byte(1));
    data.insert("unlimitedTracking".to_string(), Value::Byte(0));
    data.insert("xCenter".to_string(), Value::Int(64));
    data.insert("zCenter".to_string(), Value::Int(-64));
    data
}

pub fn map_container(data: HashMap<String, Value>) -> MapContainer {
    let mut root = HashMap::new();
    root.insert(DATA_RECORD.to_string(), Value::Compound(data));
    root.insert("DataVersion".to_string(), Value::Int(3465));
    MapContainer::new(root)
}

pub fn map_bytes(data: HashMap<String, Value>) -> Vec<u8> {
    map_container(data).to_compressed().expect("encode map")
}

pub fn locked_map_bytes() -> Vec<u8> {
    let mut data = map_fields();
    data.insert("locked".to_string(), Value::Byte(1));
    map_bytes(data)
}

/// 写入 `idcounts.dat`，最大地图 id 为 `last_id`。
pub fn write_counter(dir: &Path, last_id: i32) {
    let mut data = HashMap::new();
    data.insert("map".to_string(), Value::Int(last_id));
    std::fs::create_dir_all(dir).expect("create counter dir");
    std::fs::write(dir.join(ID_COUNTS_FILE), map_bytes(data)).expect("write counter");
}

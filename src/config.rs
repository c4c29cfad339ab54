//! CLI arguments and server configuration defaults.

use clap::Parser;
use shadow_rs::formatcp;
use std::path::PathBuf;
use std::time::Duration;

use crate::build;

const VERSION_INFO: &str = formatcp!(
    r#"{}\ncommit_hash: {}\nbuild_time: {}\nbuild_env: {},{}"#,
    build::PKG_VERSION,
    build::SHORT_COMMIT,
    build::BUILD_TIME,
    build::RUST_VERSION,
    build::RUST_CHANNEL
);

/// Counter file written by the game server, read from the map uploads directory.
pub const ID_COUNTS_FILE: &str = "idcounts.dat";
pub const DEFAULT_MAP_UPLOAD_MAX_FILES: usize = 10;
pub const DEFAULT_MAP_UPLOAD_MAX_FILE_SIZE: u64 = 100 * 1024;
pub const DEFAULT_MAP_UPLOAD_ID_RANGE: i64 = 1000;
pub const DEFAULT_SLOT_LOCK_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_TEMP_TTL_SECS: u64 = 60 * 60;
pub const TEMP_CLEAN_INTERVAL_SECS: u64 = 900;
/// 每个 multipart 请求在文件内容之外预留的余量。
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// CLI arguments and environment configuration for the server.
#[derive(Parser, Debug)]
#[command(name = "map-portal", version = VERSION_INFO, about = "Map upload/download portal")]
pub struct Args {
    #[arg(
        short = 'b',
        long = "bind",
        env = "PORTAL_BIND",
        default_value = "0.0.0.0",
        help = "Bind address for HTTP/HTTPS"
    )]
    pub host: String,
    #[arg(
        short = 'p',
        long,
        env = "PORTAL_HTTP_PORT",
        default_value_t = 5010,
        help = "HTTP port"
    )]
    pub http_port: u16,
    #[arg(
        short = 'P',
        long,
        env = "PORTAL_HTTPS_PORT",
        help = "HTTPS port (HTTPS is disabled when unset)"
    )]
    pub https_port: Option<u16>,
    #[arg(short = 'c', long, env = "PORTAL_TLS_CERT", help = "TLS cert path")]
    pub tls_cert: Option<String>,
    #[arg(short = 'k', long, env = "PORTAL_TLS_KEY", help = "TLS key path")]
    pub tls_key: Option<String>,
    #[arg(
        long,
        env = "PORTAL_MAP_UPLOADS_DIR",
        default_value = ".portal/uploads/maps",
        help = "Directory receiving uploaded maps (also holds idcounts.dat)"
    )]
    pub map_uploads_dir: PathBuf,
    #[arg(
        long,
        env = "PORTAL_MAP_DOWNLOADS_DIR",
        default_value = ".portal/downloads/maps",
        help = "Directory serving map downloads"
    )]
    pub map_downloads_dir: PathBuf,
    #[arg(
        long,
        env = "PORTAL_WORLD_DOWNLOADS_DIR",
        default_value = ".portal/downloads/worlds",
        help = "Directory serving world backups"
    )]
    pub world_downloads_dir: PathBuf,
    #[arg(
        long,
        env = "PORTAL_MAP_UPLOAD_MAX_FILES",
        default_value_t = DEFAULT_MAP_UPLOAD_MAX_FILES,
        help = "Max map files per upload request"
    )]
    pub map_upload_max_files: usize,
    #[arg(
        long,
        env = "PORTAL_MAP_UPLOAD_MAX_FILE_SIZE",
        default_value_t = DEFAULT_MAP_UPLOAD_MAX_FILE_SIZE,
        help = "Max size of a single map file in bytes"
    )]
    pub map_upload_max_file_size: u64,
    #[arg(
        long,
        env = "PORTAL_MAP_UPLOAD_ID_RANGE",
        default_value_t = DEFAULT_MAP_UPLOAD_ID_RANGE,
        help = "How many of the most recent map ids may be uploaded"
    )]
    pub map_upload_id_range: i64,
    #[arg(
        long,
        env = "PORTAL_SLOT_LOCK_TIMEOUT_SECS",
        default_value_t = DEFAULT_SLOT_LOCK_TIMEOUT_SECS,
        help = "Max wait for a concurrent upload of the same map id"
    )]
    pub slot_lock_timeout_secs: u64,
    #[arg(
        long,
        env = "PORTAL_TEMP_TTL_SECS",
        default_value_t = DEFAULT_TEMP_TTL_SECS,
        help = "Age after which staged temp files are removed (0 to disable)"
    )]
    pub temp_ttl_secs: u64,
}

/// 地图上传/下载流水线使用的不可变配置。
#[derive(Debug, Clone)]
pub struct MapConfig {
    pub uploads_dir: PathBuf,
    pub downloads_dir: PathBuf,
    pub max_files: usize,
    pub max_file_size: u64,
    pub last_allowed_id_range: i64,
    pub slot_lock_timeout: Duration,
    pub temp_ttl: Duration,
}

impl MapConfig {
    pub fn from_args(args: &Args) -> Self {
        Self {
            uploads_dir: args.map_uploads_dir.clone(),
            downloads_dir: args.map_downloads_dir.clone(),
            max_files: args.map_upload_max_files,
            max_file_size: args.map_upload_max_file_size,
            last_allowed_id_range: args.map_upload_id_range,
            slot_lock_timeout: Duration::from_secs(args.slot_lock_timeout_secs),
            temp_ttl: Duration::from_secs(args.temp_ttl_secs),
        }
    }

    /// 单个上传请求体允许的最大字节数。
    pub fn body_limit(&self) -> usize {
        let per_file = usize::try_from(self.max_file_size).unwrap_or(usize::MAX);
        per_file
            .saturating_mul(self.max_files.max(1))
            .saturating_add(MULTIPART_OVERHEAD_BYTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_portal_limits() {
        let args = Args::parse_from(["map-portal"]);
        let config = MapConfig::from_args(&args);
        assert_eq!(config.max_files, 10);
        assert_eq!(config.max_file_size, 102_400);
        assert_eq!(config.last_allowed_id_range, 1000);
        assert!(args.https_port.is_none());
        assert_eq!(
            config.body_limit(),
            10 * 102_400 + MULTIPART_OVERHEAD_BYTES
        );
    }
}

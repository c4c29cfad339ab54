//! 世界存档下载。

use axum::extract::{Extension, Path};
use axum::http::HeaderMap;
use axum::response::{Html, Response};
use std::io;
use std::sync::Arc;
use tokio::fs;

use crate::error::ApiError;
use crate::files::attachment_response;
use crate::messages::{MessageKey, log_message};
use crate::pages;
use crate::storage::Storage;

/// 世界存档目录，与其他 `Storage` 扩展区分。
#[derive(Clone, Debug)]
pub struct WorldDownloads(pub Storage);

impl WorldDownloads {
    /// 列出可下载的存档文件（忽略隐藏文件、目录与符号链接），按名称排序。
    pub async fn list_backups(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(self.0.root_path()).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !name.starts_with('.') {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

/// 世界存档下载页。
pub async fn world_download_page(
    Extension(worlds): Extension<Arc<WorldDownloads>>,
) -> Result<Html<String>, ApiError> {
    let backups = worlds
        .list_backups()
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    Ok(Html(pages::world_download_page(&backups)))
}

/// 以附件形式下载世界存档。
pub async fn download_world(
    Path(filename): Path<String>,
    request_headers: HeaderMap,
    Extension(worlds): Extension<Arc<WorldDownloads>>,
) -> Result<Response, ApiError> {
    let target = worlds.0.resolve_path_checked(&filename, false).await?;
    let response = attachment_response(&target, &filename, &request_headers).await?;
    log_message(MessageKey::WorldDownloadSuccess, Some(&filename), None, None);
    Ok(response)
}

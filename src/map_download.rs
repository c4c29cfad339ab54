//! 地图下载：下载链接生成与按文件名直接下载。

use axum::extract::{Extension, Form, Path};
use axum::http::HeaderMap;
use axum::response::{Html, Response};
use serde::Deserialize;
use std::num::IntErrorKind;
use std::sync::Arc;

use crate::error::ApiError;
use crate::files::attachment_response;
use crate::map_id::{is_id_in_download_range, map_file_name, parse_file_map_id};
use crate::maps::MapService;
use crate::messages::{Flash, MessageKey, log_message};
use crate::pages;
use crate::sanitize::secure_filename;
use crate::storage::StorageError;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DownloadLinkForm {
    #[serde(default)]
    map_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkRejection {
    IdEmpty,
    IdInvalid,
    IdOutOfRange,
    FileNotFound,
}

impl LinkRejection {
    pub fn message_key(&self) -> MessageKey {
        match self {
            LinkRejection::IdEmpty => MessageKey::MapDownloadLinkCreationMapIdEmpty,
            LinkRejection::IdInvalid => MessageKey::MapDownloadLinkCreationMapIdInvalid,
            LinkRejection::IdOutOfRange => MessageKey::MapDownloadLinkCreationMapIdOutOfRange,
            LinkRejection::FileNotFound => MessageKey::MapDownloadLinkCreationFileNotFound,
        }
    }
}

/// 下载链接请求的结果；`filename` 用于提示消息。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkReport {
    pub filename: Option<String>,
    pub result: Result<(), LinkRejection>,
}

impl MapService {
    /// 校验输入的地图 id 并确认地图可下载。
    pub async fn create_download_link(&self, map_id: &str) -> Result<LinkReport, ApiError> {
        if map_id.is_empty() {
            return Ok(LinkReport {
                filename: None,
                result: Err(LinkRejection::IdEmpty),
            });
        }
        let requested_name = format!("map_{map_id}.dat");
        let rejected = |rejection| LinkReport {
            filename: Some(requested_name.clone()),
            result: Err(rejection),
        };

        let id = match map_id.parse::<i64>() {
            Ok(id) => id,
            Err(err)
                if matches!(
                    err.kind(),
                    IntErrorKind::PosOverflow | IntErrorKind::NegOverflow
                ) =>
            {
                return Ok(rejected(LinkRejection::IdOutOfRange));
            }
            Err(_) => return Ok(rejected(LinkRejection::IdInvalid)),
        };
        let last_id = self.last_map_id().await?;
        if !is_id_in_download_range(id, last_id) {
            return Ok(rejected(LinkRejection::IdOutOfRange));
        }

        let filename = secure_filename(&map_file_name(id));
        let exists = match self.downloads.is_file(&filename).await {
            Ok(exists) => exists,
            Err(StorageError::InvalidPath) => false,
            Err(err) => return Err(err.into()),
        };
        Ok(LinkReport {
            filename: Some(filename),
            result: if exists {
                Ok(())
            } else {
                Err(LinkRejection::FileNotFound)
            },
        })
    }
}

/// 下载链接的 URL。
pub fn download_href(filename: &str) -> String {
    format!("/map/download/{filename}")
}

/// 下载页面。
pub async fn download_page() -> Html<String> {
    Html(pages::map_download_page(&[]))
}

/// 处理下载链接表单。
pub async fn create_download_link(
    Extension(maps): Extension<Arc<MapService>>,
    Form(form): Form<DownloadLinkForm>,
) -> Result<Html<String>, ApiError> {
    let report = maps.create_download_link(&form.map_id).await?;
    let mut flash = Flash::new();
    let filename = report.filename.as_deref();
    match &report.result {
        Ok(()) => {
            flash.emit(
                MessageKey::MapDownloadLinkCreationSuccess,
                filename,
                None,
                None,
            );
            if let Some(name) = filename {
                flash.attach_link(download_href(name));
            }
        }
        Err(rejection) => flash.emit(rejection.message_key(), filename, None, None),
    }
    Ok(Html(pages::map_download_page(flash.messages())))
}

/// 下载地图文件；非 `map_<id>.dat` 形式的文件名一律拒绝。
pub async fn download_map(
    Path(filename): Path<String>,
    request_headers: HeaderMap,
    Extension(maps): Extension<Arc<MapService>>,
) -> Result<Response, ApiError> {
    if parse_file_map_id(&filename).is_none() {
        log_message(MessageKey::MapDownloadForbidden, Some(&filename), None, None);
        return Err(ApiError::Forbidden("forbidden".into()));
    }
    let target = maps.downloads.resolve_path_checked(&filename, false).await?;
    let response = attachment_response(&target, &filename, &request_headers).await?;
    log_message(MessageKey::MapDownloadSuccess, Some(&filename), None, None);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maps::test_support::make_service;
    use crate::testing::{map_bytes, map_fields};
    use axum::http::{StatusCode, header};
    use axum::response::IntoResponse;

    fn place_download(maps: &MapService, name: &str) {
        std::fs::write(
            maps.config().downloads_dir.join(name),
            map_bytes(map_fields()),
        )
        .expect("write download");
    }

    #[tokio::test]
    async fn link_created_for_existing_maps_in_range() {
        let (_temp, maps) = make_service(2000);
        for id in ["0", "289", "1000", "1772", "2000"] {
            let name = format!("map_{id}.dat");
            place_download(&maps, &name);
            let report = maps.create_download_link(id).await.expect("link");
            assert_eq!(report.filename.as_deref(), Some(name.as_str()));
            assert_eq!(report.result, Ok(()));
        }
    }

    #[tokio::test]
    async fn link_rejections() {
        let (_temp, maps) = make_service(2000);
        for (input, expected) in [
            ("", LinkRejection::IdEmpty),
            ("1500a", LinkRejection::IdInvalid),
            ("asdf", LinkRejection::IdInvalid),
            ("-1", LinkRejection::IdOutOfRange),
            ("2001", LinkRejection::IdOutOfRange),
            ("99999999999999999999", LinkRejection::IdOutOfRange),
            ("-99999999999999999999", LinkRejection::IdOutOfRange),
            ("1500", LinkRejection::FileNotFound),
        ] {
            let report = maps.create_download_link(input).await.expect("link");
            assert_eq!(report.result, Err(expected), "{input}");
            if input.is_empty() {
                assert_eq!(report.filename, None);
            } else {
                assert_eq!(report.filename, Some(format!("map_{input}.dat")));
            }
        }
    }

    #[tokio::test]
    async fn direct_download_refuses_non_map_names() {
        let (_temp, maps) = make_service(2000);
        std::fs::copy(
            maps.uploads_dir().join("idcounts.dat"),
            maps.config().downloads_dir.join("idcounts.dat"),
        )
        .expect("copy counter");
        for name in ["idcounts.dat", "raids.dat", "map_1.dat.bak"] {
            let result = download_map(
                Path(name.to_string()),
                HeaderMap::new(),
                Extension(maps.clone()),
            )
            .await;
            let response = result.into_response();
            assert_eq!(response.status(), StatusCode::FORBIDDEN, "{name}");
            assert!(response.headers().get(header::CONTENT_DISPOSITION).is_none());
        }
    }

    #[tokio::test]
    async fn direct_download_serves_attachment() {
        let (_temp, maps) = make_service(2000);
        place_download(&maps, "map_289.dat");
        let response = download_map(
            Path("map_289.dat".to_string()),
            HeaderMap::new(),
            Extension(maps),
        )
        .await
        .unwrap_or_else(|_| panic!("download failed"));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_DISPOSITION),
            Some(&header::HeaderValue::from_static(
                "attachment; filename=map_289.dat"
            ))
        );
    }

    #[tokio::test]
    async fn direct_download_of_missing_map_is_not_found() {
        let (_temp, maps) = make_service(2000);
        let response = download_map(
            Path("map_5.dat".to_string()),
            HeaderMap::new(),
            Extension(maps),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

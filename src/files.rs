//! 文件下载响应：附件头、Range 请求与缓存相关头。

use axum::body::Body as AxumBody;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use httpdate::{fmt_http_date, parse_http_date};
use std::fs::Metadata;
use std::io::SeekFrom;
use std::path::Path;
use std::time::UNIX_EPOCH;
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::error::ApiError;

/// 以附件形式返回文件内容，支持单段 Range。
pub async fn attachment_response(
    target: &Path,
    filename: &str,
    request_headers: &HeaderMap,
) -> Result<Response, ApiError> {
    let metadata = fs::metadata(target).await.map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => ApiError::NotFound("not found".into()),
        _ => ApiError::Internal(err.to_string()),
    })?;
    if !metadata.is_file() {
        return Err(ApiError::NotFound("not found".into()));
    }
    let file_size = metadata.len();
    let modified = metadata.modified().ok();
    let mime = mime_guess::from_path(filename).first_or_octet_stream();

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(mime.essence_str())
            .map_err(|_| ApiError::Internal("无效的 MIME 类型".into()))?,
    );
    response_headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename={filename}"))
            .map_err(|_| ApiError::BadRequest("invalid filename".into()))?,
    );
    response_headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    if let Some(value) = modified.map(fmt_http_date) {
        response_headers.insert(
            header::LAST_MODIFIED,
            HeaderValue::from_str(&value)
                .map_err(|_| ApiError::Internal("响应头构建失败".into()))?,
        );
    }
    response_headers.insert(
        header::ETAG,
        HeaderValue::from_str(&etag_from_metadata(&metadata))
            .map_err(|_| ApiError::Internal("响应头构建失败".into()))?,
    );

    let if_range_matches = match request_headers
        .get(header::IF_RANGE)
        .and_then(|value| value.to_str().ok())
    {
        Some(value) => match parse_http_date(value) {
            Ok(date) => modified.map(|ts| ts <= date).unwrap_or(false),
            Err(_) => false,
        },
        None => true,
    };
    let range = if if_range_matches {
        parse_range(request_headers.get(header::RANGE), file_size)?
    } else {
        None
    };

    let mut file = File::open(target)
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    if let Some((start, end)) = range {
        let length = end - start + 1;
        debug!(filename, start, end, length, "download range request accepted");
        file.seek(SeekFrom::Start(start))
            .await
            .map_err(|err| ApiError::Internal(err.to_string()))?;
        response_headers.insert(
            header::CONTENT_RANGE,
            HeaderValue::from_str(&format!("bytes {start}-{end}/{file_size}"))
                .map_err(|_| ApiError::Internal("响应头构建失败".into()))?,
        );
        response_headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
        let stream = ReaderStream::new(file.take(length));
        return Ok((
            StatusCode::PARTIAL_CONTENT,
            response_headers,
            AxumBody::from_stream(stream),
        )
            .into_response());
    }

    response_headers.insert(header::CONTENT_LENGTH, HeaderValue::from(file_size));
    let stream = ReaderStream::new(file);
    Ok((
        StatusCode::OK,
        response_headers,
        AxumBody::from_stream(stream),
    )
        .into_response())
}

/// 根据文件元数据生成弱 ETag。
fn etag_from_metadata(metadata: &Metadata) -> String {
    let size = metadata.len();
    if let Some(duration) = metadata
        .modified()
        .ok()
        .and_then(|ts| ts.duration_since(UNIX_EPOCH).ok())
    {
        return format!(
            "W/\"{}-{}-{}\"",
            size,
            duration.as_secs(),
            duration.subsec_nanos()
        );
    }
    format!("W/\"{size}\"")
}

/// 解析 Range 头，返回可读取的范围。
fn parse_range(
    value: Option<&HeaderValue>,
    file_size: u64,
) -> Result<Option<(u64, u64)>, ApiError> {
    let Some(value) = value else {
        return Ok(None);
    };
    if file_size == 0 {
        return Err(ApiError::RangeNotSatisfiable(file_size));
    }
    let value = value
        .to_str()
        .map_err(|_| ApiError::BadRequest("invalid Range header".into()))?;
    let Some(range) = value.strip_prefix("bytes=") else {
        return Err(ApiError::BadRequest("invalid Range header".into()));
    };
    if range.contains(',') {
        return Err(ApiError::BadRequest("multiple ranges not supported".into()));
    }

    let (start_part, end_part) = range.split_once('-').unwrap_or((range, ""));
    let invalid = || ApiError::BadRequest("invalid Range header".into());

    let (start, end) = if start_part.is_empty() {
        let suffix: u64 = end_part.parse().map_err(|_| invalid())?;
        if suffix == 0 {
            return Ok(None);
        }
        (file_size.saturating_sub(suffix), file_size - 1)
    } else {
        let start: u64 = start_part.parse().map_err(|_| invalid())?;
        let end: u64 = if end_part.is_empty() {
            file_size - 1
        } else {
            end_part.parse::<u64>().map_err(|_| invalid())?.min(file_size - 1)
        };
        (start, end)
    };

    if start > end || start >= file_size {
        return Err(ApiError::RangeNotSatisfiable(file_size));
    }

    Ok(Some((start, end)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use tempfile::tempdir;

    fn range(value: &'static str, size: u64) -> Result<Option<(u64, u64)>, ApiError> {
        parse_range(Some(&HeaderValue::from_static(value)), size)
    }

    #[test]
    fn parse_range_variants() {
        assert!(matches!(parse_range(None, 10), Ok(None)));
        assert!(matches!(range("bytes=0-4", 10), Ok(Some((0, 4)))));
        assert!(matches!(range("bytes=5-", 10), Ok(Some((5, 9)))));
        assert!(matches!(range("bytes=-3", 10), Ok(Some((7, 9)))));
        assert!(matches!(range("bytes=2-100", 10), Ok(Some((2, 9)))));
        assert!(matches!(
            range("bytes=10-12", 10),
            Err(ApiError::RangeNotSatisfiable(10))
        ));
        assert!(matches!(range("bytes=0-1,3-4", 10), Err(ApiError::BadRequest(_))));
        assert!(matches!(range("items=0-1", 10), Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn full_download_sets_attachment_headers() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("world.7z");
        std::fs::write(&path, b"0123456789").expect("write");

        let response = attachment_response(&path, "world.7z", &HeaderMap::new())
            .await
            .unwrap_or_else(|_| panic!("download failed"));
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(
            headers.get(header::CONTENT_DISPOSITION),
            Some(&HeaderValue::from_static("attachment; filename=world.7z"))
        );
        assert_eq!(
            headers.get(header::CONTENT_LENGTH),
            Some(&HeaderValue::from_static("10"))
        );
        let body = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        assert_eq!(&body[..], b"0123456789");
    }

    #[tokio::test]
    async fn range_download_returns_partial_content() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("map_1.dat");
        std::fs::write(&path, b"0123456789").expect("write");

        let mut headers = HeaderMap::new();
        headers.insert(header::RANGE, HeaderValue::from_static("bytes=2-5"));
        let response = attachment_response(&path, "map_1.dat", &headers)
            .await
            .unwrap_or_else(|_| panic!("download failed"));
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(
            response.headers().get(header::CONTENT_RANGE),
            Some(&HeaderValue::from_static("bytes 2-5/10"))
        );
        let body = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        assert_eq!(&body[..], b"2345");
    }
}

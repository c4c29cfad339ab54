//! 嵌入式静态资源服务。

use axum::body::Body as AxumBody;
use axum::extract::Path;
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::{Html, IntoResponse, Response};
use rust_embed::RustEmbed;

use crate::error::ApiError;
use crate::pages;

#[derive(RustEmbed)]
#[folder = "static"]
/// 嵌入式样式表与脚本。
pub struct StaticAssets;

/// 首页。
pub async fn index() -> Html<String> {
    Html(pages::index_page())
}

/// `/static/{*path}` 处理器。
pub async fn serve_static(Path(path): Path<String>) -> Result<Response, ApiError> {
    load_embedded_asset(&path)?.ok_or_else(|| ApiError::NotFound("not found".into()))
}

/// 加载指定路径的嵌入式资源。
fn load_embedded_asset(path: &str) -> Result<Option<Response>, ApiError> {
    let Some(asset) = StaticAssets::get(path) else {
        return Ok(None);
    };
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(mime.essence_str())
            .map_err(|_| ApiError::Internal("无效的 MIME 类型".into()))?,
    );
    Ok(Some(
        (headers, AxumBody::from(asset.data.into_owned())).into_response(),
    ))
}

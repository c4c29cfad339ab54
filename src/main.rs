//! Map portal server binary.
//!
//! Players upload Minecraft map files for ids near the world's current map
//! counter; each accepted map is locked on commit so it cannot be redrawn
//! in game. Admins publish maps and world backups for download. The main
//! entry point builds the Axum router, configures TLS, and starts the
//! HTTP/HTTPS listeners.

mod atomic;
mod background;
mod config;
mod error;
mod files;
mod frontend;
mod http;
mod locking;
mod logging;
mod map_commit;
mod map_download;
mod map_id;
mod map_upload;
mod maps;
mod messages;
mod nbt;
mod pages;
mod sanitize;
mod storage;
#[cfg(test)]
mod testing;
mod tls;
mod version;
mod world;

use axum::extract::{DefaultBodyLimit, Extension};
use axum::http::Request;
use axum::routing::get;
use axum::{Router, middleware};
use axum_server::Handle;
use clap::Parser;
use shadow_rs::shadow;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, info, info_span};

use crate::background::spawn_background_tasks;
use crate::config::{Args, MapConfig};
use crate::maps::MapService;
use crate::storage::Storage;
use crate::world::WorldDownloads;

shadow!(build);

/// Starts the portal and blocks until shutdown.
#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    logging::init_logging();

    let args = Args::parse();
    let maps = Arc::new(MapService::new(MapConfig::from_args(&args)));
    maps.ensure_dirs().await?;
    let worlds = Arc::new(WorldDownloads(Storage::new(
        args.world_downloads_dir.clone(),
    )));
    worlds.0.ensure_root().await?;

    let app = app_router(maps.clone(), worlds);

    let host = args
        .host
        .parse::<IpAddr>()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err.to_string()))?;
    let http_addr = SocketAddr::new(host, args.http_port);
    let handle = Handle::new();

    info!(
        uploads = ?maps.config().uploads_dir,
        downloads = ?maps.config().downloads_dir,
        "map directories ready"
    );
    info!("🚀 Starting HTTP server at {}", http_addr);
    let http_server = axum_server::bind(http_addr)
        .handle(handle.clone())
        .serve(
            app.clone()
                .into_make_service_with_connect_info::<SocketAddr>(),
        );

    spawn_background_tasks(maps);

    match args.https_port {
        Some(https_port) => {
            let https_addr = SocketAddr::new(host, https_port);
            let tls_config = tls::build_rustls_config(&args, host).await?;
            info!("🔒 Starting HTTPS server at {}", https_addr);
            let https_server = axum_server::bind_rustls(https_addr, tls_config)
                .handle(handle.clone())
                .serve(app.into_make_service_with_connect_info::<SocketAddr>());
            tokio::select! {
                result = http_server => result?,
                result = https_server => result?,
                _ = shutdown_signal(handle) => {}
            }
        }
        None => {
            tokio::select! {
                result = http_server => result?,
                _ = shutdown_signal(handle) => {}
            }
        }
    }

    Ok(())
}

/// 构建路由，挂载共享状态与中间件。
fn app_router(maps: Arc<MapService>, worlds: Arc<WorldDownloads>) -> Router {
    let body_limit = maps.config().body_limit();
    Router::new()
        .route("/", get(frontend::index))
        .route(
            "/map/upload",
            get(map_upload::upload_page)
                .post(map_upload::upload_maps)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .route(
            "/map/download",
            get(map_download::download_page).post(map_download::create_download_link),
        )
        .route("/map/download/{filename}", get(map_download::download_map))
        .route("/world/download", get(world::world_download_page))
        .route("/world/download/{filename}", get(world::download_world))
        .route("/static/{*path}", get(frontend::serve_static))
        .route("/api/version", get(version::get_version_info))
        .layer(middleware::from_fn(http::add_security_headers))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    info_span!(
                        env!("CARGO_CRATE_NAME"),
                        client_ip = %http::client_ip(request),
                        method = ?request.method(),
                        path = ?request.uri().path(),
                    )
                })
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        )
        .layer(Extension(maps))
        .layer(Extension(worlds))
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received termination signal shutting down");
    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maps::test_support::make_service;
    use crate::nbt::MapContainer;
    use crate::testing::{map_bytes, map_fields};
    use axum::body::Body;
    use axum::http::{StatusCode, header};
    use http_body_util::BodyExt;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "portal-test-boundary";

    fn make_app(last_id: i32) -> (TempDir, Arc<MapService>, Router) {
        let (temp, maps) = make_service(last_id);
        let worlds_dir = temp.path().join("worlds");
        std::fs::create_dir_all(&worlds_dir).expect("create worlds");
        let worlds = Arc::new(WorldDownloads(Storage::new(worlds_dir)));
        let app = app_router(maps.clone(), worlds);
        (temp, maps, app)
    }

    fn multipart_body(username: &str, files: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"userName\"\r\n\r\n{username}\r\n"
            )
            .as_bytes(),
        );
        for (name, data) in files {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"map\"; filename=\"{name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    #[tokio::test]
    async fn upload_page_shows_current_window() {
        let (_temp, _maps, app) = make_app(2000);
        let response = app
            .oneshot(
                Request::get("/map/upload")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::X_FRAME_OPTIONS),
            Some(&header::HeaderValue::from_static("DENY"))
        );
        let page = body_text(response).await;
        assert!(page.contains(r#"<span id="lower_map_id">1001</span>"#));
        assert!(page.contains(r#"<span id="upper_map_id">2000</span>"#));
    }

    #[tokio::test]
    async fn upload_commits_and_locks_map() {
        let (_temp, maps, app) = make_app(2000);
        let body = multipart_body(
            "steve",
            &[
                ("map_1500.dat", map_bytes(map_fields())),
                ("map_999.dat", map_bytes(map_fields())),
            ],
        );
        let response = app
            .oneshot(
                Request::post("/map/upload")
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={BOUNDARY}"),
                    )
                    .body(Body::from(body))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let page = body_text(response).await;
        assert!(page.contains(r#"class="success">map_1500.dat: Upload Successful!"#));
        assert!(page.contains(
            r#"class="error">map_999.dat: Upload Failed! Map ID is outside of the allowed range."#
        ));

        let stored = MapContainer::load_compressed(&maps.uploads_dir().join("map_1500.dat"))
            .await
            .expect("stored map");
        assert_eq!(stored.get_integer("locked"), Some(1));
        assert!(!maps.uploads_dir().join("map_999.dat").exists());
    }

    #[tokio::test]
    async fn counter_download_is_forbidden() {
        let (_temp, _maps, app) = make_app(2000);
        let response = app
            .oneshot(
                Request::get("/map/download/idcounts.dat")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(header::CONTENT_DISPOSITION).is_none());
    }

    #[tokio::test]
    async fn download_link_form_renders_link() {
        let (_temp, maps, app) = make_app(2000);
        std::fs::write(
            maps.config().downloads_dir.join("map_42.dat"),
            map_bytes(map_fields()),
        )
        .expect("write download");
        let response = app
            .oneshot(
                Request::post("/map/download")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("mapId=42"))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let page = body_text(response).await;
        assert!(page.contains("map_42.dat: Link creation successful!"));
        assert!(page.contains(r#"href="/map/download/map_42.dat""#));
    }

    #[tokio::test]
    async fn missing_counter_is_server_error() {
        let (_temp, maps, app) = make_app(2000);
        std::fs::remove_file(maps.uploads_dir().join("idcounts.dat")).expect("remove counter");
        let response = app
            .oneshot(
                Request::get("/map/upload")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(response).await.contains("contact the admins"));
    }
}

/// api.rs — All Axum route handlers and the router.
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde_json::json;
use std::path::Path;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};
use tracing::{info, warn};

use crate::{error::PublishError, publish::SitePublisher, state::AppState};

// ── Error helpers ──────────────────────────────────────────────────────────────

fn err(status: StatusCode, msg: impl Into<String>) -> Response {
    (status, Json(json!({ "error": msg.into() }))).into_response()
}

fn publish_err(e: PublishError) -> Response {
    let mut body = json!({ "error": e.code(), "detail": e.to_string() });
    if let Some(hint) = e.hint() {
        body["hint"] = json!(hint);
    }
    warn!("publish failed: {} — {e}", e.code());
    (e.status(), Json(body)).into_response()
}

// ── Health ─────────────────────────────────────────────────────────────────────

pub async fn health() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

// ── Publish ────────────────────────────────────────────────────────────────────

pub async fn publish_site(State(st): State<AppState>, mut multipart: Multipart) -> Response {
    let mut archive: Option<(String, Bytes)> = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                match field.bytes().await {
                    Ok(bytes) => archive = Some((filename, bytes)),
                    Err(e) => return err(StatusCode::BAD_REQUEST, e.to_string()),
                }
            }
            Ok(Some(_)) => {}
            Ok(None) => break,
            Err(e) => return err(StatusCode::BAD_REQUEST, e.to_string()),
        }
    }
    let Some((filename, bytes)) = archive else {
        return err(StatusCode::BAD_REQUEST, "No file uploaded");
    };

    info!("📤 Publish request: {filename} ({:.1}KB)", bytes.len() as f64 / 1024.0);
    let publisher = SitePublisher::new(
        st.site_dir(),
        st.work_dir(),
        st.cfg.site_prefix.clone(),
        st.cfg.entry_point.clone(),
    );

    // Serialize clear-and-rebuild against concurrent publishes.
    let _guard = st.publish_lock.lock().await;
    let result =
        tokio::task::spawn_blocking(move || publisher.publish(&filename, &bytes)).await;

    match result {
        Ok(Ok(path)) => Json(json!({
            "success": true,
            "message": "Site published",
            "path": path,
        }))
        .into_response(),
        Ok(Err(e)) => publish_err(e),
        Err(e) => err(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

// ── Single-file upload ─────────────────────────────────────────────────────────

fn sanitize_filename(raw: &str) -> Option<String> {
    let name = Path::new(raw.trim()).file_name()?.to_str()?.to_string();
    if name.is_empty() || name.starts_with('.') {
        return None;
    }
    Some(name)
}

pub async fn upload_file(State(st): State<AppState>, mut multipart: Multipart) -> Response {
    let mut data: Option<Bytes> = None;
    let mut declared_name: Option<String> = None;
    let mut original_name = String::new();
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => match field.name() {
                Some("file") => {
                    original_name = field.file_name().unwrap_or_default().to_string();
                    match field.bytes().await {
                        Ok(bytes) => data = Some(bytes),
                        Err(e) => return err(StatusCode::BAD_REQUEST, e.to_string()),
                    }
                }
                Some("filename") => match field.text().await {
                    Ok(text) => declared_name = Some(text),
                    Err(e) => return err(StatusCode::BAD_REQUEST, e.to_string()),
                },
                _ => {}
            },
            Ok(None) => break,
            Err(e) => return err(StatusCode::BAD_REQUEST, e.to_string()),
        }
    }
    let Some(data) = data else {
        return err(StatusCode::BAD_REQUEST, "No file uploaded");
    };
    let raw_name = declared_name.unwrap_or(original_name);
    let Some(filename) = sanitize_filename(&raw_name) else {
        return err(StatusCode::BAD_REQUEST, "Missing or invalid filename");
    };

    let uploads_dir = st.uploads_dir();
    if let Err(e) = tokio::fs::create_dir_all(&uploads_dir).await {
        return err(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }
    if let Err(e) = tokio::fs::write(uploads_dir.join(&filename), &data).await {
        return err(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
    }

    info!("💾 Saved upload: {filename} ({:.1}KB)", data.len() as f64 / 1024.0);
    Json(json!({ "success": true, "path": format!("/uploads/{filename}") })).into_response()
}

// ── Media library ──────────────────────────────────────────────────────────────

pub async fn list_media(State(st): State<AppState>) -> impl IntoResponse {
    let mut files = vec![];
    if let Ok(entries) = std::fs::read_dir(st.uploads_dir()) {
        for entry in entries.flatten() {
            let Ok(meta) = entry.metadata() else { continue };
            if !meta.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let modified = meta
                .modified()
                .ok()
                .map(chrono::DateTime::<chrono::Local>::from)
                .map(|t| t.format("%d/%m/%Y %H:%M").to_string());
            files.push(json!({
                "name": name,
                "path": format!("/uploads/{name}"),
                "size_bytes": meta.len(),
                "modified": modified,
            }));
        }
    }
    files.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));
    Json(json!({ "files": files }))
}

// ── Router ─────────────────────────────────────────────────────────────────────

pub fn router(st: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    let body_limit = st.cfg.max_upload_bytes + 1024 * 1024;

    Router::new()
        .route("/api/health", get(health))
        .route("/api/media", get(list_media))
        .route(
            "/api/upload",
            post(upload_file).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route(
            "/api/publish",
            post(publish_site).layer(DefaultBodyLimit::max(body_limit)),
        )
        // Route name the admin page has always used
        .route(
            "/api/upload-flipbook",
            post(publish_site).layer(DefaultBodyLimit::max(body_limit)),
        )
        .nest_service(st.cfg.site_prefix.as_str(), ServeDir::new(st.site_dir()))
        .nest_service("/uploads", ServeDir::new(st.uploads_dir()))
        .fallback_service(ServeDir::new(st.static_dir()).append_index_html_on_directories(true))
        .with_state(st)
        .layer(cors)
}

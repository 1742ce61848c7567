//! Direct serving of UI files
//!
//! Only active when a static root is configured, and only for the file
//! types in [`content_type_for`]. Anything else that no API route claimed
//! gets the "Unknown request" envelope.

use axum::{
    extract::State,
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use std::path::{Component, Path};
use tracing::{error, warn};

use super::envelope::ApiError;
use crate::AppState;

const NOT_FOUND_BODY: &str = "<html><body><p>Page not found.</p></body></html>";

/// Content type for a served file extension
pub fn content_type_for(extension: &str) -> Option<&'static str> {
    let content_type = match extension {
        "html" | "htm" => "text/html",
        "js" | "map" => "text/javascript",
        "css" => "text/css",
        "jpeg" => "image/jpeg",
        "jpg" => "image/jpg",
        "png" => "image/png",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "pdf" => "application/pdf",
        "png-meta" | "sigmf-meta" => "application/json",
        "ann-meta" => "text/plain",
        "csv" | "png-binary" | "woff" | "woff2" | "ttf" | "sigmf-data" => {
            "application/octet-stream"
        }
        _ => return None,
    };
    Some(content_type)
}

/// Fallback for every path without an API route
pub async fn fallback(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    if method == Method::GET {
        if let Some(root) = state.html_dir.as_deref() {
            if let Some(response) = serve_static(root, uri.path()).await {
                return response;
            }
        }
    }

    warn!("Unknown {} request: {}", method, uri.path());
    ApiError::not_found("Unknown request").into_response()
}

/// `None` when the path isn't a static file request
async fn serve_static(root: &Path, request_path: &str) -> Option<Response> {
    let relative = request_path.trim_start_matches(|c: char| c == '/' || c == '.');
    if relative.is_empty() {
        return Some((StatusCode::FOUND, [(header::LOCATION, "/index.html")]).into_response());
    }

    let decoded = match urlencoding::decode(relative) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => return Some(page_not_found()),
    };

    let content_type = Path::new(&decoded)
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(content_type_for)?;

    // Only plain descending paths: no "..", no absolute components
    if !Path::new(&decoded)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        warn!("Refusing static path outside root: {}", request_path);
        return Some(page_not_found());
    }

    let file_path = root.join(&decoded);
    match tokio::fs::read(&file_path).await {
        Ok(contents) => Some(
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, format!("{}; charset=utf-8", content_type))],
                contents,
            )
                .into_response(),
        ),
        Err(e) => {
            error!("ERROR serving non-API content {}: {}", file_path.display(), e);
            Some(page_not_found())
        }
    }
}

fn page_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        NOT_FOUND_BODY,
    )
        .into_response()
}

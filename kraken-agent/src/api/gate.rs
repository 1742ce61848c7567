//! Request gate middleware
//!
//! Runs ahead of routing for every request:
//! 1. Source address must be on the allow-list (403 HTML otherwise)
//! 2. HEAD is answered directly, with the CORS header when enabled
//! 3. POST has no operations and always gets an error envelope
//!
//! The 403 body is deliberately plain HTML rather than the JSON envelope.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use tracing::{info, warn};

use super::envelope::ApiError;
use crate::AppState;

const FORBIDDEN_BODY: &str =
    "<html><body><p>Connections not authorized from your IP address</p></body></html>";

pub async fn request_gate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !state.allow_list.is_empty() {
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        let permitted = peer.map_or(false, |ip| state.allow_list.permits(ip));
        if !permitted {
            match peer {
                Some(ip) => warn!("Request from unauthorized IP: {}", ip),
                None => warn!("Request with unknown peer address refused"),
            }
            return forbidden();
        }
    }

    match *request.method() {
        Method::HEAD => head_response(state.allow_cors),
        Method::POST => unhandled_post(&request),
        _ => next.run(request).await,
    }
}

fn forbidden() -> Response {
    (
        StatusCode::FORBIDDEN,
        [(header::CONTENT_TYPE, "text/html")],
        FORBIDDEN_BODY,
    )
        .into_response()
}

fn head_response(allow_cors: bool) -> Response {
    let mut response = StatusCode::OK.into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
    if allow_cors {
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        );
    }
    response
}

fn unhandled_post(request: &Request) -> Response {
    let length = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(0);

    if length == 0 {
        return ApiError::validation("Agent received a zero-length request.").into_response();
    }

    info!("Unhandled POST processing {}", request.uri().path());
    ApiError::not_found("Unhandled POST").into_response()
}

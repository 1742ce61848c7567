//! JSON response envelope
//!
//! Every API answer is `{"errcode": <int>, "errmsg": <string>, ...}` with
//! HTTP 200; clients look at `errcode`, where 0 means success. Failures carry
//! one of a fixed set of [`ErrorKind`]s so the code always means the same
//! thing regardless of endpoint.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Failure categories and their wire codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing, malformed or out-of-range request parameter
    Validation,
    /// Unknown path or unsupported request
    NotFound,
    /// The device feed could not be reached
    UpstreamUnavailable,
    /// Settings document could not be read or written
    IoFailure,
    Internal,
}

impl ErrorKind {
    pub fn code(self) -> i64 {
        match self {
            ErrorKind::Validation => 1,
            ErrorKind::NotFound => 2,
            ErrorKind::UpstreamUnavailable => 3,
            ErrorKind::IoFailure => 4,
            ErrorKind::Internal => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::UpstreamUnavailable => "upstream_unavailable",
            ErrorKind::IoFailure => "io_failure",
            ErrorKind::Internal => "internal",
        }
    }
}

/// An operation failure, rendered as an error envelope
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind.as_str())
    }
}

impl std::error::Error for ApiError {}

impl From<kraken_common::Error> for ApiError {
    fn from(err: kraken_common::Error) -> Self {
        use kraken_common::Error;

        match err {
            Error::InvalidInput(message) => ApiError::validation(message),
            Error::NotFound(message) => ApiError::not_found(message),
            Error::Upstream(message) => {
                ApiError::new(ErrorKind::UpstreamUnavailable, message)
            }
            err @ (Error::Io(_) | Error::Json(_)) => {
                ApiError::new(ErrorKind::IoFailure, err.to_string())
            }
            err @ (Error::Config(_) | Error::Internal(_)) => ApiError::internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = Map::new();
        body.insert("errcode".to_string(), self.kind.code().into());
        body.insert("errmsg".to_string(), escape_html(&self.message).into());
        body.insert("errkind".to_string(), self.kind.as_str().into());
        json_response(Value::Object(body))
    }
}

/// Success envelope with optional extra fields
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    body: Map<String, Value>,
}

impl Envelope {
    /// `{"errcode": 0, "errmsg": ""}`
    pub fn ok() -> Self {
        let mut body = Map::new();
        body.insert("errcode".to_string(), 0.into());
        body.insert("errmsg".to_string(), "".into());
        Self { body }
    }

    /// Attach an extra top-level field
    pub fn with(mut self, key: &str, value: impl Serialize) -> Result<Self, ApiError> {
        let value = serde_json::to_value(value)
            .map_err(|e| ApiError::internal(format!("Failed to encode {}: {}", key, e)))?;
        self.body.insert(key.to_string(), value);
        Ok(self)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        json_response(Value::Object(self.body))
    }
}

fn json_response(body: Value) -> Response {
    let mut response = (StatusCode::OK, body.to_string()).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(JSON_CONTENT_TYPE),
    );
    response
}

/// Escape text echoed back to clients so it can't inject markup
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

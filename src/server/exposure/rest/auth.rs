//! Public API key guard
//!
//! Clients send the key as an `apikey` header, as `Authorization: Bearer <key>`
//! or, for websocket upgrades where browsers cannot set headers, as an
//! `apikey` query parameter.

use crate::core::error::{InviteError, RequestError};
use crate::server::host::ServerHost;
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

/// Header carrying the public API key
pub const API_KEY_HEADER: &str = "apikey";

/// Extract the presented key from headers or the query string
pub fn presented_key(headers: &HeaderMap, query: Option<&str>) -> Option<String> {
    if let Some(key) = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        return Some(key.trim().to_string());
    }

    if let Some(token) = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(token.trim().to_string());
    }

    query.and_then(|q| {
        url::form_urlencoded::parse(q.as_bytes())
            .find(|(name, _)| name == API_KEY_HEADER)
            .map(|(_, value)| value.into_owned())
    })
}

/// Middleware rejecting requests without the configured key
pub async fn require_api_key(
    State(host): State<Arc<ServerHost>>,
    req: Request,
    next: Next,
) -> Response {
    let presented = presented_key(req.headers(), req.uri().query());

    match presented {
        Some(key) if key == host.api_key() => next.run(req).await,
        Some(_) => {
            tracing::warn!(path = %req.uri().path(), "rejected request with wrong API key");
            unauthorized("Invalid API key")
        }
        None => {
            tracing::debug!(path = %req.uri().path(), "rejected request without API key");
            unauthorized("No API key found in request")
        }
    }
}

fn unauthorized(message: &str) -> Response {
    InviteError::from(RequestError::Unauthorized {
        message: message.to_string(),
    })
    .into_response()
}

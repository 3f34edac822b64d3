//! The fixed JSON surface external-dns speaks to a webhook provider.
//!
//! Two response media types are negotiated via `Accept`: the plain
//! `application/json` default and the webhook-specific
//! `application/external.dns.webhook+json;version=1`; any other `Accept`
//! value is rejected with 400.

use crate::endpoint::Changes;
use crate::provider::Provider;
use axum::extract::Extension;
use bytes::Bytes;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use log::warn;
use std::sync::Arc;

/// The default negotiated media type.
pub const CONTENT_TYPE_JSON: &str = "application/json";
/// The webhook-specific negotiated media type.
pub const CONTENT_TYPE_WEBHOOK: &str = "application/external.dns.webhook+json;version=1";

/// Builds the router; `provider` is shared across requests via an
/// [`Extension`] layer.
pub fn router(provider: Arc<Provider>) -> Router {
    Router::new()
        .route("/", get(get_domain_filter))
        .route("/adjustendpoints", post(adjust_endpoints))
        .route("/healthz", get(healthz))
        .route("/records", get(list_records).post(apply_changes))
        .layer(Extension(provider))
}

/// Picks the negotiated response media type from `Accept`, or `None` if the
/// header names something this adapter doesn't speak.
fn negotiate_content_type(headers: &HeaderMap) -> Option<&'static str> {
    let accept = match headers.get(http::header::ACCEPT) {
        None => return Some(CONTENT_TYPE_JSON),
        Some(value) => value.to_str().ok()?,
    };
    // Accept may carry parameters/whitespace (e.g. "application/json; q=0.9");
    // compare just the media-type portion.
    let media_type = accept.split(',').next().unwrap_or("").trim();
    if media_type.is_empty() || media_type == "*/*" || media_type == CONTENT_TYPE_JSON {
        Some(CONTENT_TYPE_JSON)
    } else if media_type == CONTENT_TYPE_WEBHOOK {
        Some(CONTENT_TYPE_WEBHOOK)
    } else {
        None
    }
}

async fn get_domain_filter(headers: HeaderMap, Extension(provider): Extension<Arc<Provider>>) -> Response {
    let content_type = match negotiate_content_type(&headers) {
        Some(content_type) => content_type,
        None => return (StatusCode::BAD_REQUEST, "unsupported Accept header").into_response(),
    };
    let filter = provider.get_domain_filter().await;
    let body = match serde_json::to_vec(&filter) {
        Ok(body) => body,
        Err(e) => return unprocessable(e),
    };
    http::Response::builder()
        .status(StatusCode::OK)
        .header(http::header::CONTENT_TYPE, content_type)
        .body(axum::body::boxed(axum::body::Full::from(body)))
        .unwrap()
}

async fn adjust_endpoints(Extension(provider): Extension<Arc<Provider>>, body: Bytes) -> Response {
    let endpoints = match serde_json::from_slice(&body) {
        Ok(endpoints) => endpoints,
        Err(e) => return unprocessable(e),
    };
    let adjusted = provider.adjust_endpoints(endpoints).await;
    axum::Json(adjusted).into_response()
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn list_records(Extension(provider): Extension<Arc<Provider>>) -> Response {
    match provider.list_records().await {
        Ok(endpoints) => axum::Json(endpoints).into_response(),
        Err(e) => {
            warn!("list records failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn apply_changes(Extension(provider): Extension<Arc<Provider>>, body: Bytes) -> Response {
    let changes: Changes = match serde_json::from_slice(&body) {
        Ok(changes) => changes,
        Err(e) => return unprocessable(e),
    };
    if let Err(e) = provider.apply_changes(changes).await {
        warn!("apply changes failed: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }
    StatusCode::NO_CONTENT.into_response()
}

fn unprocessable(e: serde_json::Error) -> Response {
    warn!("request body failed validation: {}", e);
    (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response()
}

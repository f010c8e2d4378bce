use axum::{
    body::Body,
    extract::Request,
    http::{header, uri::Uri, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

/// Largest response body that gets an ETag.
const ETAG_MAX_BODY: usize = 4 * 1024 * 1024;

/// Collapse duplicate slashes and drop a trailing slash.
pub async fn normalize_path(mut req: Request, next: Next) -> Response {
    let uri = req.uri();
    let path = uri.path();

    let mut normalized = path.to_string();
    while normalized.contains("//") {
        normalized = normalized.replace("//", "/");
    }
    if normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }

    if normalized != path {
        let mut parts = uri.clone().into_parts();
        let new_path_and_query = match uri.query() {
            Some(query) => format!("{}?{}", normalized, query),
            None => normalized,
        };

        if let Ok(new_uri) = new_path_and_query.parse::<Uri>() {
            parts.path_and_query = new_uri.into_parts().path_and_query;
            if let Ok(new_uri) = Uri::from_parts(parts) {
                *req.uri_mut() = new_uri;
            }
        }
    }

    next.run(req).await
}

pub async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let content_length = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);

    info!(
        method = %method,
        url = %uri,
        status = status,
        length = content_length,
        "HTTP request"
    );

    response
}

/// Strong ETag over successful GET responses. A matching `If-None-Match`
/// turns the response into a 304.
pub async fn etag_validation(req: Request, next: Next) -> Response {
    if req.method() != Method::GET {
        return next.run(req).await;
    }

    let if_none_match = req
        .headers()
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let response = next.run(req).await;
    if response.status() != StatusCode::OK || response.headers().contains_key(header::ETAG) {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    let bytes = match axum::body::to_bytes(body, ETAG_MAX_BODY).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Failed to buffer response body for ETag: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let etag = format!("\"{}\"", hex::encode(Sha256::digest(&bytes)));
    if let Ok(value) = HeaderValue::from_str(&etag) {
        parts.headers.insert(header::ETAG, value);
    }

    if let Some(client_etag) = if_none_match {
        if etags_match(&client_etag, &etag) {
            let mut not_modified = Response::new(Body::empty());
            *not_modified.status_mut() = StatusCode::NOT_MODIFIED;

            let headers = not_modified.headers_mut();
            for name in [header::ETAG, header::CACHE_CONTROL, header::VARY] {
                if let Some(value) = parts.headers.get(&name) {
                    headers.insert(name, value.clone());
                }
            }
            return not_modified;
        }
    }

    Response::from_parts(parts, Body::from(bytes))
}

fn etags_match(client_etag: &str, server_etag: &str) -> bool {
    let server_stripped = server_etag.strip_prefix("W/").unwrap_or(server_etag);

    client_etag.split(',').map(str::trim).any(|etag| {
        etag == "*" || etag == server_etag || etag.strip_prefix("W/").unwrap_or(etag) == server_stripped
    })
}

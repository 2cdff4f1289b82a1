//! Cache-Control header for served media files.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request},
    middleware::Next,
    response::IntoResponse,
};

/// Marks successful responses as cacheable for `max_age_sec` seconds.
/// A zero age sends `no-cache`, so replaced uploads show up immediately.
pub async fn http_cache(
    State(max_age_sec): State<usize>,
    request: Request<Body>,
    next: Next,
) -> impl IntoResponse {
    let response = next.run(request).await.into_response();
    if !response.status().is_success() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let value = if max_age_sec == 0 {
        HeaderValue::from_static("no-cache")
    } else {
        // Digits and ASCII only, always a valid header value.
        HeaderValue::from_str(&format!("max-age={}", max_age_sec))
            .unwrap_or_else(|_| HeaderValue::from_static("no-cache"))
    };
    parts.headers.insert(header::CACHE_CONTROL, value);

    axum::http::Response::from_parts(parts, body)
}

//! Request inspection helpers.
//!
//! # Responsibilities
//! - Find the host a request is addressed to
//! - Read the correlation id stamped by the request-id layer
//!
//! # Design Decisions
//! - The `Host` header wins; HTTP/2 requests fall back to the URI authority
//! - Request ID added as early as possible for tracing

use axum::http::{header, HeaderName, Request};

/// Header carrying the per-request correlation id.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Host the request is addressed to, port included if the client sent one.
pub fn request_host<B>(request: &Request<B>) -> Option<&str> {
    request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| request.uri().host())
}

/// Correlation id, or `"-"` before the request-id layer has run.
pub fn request_id<B>(request: &Request<B>) -> &str {
    request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_host_header_preferred() {
        let req = Request::builder()
            .uri("http://uri.example/x")
            .header("Host", "header.example:8080")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_host(&req), Some("header.example:8080"));
    }

    #[test]
    fn test_uri_authority_fallback() {
        let req = Request::builder()
            .uri("http://uri.example:8443/x")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_host(&req), Some("uri.example"));

        let bare = Request::builder().uri("/x").body(Body::empty()).unwrap();
        assert_eq!(request_host(&bare), None);
        assert_eq!(request_id(&bare), "-");
    }
}

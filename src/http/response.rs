//! Turning resolved handles into HTTP responses.
//!
//! # Responsibilities
//! - Serve files with length, type, validators and conditional requests
//! - Serve directories through their index page, a listing, or not-found
//! - Map resolution failures to status codes
//!
//! # Design Decisions
//! - Only GET and HEAD are served; the site is read-only
//! - Streaming responses avoid buffering entire objects
//! - The not-found page is served with status 404, everything else with 200

use axum::body::Body;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use html_escape::encode_text;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::store::DirEntry;
use crate::vfs::path::{clean, decode_path};
use crate::vfs::{Fetch, OpenError, Resolution, Resource, ResourceHandle, VirtualFileSystem};

/// Most entries rendered in one directory listing.
pub const LISTING_LIMIT: usize = 1000;

/// Characters escaped in listing links.
const LINK_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Serve `request` out of `fs`.
pub async fn serve_site(fs: &VirtualFileSystem, request: &Parts) -> Response {
    let method = &request.method;
    if method != Method::GET && method != Method::HEAD {
        return (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, "GET, HEAD")],
            "Method Not Allowed",
        )
            .into_response();
    }

    let fetch = if request.method == Method::HEAD {
        Fetch::Metadata
    } else {
        Fetch::Content
    };

    match fs.open_with(request.uri.path(), fetch).await {
        Ok(handle) if handle.is_dir() => serve_directory(fs, handle, fetch, request).await,
        Ok(handle) => serve_handle(handle, request),
        Err(OpenError::BadRequest(_)) => (StatusCode::BAD_REQUEST, "Bad Request").into_response(),
        Err(OpenError::NotExist) => not_found(),
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}

async fn serve_directory(
    fs: &VirtualFileSystem,
    handle: ResourceHandle,
    fetch: Fetch,
    request: &Parts,
) -> Response {
    let path = request.uri.path();
    if !path.ends_with('/') {
        return redirect(&directory_location(path, request.uri.query()));
    }

    let indexes: &[&str] = if fs.is_spa() {
        &["index.html"]
    } else {
        &["index.html", "index.htm"]
    };

    let mut fallback = None;
    for index in indexes {
        match fs.lookup(&format!("{path}{index}"), fetch).await {
            Ok(found) if found.resolution() == Resolution::Requested => {
                return serve_handle(found, request)
            }
            Ok(other) if !other.is_dir() && fallback.is_none() => fallback = Some(other),
            _ => {}
        }
    }

    if fs.browse() {
        if let Some(prefix) = handle.directory_prefix() {
            match fs.read_dir(prefix, LISTING_LIMIT).await {
                Ok(entries) => return listing(path, &entries, &request.method),
                Err(e) => {
                    tracing::warn!(site = %fs.name(), prefix = %prefix, error = %e, "Directory listing failed");
                }
            }
        }
    }

    // Single-page apps answer with their shell, multi-page sites with the 404 page.
    match fallback {
        Some(fallback) => serve_handle(fallback, request),
        None => not_found(),
    }
}

/// Slash-terminated, site-relative form of a directory path.
///
/// Built from the cleaned path so the result is always a single-slash
/// absolute path on this host.
fn directory_location(path: &str, query: Option<&str>) -> String {
    let cleaned = decode_path(path)
        .map(|decoded| clean(&decoded))
        .unwrap_or_default();
    let mut location = String::from("/");
    if !cleaned.is_empty() {
        location.push_str(&utf8_percent_encode(&cleaned, LINK_SEGMENT).to_string());
        location.push('/');
    }
    if let Some(query) = query {
        location.push('?');
        location.push_str(query);
    }
    location
}

fn redirect(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, value)]).into_response(),
        Err(_) => (StatusCode::BAD_REQUEST, "Bad Request").into_response(),
    }
}

fn serve_handle(handle: ResourceHandle, request: &Parts) -> Response {
    let status = if handle.resolution() == Resolution::NotFoundPage {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::OK
    };
    serve_file(handle, status, request)
}

/// Write a file resource with the given status.
///
/// Conditional requests are only honoured for `200 OK` answers.
pub fn serve_file<R: Resource>(resource: R, status: StatusCode, request: &Parts) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        content_type_header(resource.content_type(), resource.name()),
    );
    if let Some(value) = resource.modified().and_then(|dt| HeaderValue::from_str(&http_date(dt)).ok()) {
        headers.insert(header::LAST_MODIFIED, value);
    }
    if let Some(value) = resource.etag().and_then(|e| HeaderValue::from_str(e).ok()) {
        headers.insert(header::ETAG, value);
    }

    if status == StatusCode::OK && is_not_modified(&request.headers, resource.etag(), resource.modified()) {
        return (StatusCode::NOT_MODIFIED, headers).into_response();
    }

    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(resource.size()));

    let body = if request.method == Method::HEAD {
        Body::empty()
    } else {
        match resource.into_content() {
            Some(stream) => Body::from_stream(stream),
            None => Body::empty(),
        }
    };

    (status, headers, body).into_response()
}

fn is_not_modified(
    headers: &HeaderMap,
    etag: Option<&str>,
    modified: Option<DateTime<Utc>>,
) -> bool {
    // If-None-Match takes precedence over If-Modified-Since.
    if let Some(if_none_match) = headers.get(header::IF_NONE_MATCH).and_then(|v| v.to_str().ok()) {
        return etag.is_some_and(|etag| {
            if_none_match
                .split(',')
                .map(str::trim)
                .any(|tag| tag == "*" || tag.trim_start_matches("W/") == etag.trim_start_matches("W/"))
        });
    }

    let since = headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| DateTime::parse_from_rfc2822(v).ok());
    match (since, modified) {
        (Some(since), Some(modified)) => modified.timestamp() <= since.timestamp(),
        _ => false,
    }
}

/// RFC 7231 IMF-fixdate.
pub fn http_date(dt: DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// The stored type unless it is the generic binary default, else a guess.
fn content_type_header(stored: Option<&str>, name: &str) -> HeaderValue {
    stored
        .filter(|t| !matches!(*t, "binary/octet-stream" | "application/octet-stream"))
        .and_then(|t| HeaderValue::from_str(t).ok())
        .or_else(|| HeaderValue::from_str(&guess_content_type(name)).ok())
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"))
}

/// Guess content type from file extension. Text types are labelled UTF-8.
pub fn guess_content_type(name: &str) -> String {
    let mime = mime_guess::from_path(name).first_or_octet_stream();
    if mime.type_() == "text" && mime.get_param("charset").is_none() {
        format!("{mime}; charset=utf-8")
    } else {
        mime.to_string()
    }
}

fn listing(path: &str, entries: &[DirEntry], method: &Method) -> Response {
    let headers = [(header::CONTENT_TYPE, "text/html; charset=utf-8")];
    if method == Method::HEAD {
        return (StatusCode::OK, headers).into_response();
    }
    (StatusCode::OK, headers, render_listing(path, entries)).into_response()
}

/// Render a minimal HTML index of `entries` under `path`.
pub fn render_listing(path: &str, entries: &[DirEntry]) -> String {
    let title = encode_text(path);
    let mut html = format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Index of {title}</title></head>\n<body>\n<h1>Index of {title}</h1>\n<ul>\n"
    );
    if path != "/" {
        html.push_str("<li><a href=\"../\">../</a></li>\n");
    }
    for entry in entries {
        let (name, suffix) = match entry {
            DirEntry::Directory { name } => (name.as_str(), "/"),
            DirEntry::File { name, .. } => (name.as_str(), ""),
        };
        let href = utf8_percent_encode(name, LINK_SEGMENT);
        html.push_str(&format!(
            "<li><a href=\"{href}{suffix}\">{}{suffix}</a></li>\n",
            encode_text(name)
        ));
    }
    html.push_str("</ul>\n</body>\n</html>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::http::Request;
    use chrono::TimeZone;
    use metrics_exporter_prometheus::PrometheusBuilder;

    use crate::config::SiteConfig;
    use crate::store::InMemoryStore;

    fn parts(method: Method, uri: &str) -> Parts {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    fn docs_site(store: &Arc<InMemoryStore>) -> VirtualFileSystem {
        let site = SiteConfig::new(vec!["b.example".into()], "", false);
        VirtualFileSystem::new("b.example", &site, "websites", store.clone())
    }

    #[test]
    fn test_directory_location_is_single_slash() {
        assert_eq!(directory_location("/docs", None), "/docs/");
        assert_eq!(directory_location("/docs", Some("a=1")), "/docs/?a=1");
        assert_eq!(directory_location("//attacker.example/../docs", None), "/docs/");
        assert_eq!(directory_location("/./a//b", None), "/a/b/");
        assert_eq!(directory_location("/caf%C3%A9", None), "/caf%C3%A9/");
        assert_eq!(directory_location("/\\evil.example", None), "/%5Cevil.example/");
    }

    #[test]
    fn test_directory_request_counts_one_resolution() {
        let store = Arc::new(InMemoryStore::new().with_object("websites", "docs/guide.txt", "g"));
        let fs = docs_site(&store);
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        // No index: the directory path tries index.html and index.htm as well.
        let status = metrics::with_local_recorder(&recorder, || {
            runtime.block_on(async { serve_site(&fs, &parts(Method::GET, "/docs/")).await.status() })
        });
        assert_eq!(status, StatusCode::NOT_FOUND);

        let rendered = handle.render();
        let resolutions: Vec<&str> = rendered
            .lines()
            .filter(|line| line.starts_with("s3web_resolutions_total{"))
            .collect();
        assert_eq!(resolutions.len(), 1, "{rendered}");
        assert!(resolutions[0].contains("outcome=\"directory\""));
        assert!(resolutions[0].ends_with(" 1"));
    }

    #[tokio::test]
    async fn test_head_skips_object_fetch() {
        let store = Arc::new(InMemoryStore::new().with_object("websites", "about.html", "about"));
        let fs = docs_site(&store);

        let response = serve_site(&fs, &parts(Method::HEAD, "/about.html")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "5");
        assert_eq!(store.calls().get, 0);
        assert_eq!(store.calls().stat, 1);

        serve_site(&fs, &parts(Method::GET, "/about.html")).await;
        assert_eq!(store.calls().get, 1);
    }

    #[test]
    fn test_http_date() {
        let dt = Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap();
        assert_eq!(http_date(dt), "Sun, 06 Nov 1994 08:49:37 GMT");
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type("app/index.html"), "text/html; charset=utf-8");
        assert_eq!(guess_content_type("a/B.PNG"), "image/png");
        assert_eq!(guess_content_type("LICENSE"), "application/octet-stream");
    }

    #[test]
    fn test_stored_content_type_wins_unless_generic() {
        assert_eq!(content_type_header(Some("text/x-custom"), "a.html"), "text/x-custom");
        assert_eq!(
            content_type_header(Some("binary/octet-stream"), "a.css"),
            "text/css; charset=utf-8"
        );
        assert_eq!(content_type_header(None, "a.svg"), "image/svg+xml");
    }

    #[test]
    fn test_not_modified_by_etag() {
        let mut headers = HeaderMap::new();
        headers.insert(header::IF_NONE_MATCH, HeaderValue::from_static("\"x\", W/\"abc\""));
        assert!(is_not_modified(&headers, Some("\"abc\""), None));
        assert!(!is_not_modified(&headers, Some("\"def\""), None));
        assert!(!is_not_modified(&headers, None, None));
    }

    #[test]
    fn test_not_modified_by_date() {
        let modified = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::IF_MODIFIED_SINCE,
            HeaderValue::from_str(&http_date(modified)).unwrap(),
        );
        assert!(is_not_modified(&headers, None, Some(modified)));

        let later = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert!(!is_not_modified(&headers, None, Some(later)));
        assert!(!is_not_modified(&HeaderMap::new(), None, Some(modified)));
    }

    #[test]
    fn test_render_listing_escapes() {
        let entries = vec![
            DirEntry::Directory { name: "img".into() },
            DirEntry::File {
                name: "a <b>.txt".into(),
                size: 1,
                last_modified: None,
            },
        ];
        let html = render_listing("/pub/", &entries);
        assert!(html.contains("<title>Index of /pub/</title>"));
        assert!(html.contains("<a href=\"../\">../</a>"));
        assert!(html.contains("<a href=\"img/\">img/</a>"));
        assert!(html.contains("<a href=\"a%20%3Cb%3E.txt\">a &lt;b&gt;.txt</a>"));

        let root = render_listing("/", &[]);
        assert!(!root.contains("../"));
    }
}

//! HTTP routes.
//!
//! Every content route is a registry lookup: a hit is written back with the
//! route's content type, and a miss, including any path that would leave the
//! registry root, is a 404.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, MethodRouter};
use axum::Router;
use http::{header, StatusCode, Uri};
use mediasrv_registry::{Bytes, CanonicalPath, Registry};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

type AppRouter = Router<Arc<Registry>>;

const INDEX: &str = "html/index.html";

/// Fixed routes: URL path, registry key, content type.
const FILES: &[(&str, &str, &str)] = &[
    ("/", INDEX, "text/html"),
    ("/browserconfig.xml", "browserconfig.xml", "application/xml"),
    ("/manifest.json", "manifest.json", "application/json"),
    (
        "/android-chrome-192x192.png",
        "img/favicon/android-chrome-192x192.png",
        "image/png",
    ),
    (
        "/android-chrome-512x512.png",
        "img/favicon/android-chrome-512x512.png",
        "image/png",
    ),
    (
        "/apple-touch-icon.png",
        "img/favicon/apple-touch-icon.png",
        "image/png",
    ),
    ("/favicon.ico", "img/favicon/favicon.ico", "image/x-icon"),
    ("/favicon.png", "img/favicon/favicon.png", "image/png"),
    ("/favicon-16x16.png", "img/favicon/favicon-16x16.png", "image/png"),
    ("/favicon-32x32.png", "img/favicon/favicon-32x32.png", "image/png"),
    (
        "/mstile-150x150.png",
        "img/favicon/mstile-150x150.png",
        "image/png",
    ),
    (
        "/safari-pinned-tab.svg",
        "img/favicon/safari-pinned-tab.svg",
        "image/svg+xml",
    ),
];

/// Directory routes: top-level directory and content type. `None` picks the
/// type from the file extension.
const DIRECTORIES: &[(&str, Option<&str>)] = &[
    ("css", Some("text/css")),
    ("html", Some("text/html")),
    ("js", Some("text/javascript")),
    ("img", None),
];

/// Routes without middleware, suitable for driving directly in tests.
pub fn router(registry: Arc<Registry>) -> Router {
    let mut router: AppRouter = Router::new();

    for &(route, key, content_type) in FILES {
        router = router.route(route, file(key, content_type));
    }

    for &(directory, content_type) in DIRECTORIES {
        router = router.route(
            &format!("/{}/*rest", directory),
            under_directory(directory, content_type),
        );
    }

    router
        .route("/song/*rest", get(song))
        .route("/station/*rest", get(station))
        .route("/search/*rest", get(search))
        .fallback(index)
        .with_state(registry)
}

/// The full application: routes plus request tracing and a request timeout.
pub fn app(registry: Arc<Registry>, request_timeout: Duration) -> Router {
    router(registry)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
}

fn file(key: &'static str, content_type: &'static str) -> MethodRouter<Arc<Registry>> {
    get(move |State(registry): State<Arc<Registry>>| async move {
        respond(registry.get(key), content_type)
    })
}

/// Any path no other route claims gets the index page.
async fn index(State(registry): State<Arc<Registry>>) -> Response {
    respond(registry.get(INDEX), "text/html")
}

fn under_directory(
    directory: &'static str,
    content_type: Option<&'static str>,
) -> MethodRouter<Arc<Registry>> {
    get(move |State(registry): State<Arc<Registry>>, uri: Uri| async move {
        // `/css/../html/x` canonicalizes to `html/x`, which this route does
        // not own.
        let key = match CanonicalPath::parse(uri.path()) {
            Ok(key) if key.components().next() == Some(directory) => key,
            _ => return StatusCode::NOT_FOUND.into_response(),
        };
        let content_type =
            content_type.unwrap_or_else(|| content_type_for_extension(key.extension()));
        respond(registry.get_canonical(&key), content_type)
    })
}

fn respond(body: Option<Bytes>, content_type: &str) -> Response {
    match body {
        Some(body) => ([(header::CONTENT_TYPE, content_type)], body).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

fn content_type_for_extension(extension: Option<&str>) -> &'static str {
    match extension.map(str::to_ascii_lowercase).as_deref() {
        Some("png") => "image/png",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Placeholder until songs are streamed from the media database.
async fn song() -> impl IntoResponse {
    (StatusCode::PARTIAL_CONTENT, [(header::ACCEPT_RANGES, "bytes")])
}

async fn station() -> StatusCode {
    StatusCode::OK
}

async fn search() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_types_by_extension() {
        assert_eq!(content_type_for_extension(Some("png")), "image/png");
        assert_eq!(content_type_for_extension(Some("PNG")), "image/png");
        assert_eq!(content_type_for_extension(Some("svg")), "image/svg+xml");
        assert_eq!(content_type_for_extension(Some("ico")), "image/x-icon");
        assert_eq!(content_type_for_extension(Some("jpeg")), "image/jpeg");
        assert_eq!(
            content_type_for_extension(Some("tar")),
            "application/octet-stream"
        );
        assert_eq!(content_type_for_extension(None), "application/octet-stream");
    }

    #[test]
    fn fixed_routes_are_unique() {
        let mut routes: Vec<_> = FILES.iter().map(|(route, _, _)| *route).collect();
        routes.sort_unstable();
        routes.dedup();
        assert_eq!(routes.len(), FILES.len());
    }
}

// Each integration test file is a separate binary; helpers not used in every
// binary would otherwise trigger dead_code warnings from clippy.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{self, post},
    Router,
};
use bytes::Bytes;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use linksync_server::{config::PreviewConfig, handlers, preview::Previewer, state::AppState};

/// Default limits, but no DNS lookups so blocked-host tests stay offline.
pub fn offline_config() -> PreviewConfig {
    PreviewConfig {
        resolve_hosts: false,
        ..PreviewConfig::default()
    }
}

/// Allows fetching the loopback fixture server started by [`spawn_upstream`].
pub fn local_config() -> PreviewConfig {
    PreviewConfig {
        allow_private_hosts: true,
        resolve_hosts: false,
        fetch_timeout: Duration::from_secs(2),
        ..PreviewConfig::default()
    }
}

/// Build the application router around a previewer with `config`.
pub fn create_test_app(config: PreviewConfig) -> Router {
    let state = AppState {
        previewer: Previewer::new(config).expect("failed to build previewer"),
    };
    Router::new()
        .route("/health", routing::get(handlers::health_check))
        .route(
            "/api/link-preview",
            post(handlers::link_preview::create_link_preview),
        )
        .with_state(state)
}

// ── Upstream fixture site ────────────────────────────────────────────────────

pub const PRODUCT_PAGE: &str = r#"<!doctype html>
<html><head>
  <title>Amazon.com</title>
  <meta property="og:title" content="Amazon.com">
  <meta name="title" content="Cast Iron Skillet, 12 inch">
  <meta property="og:site_name" content="Example Shop">
  <meta property="og:image" content="https://m.media-amazon.com/images/G/01/share-icons/amazon.png">
  <link rel="icon" href="/favicon.ico">
  <link rel="icon" type="image/svg+xml" href="/icon.svg">
</head><body>
  <img src="/nav-logo.png" alt="">
  <img id="landingImage" src="/images/skillet._SX300_.jpg"
       data-a-dynamic-image="{&quot;/images/skillet._SX900_.jpg&quot;:[900,900]}">
</body></html>"#;

pub const ARTICLE_PAGE: &str = r#"<html><head>
  <meta property="og:title" content="Widget">
</head></html>"#;

pub const LARGE_PAGE_BYTES: usize = 1_100_000;

fn upstream_router() -> Router {
    Router::new()
        .route("/product", routing::get(|| async { Html(PRODUCT_PAGE) }))
        .route("/article", routing::get(|| async { Html(ARTICLE_PAGE) }))
        .route("/moved", routing::get(|| async { Redirect::temporary("/article") }))
        .route(
            "/to-private",
            routing::get(|| async { Redirect::temporary("http://10.0.0.1/") }),
        )
        .route("/plain", routing::get(|| async { "just text" }))
        .route(
            "/untyped",
            routing::get(|| async { Response::new(Body::from("<title>no header</title>")) }),
        )
        .route(
            "/huge",
            routing::get(|| async { Html("a".repeat(LARGE_PAGE_BYTES)) }),
        )
        .route("/stream", routing::get(streamed_page))
        .route(
            "/slow",
            routing::get(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Html("<title>late</title>")
            }),
        )
        .route(
            "/echo-agent",
            routing::get(|headers: HeaderMap| async move {
                let agent = headers
                    .get(header::USER_AGENT)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                Html(format!("<title>{agent}</title>"))
            }),
        )
}

/// Chunked HTML without a content-length header.
async fn streamed_page() -> impl IntoResponse {
    let chunks: Vec<Result<Bytes, std::io::Error>> = (0..8)
        .map(|i| Ok(Bytes::from(format!("<p>chunk {i} {}</p>", "x".repeat(40)))))
        .collect();
    (
        [(header::CONTENT_TYPE, "text/html")],
        Body::from_stream(futures::stream::iter(chunks)),
    )
}

/// Serve the fixture site on an ephemeral loopback port.
pub async fn spawn_upstream() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind upstream listener");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, upstream_router()).await.unwrap();
    });
    addr
}

// ── Request helpers ──────────────────────────────────────────────────────────

pub async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    post_raw(app, uri, &body.to_string()).await
}

pub async fn post_raw(app: Router, uri: &str, body: &str) -> (StatusCode, Value) {
    let req = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, req).await
}

pub async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let req = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, req).await
}

/// POST `{ "url": target }` to the preview route.
pub async fn request_preview(app: Router, target: &str) -> (StatusCode, Value) {
    post_json(
        app,
        "/api/link-preview",
        serde_json::json!({ "url": target }),
    )
    .await
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

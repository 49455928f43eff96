use std::net::SocketAddr;

use axum::{
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use axum_prometheus::PrometheusMetricLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use linksync_server::config::Config;
use linksync_server::preview::Previewer;
use linksync_server::rate_limit::{create_rate_limiter, rate_limit};
use linksync_server::state::AppState;
use linksync_server::handlers;

#[tokio::main]
async fn main() {
    // Initialize tracing: JSON in production, human-readable in dev.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "linksync_server=info,tower_http=info"
            .parse()
            .unwrap()
    });

    if std::env::var("APP_ENV").as_deref() == Ok("production") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("LinkSync preview server starting...");

    // Fatal if a numeric setting or a generic-image pattern does not parse.
    let config = Config::from_env().expect("Failed to load configuration");
    info!(
        timeout_secs = config.preview.fetch_timeout.as_secs(),
        max_html_bytes = config.preview.max_html_bytes,
        "Configuration loaded"
    );

    if config.preview.allow_private_hosts {
        tracing::warn!("LINK_PREVIEW_ALLOW_PRIVATE_HOSTS is set: private and loopback targets will be fetched");
    }

    // CORS: permissive in dev, restricted to ALLOWED_ORIGINS in production.
    let cors = if config.is_dev {
        info!("CORS: permissive (dev mode)");
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        if origins.is_empty() {
            tracing::warn!(
                "CORS: restrictive (production mode). \
                 Cross-origin requests will be denied. \
                 Set ALLOWED_ORIGINS to allow specific origins."
            );
        }
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([axum::http::header::CONTENT_TYPE])
    };

    let addr = config.server_addr();
    let limiter = create_rate_limiter(config.rate_limit_per_minute);

    let app_state = AppState {
        previewer: Previewer::new(config.preview).expect("Failed to build HTTP client"),
    };

    // Prometheus metrics layer
    let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();

    // Build router
    let app = Router::new()
        // Health check + metrics
        .route("/health", get(handlers::health_check))
        .route(
            "/metrics",
            get(move || async move { metric_handle.render() }),
        )
        // Link preview (rate limited per client IP)
        .route(
            "/api/link-preview",
            post(handlers::link_preview::create_link_preview)
                .layer(middleware::from_fn_with_state(limiter, rate_limit)),
        )
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(prometheus_layer)
        .layer(cors)
        .with_state(app_state);

    // Start server
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server failed to start");
}

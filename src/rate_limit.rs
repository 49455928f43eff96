//! Per-client-IP rate limiting (GCRA) for the preview route.
//!
//! Every preview costs an outbound fetch, so callers get a fixed number of
//! requests per minute keyed by their socket address.

use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::{clock::DefaultClock, state::keyed::DefaultKeyedStateStore, Quota, RateLimiter};

use crate::error::AppError;

pub type KeyedRateLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

/// `per_minute` requests per IP; zero is treated as one.
pub fn create_rate_limiter(per_minute: u32) -> Arc<KeyedRateLimiter> {
    let quota = NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN);
    Arc::new(RateLimiter::keyed(Quota::per_minute(quota)))
}

/// Returns 429 once the client has used up its quota.
///
/// Without `ConnectInfo` (e.g. in tests) every request counts against
/// 127.0.0.1.
pub async fn rate_limit(
    State(limiter): State<Arc<KeyedRateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip())
        .unwrap_or(IpAddr::from([127, 0, 0, 1]));

    if limiter.check_key(&ip).is_err() {
        tracing::warn!(ip = %ip, path = %request.uri().path(), "Rate limit exceeded");
        return AppError::RateLimited.into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Router};
    use tower::ServiceExt;

    fn app(per_minute: u32) -> Router {
        Router::new().route(
            "/",
            get(|| async { "ok" }).layer(middleware::from_fn_with_state(
                create_rate_limiter(per_minute),
                rate_limit,
            )),
        )
    }

    async fn status(app: &Router, ip: Option<[u8; 4]>) -> StatusCode {
        let mut req = axum::http::Request::builder()
            .uri("/")
            .body(Body::empty())
            .unwrap();
        if let Some(ip) = ip {
            req.extensions_mut()
                .insert(ConnectInfo(SocketAddr::from((ip, 40000))));
        }
        app.clone().oneshot(req).await.unwrap().status()
    }

    #[tokio::test]
    async fn second_request_over_quota_is_rejected() {
        let app = app(1);
        assert_eq!(status(&app, None).await, StatusCode::OK);
        assert_eq!(status(&app, None).await, StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn quotas_are_per_ip() {
        let app = app(1);
        assert_eq!(status(&app, Some([203, 0, 113, 1])).await, StatusCode::OK);
        assert_eq!(status(&app, Some([203, 0, 113, 2])).await, StatusCode::OK);
        assert_eq!(
            status(&app, Some([203, 0, 113, 1])).await,
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn zero_quota_is_clamped() {
        let limiter = create_rate_limiter(0);
        let ip = IpAddr::from([198, 51, 100, 7]);
        assert!(limiter.check_key(&ip).is_ok());
        assert!(limiter.check_key(&ip).is_err());
    }
}

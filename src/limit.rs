//! Rate limiting for write-heavy endpoints (submit, vote).
//!
//! Keyed by bearer token so that many players behind a shared NAT don't
//! throttle each other.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, Response, StatusCode},
    middleware::Next,
};
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;

/// Fixed-window rate limiter state
#[derive(Debug, Clone)]
pub struct RateLimiter {
    /// Map of token to (request count, window start)
    requests: Arc<RwLock<HashMap<String, (u32, Instant)>>>,
    /// Maximum requests per window
    max_requests: u32,
    /// Time window duration
    window: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(30, Duration::from_secs(10)) // 30 requests per 10 seconds
    }
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            requests: Arc::new(RwLock::new(HashMap::new())),
            max_requests,
            window,
        }
    }

    /// Load limits from RATE_LIMIT_MAX / RATE_LIMIT_WINDOW (seconds).
    pub fn from_env() -> Self {
        let max_requests = std::env::var("RATE_LIMIT_MAX")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        let window_secs = std::env::var("RATE_LIMIT_WINDOW")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        tracing::info!(max_requests, window_secs, "Rate limit config loaded");

        Self::new(max_requests, Duration::from_secs(window_secs))
    }

    /// Check if a request should be allowed
    /// Returns true if allowed, false if rate limited
    pub async fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut requests = self.requests.write().await;

        match requests.get_mut(key) {
            Some((count, window_start)) => {
                if now.duration_since(*window_start) >= self.window {
                    *count = 1;
                    *window_start = now;
                    true
                } else if *count >= self.max_requests {
                    false
                } else {
                    *count += 1;
                    true
                }
            }
            None => {
                requests.insert(key.to_string(), (1, now));
                true
            }
        }
    }

    /// Clean up old entries
    pub async fn cleanup(&self) {
        let now = Instant::now();
        let mut requests = self.requests.write().await;
        requests.retain(|_, (_, window_start)| now.duration_since(*window_start) < self.window * 2);
    }
}

/// Spawn a background task that periodically prunes stale counters, so the
/// map doesn't grow with every token ever seen.
pub fn spawn_cleanup_task(limiter: Arc<RateLimiter>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(limiter.window * 2);
        loop {
            interval.tick().await;
            limiter.cleanup().await;
        }
    });
}

/// Build a 429 Too Many Requests response
fn rate_limited() -> Response<Body> {
    Response::builder()
        .status(StatusCode::TOO_MANY_REQUESTS)
        .header(header::CONTENT_TYPE, "text/plain")
        .header(header::RETRY_AFTER, "10")
        .body(Body::from("Rate limit exceeded. Please slow down."))
        .unwrap()
}

/// Middleware applying the rate limit, keyed by the Authorization header.
/// Requests without a token fall through; the auth extractor rejects
/// those anyway.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let key = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    if let Some(key) = key {
        if !limiter.check(&key).await {
            tracing::warn!("Rate limited");
            return rate_limited();
        }
    }

    next.run(request).await
}

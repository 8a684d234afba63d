//! In-memory rate limiting for run endpoints.
//!
//! Fixed windows per client: the first request opens a window of
//! `run_window` seconds, and at most `run_limit` requests are admitted until
//! it closes.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;
use crate::state::AppState;

/// Number of buckets at which expired ones are swept
const SWEEP_THRESHOLD: usize = 10_000;

/// Rate limit information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub limit: u64,
    pub remaining: u64,
    /// Seconds until the window resets
    pub reset: u64,
    pub allowed: bool,
}

#[derive(Debug)]
struct RateLimitBucket {
    count: u64,
    reset_at: Instant,
}

/// Counters keyed by `"{scope}:{client}"`
#[derive(Debug, Default)]
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, RateLimitBucket>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one request against `key` and report whether it is admitted.
    pub fn check(&self, key: &str, limit: u64, window: Duration) -> RateLimitInfo {
        self.check_at(key, limit, window, Instant::now())
    }

    fn check_at(&self, key: &str, limit: u64, window: Duration, now: Instant) -> RateLimitInfo {
        let mut buckets = self
            .buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if buckets.len() >= SWEEP_THRESHOLD {
            buckets.retain(|_, bucket| bucket.reset_at > now);
        }

        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| RateLimitBucket {
                count: 0,
                reset_at: now + window,
            });
        if bucket.reset_at <= now {
            bucket.count = 0;
            bucket.reset_at = now + window;
        }

        let reset = secs_until(bucket.reset_at, now);
        if bucket.count >= limit {
            return RateLimitInfo {
                limit,
                remaining: 0,
                reset,
                allowed: false,
            };
        }

        bucket.count += 1;
        RateLimitInfo {
            limit,
            remaining: limit - bucket.count,
            reset,
            allowed: true,
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.buckets
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

fn secs_until(deadline: Instant, now: Instant) -> u64 {
    let left = deadline.saturating_duration_since(now);
    left.as_secs() + u64::from(left.subsec_nanos() > 0)
}

/// Add rate limit headers to response
fn add_rate_limit_headers(response: &mut Response, info: &RateLimitInfo) {
    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", HeaderValue::from(info.limit));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(info.remaining));
    headers.insert("X-RateLimit-Reset", HeaderValue::from(info.reset));
}

/// Create rate limit exceeded response
fn rate_limit_response(info: &RateLimitInfo) -> Response {
    let mut response = ApiError::RateLimitExceeded(info.reset).into_response();
    add_rate_limit_headers(&mut response, info);
    response
        .headers_mut()
        .insert("Retry-After", HeaderValue::from(info.reset));
    response
}

/// Client identifier: first `X-Forwarded-For` entry, else the peer address.
fn client_id(request: &Request) -> String {
    request
        .headers()
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ci| ci.0.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// Rate limiting middleware for run requests.
pub async fn run_rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let key = format!("run:{}", client_id(&request));
    let info = state.rate_limiter.check(
        &key,
        state.rate_limit_config.run_limit,
        Duration::from_secs(state.rate_limit_config.run_window),
    );

    if !info.allowed {
        tracing::warn!(%key, "Run rate limit exceeded");
        return rate_limit_response(&info);
    }

    let mut response = next.run(request).await;
    add_rate_limit_headers(&mut response, &info);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    const WINDOW: Duration = Duration::from_secs(60);

    #[test]
    fn test_admits_up_to_limit() {
        let limiter = RateLimiter::new();
        let now = Instant::now();

        let first = limiter.check_at("run:1.2.3.4", 2, WINDOW, now);
        assert!(first.allowed);
        assert_eq!(first.remaining, 1);
        assert_eq!(first.reset, 60);

        let second = limiter.check_at("run:1.2.3.4", 2, WINDOW, now);
        assert!(second.allowed);
        assert_eq!(second.remaining, 0);

        let third = limiter.check_at("run:1.2.3.4", 2, WINDOW, now + Duration::from_millis(1500));
        assert!(!third.allowed);
        assert_eq!(third.reset, 59);
    }

    #[test]
    fn test_window_resets() {
        let limiter = RateLimiter::new();
        let now = Instant::now();
        limiter.check_at("k", 1, WINDOW, now);
        assert!(!limiter.check_at("k", 1, WINDOW, now).allowed);

        let later = limiter.check_at("k", 1, WINDOW, now + WINDOW);
        assert!(later.allowed);
        assert_eq!(later.remaining, 0);
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = RateLimiter::new();
        let now = Instant::now();
        limiter.check_at("run:a", 1, WINDOW, now);
        assert!(limiter.check_at("run:b", 1, WINDOW, now).allowed);
    }

    #[test]
    fn test_expired_buckets_are_swept() {
        let limiter = RateLimiter::new();
        let now = Instant::now();
        for i in 0..SWEEP_THRESHOLD {
            limiter.check_at(&format!("k{}", i), 5, WINDOW, now);
        }
        assert_eq!(limiter.len(), SWEEP_THRESHOLD);

        limiter.check_at("fresh", 5, WINDOW, now + WINDOW);
        assert_eq!(limiter.len(), 1);
    }

    #[test]
    fn test_client_id_prefers_forwarded_for() {
        let request = Request::builder()
            .header("X-Forwarded-For", " 10.0.0.7 , 172.16.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_id(&request), "10.0.0.7");

        let mut request = Request::builder().body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));
        assert_eq!(client_id(&request), "127.0.0.1");

        let request = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_id(&request), "unknown");
    }
}

use axum::{
    body::Body,
    http::{HeaderValue, Request},
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::{Duration, Instant},
};
use tower::{Layer, Service};
use tracing::{debug, warn};

use crate::errors::ServiceError;

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests allowed per window
    pub requests_per_window: u32,
    /// Window size
    pub window_duration: Duration,
    /// Emit X-RateLimit-* headers on responses
    pub enable_headers: bool,
    /// Tracked-key capacity; expired windows are evicted once exceeded
    pub max_tracked_keys: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: 100,
            window_duration: Duration::from_secs(60),
            enable_headers: true,
            max_tracked_keys: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_secs: u64,
}

#[derive(Debug)]
struct WindowState {
    window_start: Instant,
    count: u32,
}

/// Fixed-window in-memory rate limiter.
///
/// Constructed once and injected (never a module-level global) so tests can
/// swap configurations freely. Eviction policy: when the tracked-key count
/// exceeds `max_tracked_keys`, all entries whose window has elapsed are
/// dropped before the new key is admitted.
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: DashMap<String, WindowState>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }

    pub fn check(&self, key: &str) -> RateLimitDecision {
        let now = Instant::now();

        if !self.windows.contains_key(key) && self.windows.len() >= self.config.max_tracked_keys {
            self.evict_expired(now);
        }

        let mut entry = self
            .windows
            .entry(key.to_string())
            .or_insert_with(|| WindowState {
                window_start: now,
                count: 0,
            });

        if now.duration_since(entry.window_start) >= self.config.window_duration {
            entry.window_start = now;
            entry.count = 0;
        }
        entry.count += 1;

        let limit = self.config.requests_per_window;
        let allowed = entry.count <= limit;
        let remaining = limit.saturating_sub(entry.count);
        let elapsed = now.duration_since(entry.window_start);
        let reset_secs = self
            .config
            .window_duration
            .saturating_sub(elapsed)
            .as_secs()
            .max(1);

        RateLimitDecision {
            allowed,
            limit,
            remaining,
            reset_secs,
        }
    }

    fn evict_expired(&self, now: Instant) {
        let window = self.config.window_duration;
        let before = self.windows.len();
        self.windows
            .retain(|_, state| now.duration_since(state.window_start) < window);
        debug!(
            evicted = before.saturating_sub(self.windows.len()),
            "rate limiter evicted expired windows"
        );
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

/// Tower layer applying the injected limiter per client key.
#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: Arc<RateLimiter>,
}

impl RateLimitLayer {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::new(config)),
        }
    }

    pub fn with_limiter(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            limiter: self.limiter.clone(),
        }
    }
}

#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    limiter: Arc<RateLimiter>,
}

fn client_key(request: &Request<Body>) -> String {
    for header in ["x-forwarded-for", "x-real-ip"] {
        if let Some(value) = request.headers().get(header).and_then(|v| v.to_str().ok()) {
            if let Some(ip) = value.split(',').next() {
                let ip = ip.trim();
                if !ip.is_empty() {
                    return ip.to_string();
                }
            }
        }
    }
    "anonymous".to_string()
}

fn apply_headers(response: &mut Response, decision: &RateLimitDecision) {
    let headers = response.headers_mut();
    if let Ok(v) = HeaderValue::from_str(&decision.limit.to_string()) {
        headers.insert("x-ratelimit-limit", v);
    }
    if let Ok(v) = HeaderValue::from_str(&decision.remaining.to_string()) {
        headers.insert("x-ratelimit-remaining", v);
    }
    if let Ok(v) = HeaderValue::from_str(&decision.reset_secs.to_string()) {
        headers.insert("x-ratelimit-reset", v);
    }
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let key = client_key(&request);
        let decision = self.limiter.check(&key);
        let enable_headers = self.limiter.config.enable_headers;

        if !decision.allowed {
            warn!(%key, "request rate limited");
            return Box::pin(async move {
                let mut response = ServiceError::RateLimitExceeded.into_response();
                if enable_headers {
                    apply_headers(&mut response, &decision);
                }
                Ok(response)
            });
        }

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        Box::pin(async move {
            let mut response = inner.call(request).await?;
            if enable_headers {
                apply_headers(&mut response, &decision);
            }
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(limit: u32, window: Duration, max_keys: usize) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            requests_per_window: limit,
            window_duration: window,
            enable_headers: true,
            max_tracked_keys: max_keys,
        })
    }

    #[test]
    fn allows_up_to_limit_then_blocks() {
        let rl = limiter(3, Duration::from_secs(60), 100);
        assert!(rl.check("1.2.3.4").allowed);
        assert!(rl.check("1.2.3.4").allowed);
        assert!(rl.check("1.2.3.4").allowed);
        let denied = rl.check("1.2.3.4");
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
    }

    #[test]
    fn keys_are_independent() {
        let rl = limiter(1, Duration::from_secs(60), 100);
        assert!(rl.check("a").allowed);
        assert!(!rl.check("a").allowed);
        assert!(rl.check("b").allowed);
    }

    #[test]
    fn window_resets_after_elapsing() {
        let rl = limiter(1, Duration::from_millis(20), 100);
        assert!(rl.check("a").allowed);
        assert!(!rl.check("a").allowed);
        std::thread::sleep(Duration::from_millis(25));
        assert!(rl.check("a").allowed);
    }

    #[test]
    fn eviction_sweep_with_nothing_expired_keeps_all_entries() {
        let rl = limiter(5, Duration::from_secs(60), 2);
        rl.check("a");
        rl.check("b");
        // Capacity reached but no window has elapsed; the sweep removes
        // nothing and admitting "c" still succeeds.
        assert!(rl.check("c").allowed);
        assert_eq!(rl.tracked_keys(), 3);
    }

    #[test]
    fn expired_windows_are_evicted_at_capacity() {
        let rl = limiter(5, Duration::from_millis(10), 2);
        rl.check("a");
        rl.check("b");
        std::thread::sleep(Duration::from_millis(15));
        // Both previous windows have elapsed; admitting "c" sweeps them out.
        rl.check("c");
        assert_eq!(rl.tracked_keys(), 1);
    }
}

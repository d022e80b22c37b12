//! Per-client fixed-window rate limiting
//!
//! Clients are keyed by the first `X-Forwarded-For` hop when present (the
//! API runs behind a proxy), else the socket peer address. Each key gets
//! `max_requests` per window; the window starts at the key's first request.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use enrollalert_core::config::LimitsSection;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::error::ApiError;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Outcome of [`RateLimiter::check`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    clients: DashMap<String, Window>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            clients: DashMap::new(),
        }
    }

    pub fn from_config(config: &LimitsSection) -> Self {
        Self::new(
            config.rate_limit_requests,
            Duration::from_secs(config.rate_limit_window_secs),
        )
    }

    /// Count one request for `key`.
    pub fn check(&self, key: &str) -> Decision {
        let now = Instant::now();
        let mut entry = self.clients.entry(key.to_owned()).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }

        if entry.count >= self.max_requests {
            let retry_after = self.window.saturating_sub(now.duration_since(entry.started));
            return Decision::Limited { retry_after };
        }

        entry.count += 1;
        Decision::Allowed {
            remaining: self.max_requests - entry.count,
        }
    }

    /// Drop windows that have expired. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.clients.len();
        self.clients
            .retain(|_, w| now.duration_since(w.started) < self.window);
        before.saturating_sub(self.clients.len())
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }

    /// Sweep expired windows once per window length until aborted.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(limiter.window.max(Duration::from_secs(1)));
            loop {
                interval.tick().await;
                let removed = limiter.sweep();
                if removed > 0 {
                    tracing::debug!(removed, "rate limit windows expired");
                }
            }
        })
    }
}

/// Rate-limit key for a request.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match (forwarded, peer) {
        (Some(ip), _) => ip.to_owned(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => "unknown".to_owned(),
    }
}

/// Middleware: reject with 429 once the client's window is used up.
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(request.headers(), peer);

    match limiter.check(&key) {
        Decision::Allowed { .. } => next.run(request).await,
        Decision::Limited { retry_after } => {
            tracing::debug!(client = %key, "rate limit exceeded");
            ApiError::RateLimited {
                retry_after_secs: retry_after.as_secs_f64().ceil() as u64,
            }
            .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{HeaderValue, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn app(limiter: Arc<RateLimiter>) -> Router {
        Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(axum::middleware::from_fn_with_state(limiter, rate_limit))
    }

    fn from(ip: &str) -> Request {
        Request::builder()
            .uri("/ping")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn forty_first_request_in_a_minute_is_rejected() {
        let limiter = Arc::new(RateLimiter::new(40, Duration::from_secs(60)));
        let app = app(Arc::clone(&limiter));

        for i in 0..40 {
            let response = app.clone().oneshot(from("10.0.0.1")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK, "request {}", i + 1);
        }

        let response = app.clone().oneshot(from("10.0.0.1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["retry-after"], "60");

        // other clients are unaffected
        let response = app.clone().oneshot(from("10.0.0.2")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    /// Log sink the fmt subscriber can write into
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rejections_are_logged_at_debug() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let app = app(Arc::new(RateLimiter::new(1, Duration::from_secs(60))));
        let response = app.clone().oneshot(from("10.0.0.7")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let response = app.oneshot(from("10.0.0.7")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let line = output
            .lines()
            .find(|l| l.contains("rate limit exceeded"))
            .expect("rejection should be logged");
        assert!(line.contains("DEBUG"), "unexpected level: {line}");
        assert!(line.contains("client=10.0.0.7"));
    }

    #[tokio::test(start_paused = true)]
    async fn window_resets_after_it_elapses() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        assert_eq!(limiter.check("a"), Decision::Allowed { remaining: 1 });
        assert_eq!(limiter.check("a"), Decision::Allowed { remaining: 0 });

        tokio::time::advance(Duration::from_secs(45)).await;
        assert_eq!(
            limiter.check("a"),
            Decision::Limited {
                retry_after: Duration::from_secs(15)
            }
        );

        tokio::time::advance(Duration::from_secs(15)).await;
        assert_eq!(limiter.check("a"), Decision::Allowed { remaining: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_drops_only_expired_windows() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        limiter.check("old");
        tokio::time::advance(Duration::from_secs(30)).await;
        limiter.check("new");
        tokio::time::advance(Duration::from_secs(31)).await;

        assert_eq!(limiter.sweep(), 1);
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn key_prefers_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        let peer: SocketAddr = "192.168.1.5:40000".parse().unwrap();

        assert_eq!(client_key(&headers, Some(peer)), "192.168.1.5");
        assert_eq!(client_key(&headers, None), "unknown");

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(client_key(&headers, Some(peer)), "203.0.113.7");
    }
}

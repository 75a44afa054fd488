//! Fixed-window request limiting per client address for `/api/` routes.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::Mutex;

use crate::app::AppState;
use crate::error::AppError;

/// Result of counting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Seconds until the window resets.
    pub reset_secs: u64,
}

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug)]
pub struct RateLimiter {
    max: u32,
    window: Duration,
    clients: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            max,
            window,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub async fn check(&self, client: &str) -> Decision {
        self.check_at(client, Instant::now()).await
    }

    /// Counts a request from `client` made at `now`.
    pub async fn check_at(&self, client: &str, now: Instant) -> Decision {
        let mut clients = self.clients.lock().await;

        // Expired windows would otherwise pile up for one-off clients.
        if clients.len() > 10_000 {
            clients.retain(|_, w| now.duration_since(w.started) < self.window);
        }

        let entry = clients.entry(client.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        let allowed = entry.count < self.max;
        if allowed {
            entry.count += 1;
        }

        let reset = self.window.saturating_sub(now.duration_since(entry.started));
        Decision {
            allowed,
            limit: self.max,
            remaining: self.max.saturating_sub(entry.count),
            reset_secs: reset.as_secs_f64().ceil() as u64,
        }
    }

    pub fn window_minutes(&self) -> u64 {
        self.window.as_secs().div_ceil(60)
    }
}

fn client_key(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn set_headers(headers: &mut HeaderMap, decision: &Decision) {
    headers.insert("ratelimit-limit", HeaderValue::from(decision.limit));
    headers.insert("ratelimit-remaining", HeaderValue::from(decision.remaining));
    headers.insert("ratelimit-reset", HeaderValue::from(decision.reset_secs));
}

/// Middleware answering 429 once a client exceeds the requests allowed in its window.
pub async fn limit_requests(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_key(&request);
    let decision = state.limiter.check(&client).await;

    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        log::warn!("Rate limit exceeded for {client}");
        AppError::RateLimited(state.limiter.window_minutes()).into_response()
    };

    set_headers(response.headers_mut(), &decision);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blocks_after_max_requests() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let now = Instant::now();

        let first = limiter.check_at("1.2.3.4", now).await;
        assert!(first.allowed);
        assert_eq!(first.remaining, 1);

        assert!(limiter.check_at("1.2.3.4", now).await.allowed);

        let third = limiter.check_at("1.2.3.4", now).await;
        assert!(!third.allowed);
        assert_eq!(third.remaining, 0);
        assert_eq!(third.reset_secs, 60);
    }

    #[tokio::test]
    async fn clients_are_counted_separately() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();

        assert!(limiter.check_at("a", now).await.allowed);
        assert!(!limiter.check_at("a", now).await.allowed);
        assert!(limiter.check_at("b", now).await.allowed);
    }

    #[tokio::test]
    async fn window_resets() {
        let limiter = RateLimiter::new(1, Duration::from_secs(10));
        let start = Instant::now();

        assert!(limiter.check_at("a", start).await.allowed);
        assert!(!limiter.check_at("a", start + Duration::from_secs(9)).await.allowed);

        let later = limiter.check_at("a", start + Duration::from_secs(10)).await;
        assert!(later.allowed);
        assert_eq!(later.reset_secs, 10);
    }

    #[test]
    fn window_minutes_round_up() {
        assert_eq!(RateLimiter::new(1, Duration::from_secs(900)).window_minutes(), 15);
        assert_eq!(RateLimiter::new(1, Duration::from_secs(61)).window_minutes(), 2);
    }
}

//! Per-client fixed-window rate limiting for `/api/*`.
//!
//! Each client IP gets `limit` requests per window. The window starts at
//! the client's first request and resets `window` later.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

/// The resolved client address, inserted as a request extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed {
        remaining: u32,
        reset: DateTime<Utc>,
    },
    Limited {
        retry_after_secs: u64,
        reset: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: DateTime<Utc>,
    count: u32,
}

#[derive(Clone)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    windows: Arc<DashMap<IpAddr, Window>>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: std::time::Duration) -> Self {
        Self {
            limit,
            window: Duration::from_std(window).unwrap_or_else(|_| Duration::hours(1)),
            windows: Arc::new(DashMap::new()),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn check(&self, ip: IpAddr) -> Decision {
        self.check_at(ip, Utc::now())
    }

    pub fn check_at(&self, ip: IpAddr, now: DateTime<Utc>) -> Decision {
        let mut entry = self.windows.entry(ip).or_insert(Window {
            started: now,
            count: 0,
        });
        if now >= entry.started + self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }
        let reset = entry.started + self.window;

        if entry.count >= self.limit {
            let secs = (reset - now).num_milliseconds().max(0) as u64;
            return Decision::Limited {
                // Round up, but never past the window length.
                retry_after_secs: secs.div_ceil(1000).max(1).min(self.window.num_seconds() as u64),
                reset,
            };
        }
        entry.count += 1;
        Decision::Allowed {
            remaining: self.limit - entry.count,
            reset,
        }
    }

    /// Drops windows that have already ended.
    pub fn sweep(&self, now: DateTime<Utc>) {
        let window = self.window;
        self.windows.retain(|_, w| now < w.started + window);
    }
}

/// Client IP from the socket, falling back to the first `X-Forwarded-For`
/// entry, then loopback.
pub fn client_ip<B>(req: &Request<B>) -> IpAddr {
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip();
    }
    forwarded_for(req.headers()).unwrap_or(IpAddr::from([127, 0, 0, 1]))
}

fn forwarded_for(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")?
        .to_str()
        .ok()?
        .split(',')
        .next()?
        .trim()
        .parse()
        .ok()
}

fn header(value: impl ToString) -> Option<HeaderValue> {
    HeaderValue::from_str(&value.to_string()).ok()
}

fn set_headers(headers: &mut HeaderMap, limit: u32, remaining: u32, reset: DateTime<Utc>) {
    for (name, value) in [
        ("x-ratelimit-limit", header(limit)),
        ("x-ratelimit-remaining", header(remaining)),
        ("x-ratelimit-reset", header(reset.to_rfc3339())),
    ] {
        if let Some(value) = value {
            headers.insert(name, value);
        }
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let ip = client_ip(&req);
    req.extensions_mut().insert(ClientIp(ip));

    match limiter.check(ip) {
        Decision::Allowed { remaining, reset } => {
            let mut resp = next.run(req).await;
            set_headers(resp.headers_mut(), limiter.limit(), remaining, reset);
            resp
        }
        Decision::Limited {
            retry_after_secs,
            reset,
        } => {
            tracing::warn!(%ip, "rate limit exceeded");
            let mut resp = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({
                    "error": "Too many requests, please try again later",
                    "code": "rate_limited",
                    "retryAfter": retry_after_secs,
                })),
            )
                .into_response();
            set_headers(resp.headers_mut(), limiter.limit(), 0, reset);
            if let Some(v) = header(retry_after_secs) {
                resp.headers_mut().insert("retry-after", v);
            }
            resp
        }
    }
}

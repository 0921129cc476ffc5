//! Token-bucket throttling, per client IP for the whole API and per phone
//! number for verification sends.

use std::collections::HashMap;
use std::hash::Hash;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::ServerError;

/// Sustained rate and burst size of one bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quota {
    pub per_second: f64,
    pub burst: f64,
}

impl Quota {
    /// Whole API: 10 req/s sustained, burst of 30.
    pub const API: Quota = Quota {
        per_second: 10.0,
        burst: 30.0,
    };

    /// Verification sends: a burst of 3, then one a minute.
    pub const VERIFICATION: Quota = Quota {
        per_second: 1.0 / 60.0,
        burst: 3.0,
    };
}

#[derive(Debug, Clone)]
struct Bucket {
    tokens: f64,
    touched: Instant,
}

impl Bucket {
    fn full(quota: Quota, now: Instant) -> Self {
        Self {
            tokens: quota.burst,
            touched: now,
        }
    }

    /// Take one token, or return how long until one is available.
    fn take(&mut self, quota: Quota, now: Instant) -> Result<(), Duration> {
        let refill = now.duration_since(self.touched).as_secs_f64() * quota.per_second;
        self.tokens = (self.tokens + refill).min(quota.burst);
        self.touched = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            return Ok(());
        }
        let missing = 1.0 - self.tokens;
        Err(Duration::from_secs_f64(missing / quota.per_second))
    }
}

#[derive(Clone)]
pub struct RateLimiter<K = IpAddr> {
    buckets: Arc<Mutex<HashMap<K, Bucket>>>,
    quota: Quota,
}

impl<K: Eq + Hash> RateLimiter<K> {
    pub fn new(quota: Quota) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            quota,
        }
    }

    pub fn quota(&self) -> Quota {
        self.quota
    }

    /// Spend one token for `key`. `Err` carries the wait before the next
    /// token.
    pub async fn check(&self, key: K) -> Result<(), Duration> {
        let now = Instant::now();
        let quota = self.quota;
        self.buckets
            .lock()
            .await
            .entry(key)
            .or_insert_with(|| Bucket::full(quota, now))
            .take(quota, now)
    }

    /// Drop buckets untouched for longer than `max_idle`.
    pub async fn purge_stale(&self, max_idle: Duration) {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().await;
        let before = buckets.len();
        buckets.retain(|_, bucket| now.duration_since(bucket.touched) < max_idle);
        let purged = before - buckets.len();
        if purged > 0 {
            tracing::debug!(purged, remaining = buckets.len(), "Purged idle rate limit buckets");
        }
    }

    pub async fn len(&self) -> usize {
        self.buckets.lock().await.len()
    }
}

impl Default for RateLimiter<IpAddr> {
    fn default() -> Self {
        Self::new(Quota::API)
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    req: Request,
    next: Next,
) -> Response {
    // No address (in-process tests) means no throttling.
    let Some(ip) = client_ip(&req) else {
        return next.run(req).await;
    };
    match limiter.check(ip).await {
        Ok(()) => next.run(req).await,
        Err(wait) => {
            warn!(ip = %ip, path = %req.uri().path(), "Rate limit exceeded");
            ServerError::RateLimited {
                retry_after: wait.as_secs().max(1),
            }
            .into_response()
        }
    }
}

/// Try ConnectInfo first, then X-Forwarded-For, then X-Real-IP.
fn client_ip<B>(req: &axum::http::Request<B>) -> Option<IpAddr> {
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return Some(addr.ip());
    }

    let header = |name: &str| req.headers().get(name).and_then(|v| v.to_str().ok());

    header("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .or_else(|| header("x-real-ip"))
        .and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[tokio::test]
    async fn burst_then_reject_with_wait() {
        let limiter = RateLimiter::new(Quota {
            per_second: 2.0,
            burst: 5.0,
        });
        let ip: IpAddr = "127.0.0.1".parse().unwrap();

        for _ in 0..5 {
            assert!(limiter.check(ip).await.is_ok());
        }
        let wait = limiter.check(ip).await.unwrap_err();
        assert!(wait > Duration::ZERO && wait <= Duration::from_millis(500));
    }

    #[tokio::test]
    async fn phone_keys_are_independent() {
        let limiter = RateLimiter::<String>::new(Quota::VERIFICATION);

        for _ in 0..3 {
            assert!(limiter.check("5491100000001".to_string()).await.is_ok());
        }
        let wait = limiter.check("5491100000001".to_string()).await.unwrap_err();
        assert!(wait.as_secs() >= 59);
        assert!(limiter.check("5491100000002".to_string()).await.is_ok());
    }

    #[tokio::test]
    async fn purge_drops_idle_buckets() {
        let limiter = RateLimiter::default();
        let ip: IpAddr = "192.168.1.1".parse().unwrap();
        assert!(limiter.check(ip).await.is_ok());

        limiter.purge_stale(Duration::from_secs(60)).await;
        assert_eq!(limiter.len().await, 1);

        limiter.purge_stale(Duration::ZERO).await;
        assert_eq!(limiter.len().await, 0);
    }

    #[test]
    fn client_ip_from_proxy_headers() {
        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(())
            .unwrap();
        assert_eq!(client_ip(&req), Some("203.0.113.7".parse().unwrap()));

        let req = Request::builder()
            .header("x-real-ip", " 198.51.100.2 ")
            .body(())
            .unwrap();
        assert_eq!(client_ip(&req), Some("198.51.100.2".parse().unwrap()));

        let req = Request::builder().body(()).unwrap();
        assert_eq!(client_ip(&req), None);
    }
}

//! Per-client request budgets.
//!
//! `/api/auth/*` draws from the auth budget, `/api/users/*` from the admin
//! budget, and every other `/api` route from the general budget. Clients are
//! keyed by the peer socket address. Behind a trusted reverse proxy
//! (`RATE_LIMIT_TRUST_PROXY`) the first `X-Forwarded-For` address, then
//! `X-Real-IP`, takes precedence.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use campus_config::RateLimitConfig;
use campus_core::AppError;
use governor::{
    DefaultKeyedRateLimiter, RateLimiter,
    clock::{Clock, DefaultClock},
};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::metrics::track_rate_limited;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Budget {
    Auth,
    Api,
    Admin,
}

impl Budget {
    pub fn for_path(path: &str) -> Option<Self> {
        let rest = path.strip_prefix("/api")?;
        if !(rest.is_empty() || rest.starts_with('/')) {
            return None;
        }
        if rest.starts_with("/auth/") || rest == "/auth" {
            Some(Budget::Auth)
        } else if rest.starts_with("/users/") || rest == "/users" {
            Some(Budget::Admin)
        } else {
            Some(Budget::Api)
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Budget::Auth => "auth",
            Budget::Api => "api",
            Budget::Admin => "admin",
        }
    }
}

#[derive(Clone)]
pub struct RateLimiters {
    auth: Arc<DefaultKeyedRateLimiter<String>>,
    api: Arc<DefaultKeyedRateLimiter<String>>,
    admin: Arc<DefaultKeyedRateLimiter<String>>,
    trust_proxy: bool,
    clock: DefaultClock,
}

impl RateLimiters {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            auth: Arc::new(RateLimiter::keyed(config.auth.quota())),
            api: Arc::new(RateLimiter::keyed(config.api.quota())),
            admin: Arc::new(RateLimiter::keyed(config.admin.quota())),
            trust_proxy: config.trust_proxy,
            clock: DefaultClock::default(),
        }
    }

    fn limiters(&self) -> [&DefaultKeyedRateLimiter<String>; 3] {
        [&*self.auth, &*self.api, &*self.admin]
    }

    /// Key under which a request is counted.
    pub fn key_for(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        client_key(headers, peer, self.trust_proxy)
    }

    /// Number of client keys currently tracked across all budgets.
    pub fn tracked_keys(&self) -> usize {
        self.limiters().iter().map(|limiter| limiter.len()).sum()
    }

    /// Drops keys whose buckets have refilled completely.
    pub fn prune(&self) {
        for limiter in self.limiters() {
            limiter.retain_recent();
            limiter.shrink_to_fit();
        }
    }

    /// Prunes all budgets every `every` until the runtime shuts down.
    pub fn spawn_pruner(&self, every: Duration) -> JoinHandle<()> {
        let limiters = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                limiters.prune();
                debug!(keys = limiters.tracked_keys(), "Pruned rate limit keys");
            }
        })
    }

    /// `Err(seconds)` when `key` has exhausted `budget`.
    pub fn check(&self, budget: Budget, key: &str) -> Result<(), u64> {
        let limiter = match budget {
            Budget::Auth => &self.auth,
            Budget::Api => &self.api,
            Budget::Admin => &self.admin,
        };
        limiter.check_key(&key.to_string()).map_err(|not_until| {
            let wait = not_until.wait_time_from(self.clock.now());
            wait.as_secs() + u64::from(wait.subsec_nanos() > 0)
        })
    }
}

/// Client identity for rate limiting. Forwarding headers are client-controlled,
/// so they are only consulted when `trust_proxy` is set.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    let peer_ip = || peer.map(|addr| addr.ip().to_string());
    if !trust_proxy {
        return peer_ip().unwrap_or_else(|| "unknown".to_string());
    }

    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(',').next().unwrap_or("").trim().to_string())
            .filter(|v| !v.is_empty())
    };

    header_value("x-forwarded-for")
        .or_else(|| header_value("x-real-ip"))
        .or_else(peer_ip)
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let Some(budget) = Budget::for_path(req.uri().path()) else {
        return next.run(req).await;
    };

    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = state.rate_limiters.key_for(req.headers(), peer);

    if let Err(retry_after) = state.rate_limiters.check(budget, &key) {
        warn!(budget = budget.as_str(), client = %key, retry_after, "Rate limit exceeded");
        track_rate_limited(budget.as_str());
        return AppError::too_many_requests(retry_after.max(1)).into_response();
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use campus_config::RateBudget;

    #[test]
    fn test_budget_selection() {
        assert_eq!(Budget::for_path("/api/auth/login"), Some(Budget::Auth));
        assert_eq!(Budget::for_path("/api/users"), Some(Budget::Admin));
        assert_eq!(Budget::for_path("/api/users/123/status"), Some(Budget::Admin));
        assert_eq!(Budget::for_path("/api/courses"), Some(Budget::Api));
        assert_eq!(Budget::for_path("/api/authors"), Some(Budget::Api));
        assert_eq!(Budget::for_path("/swagger-ui"), None);
        assert_eq!(Budget::for_path("/apix"), None);
    }

    #[test]
    fn test_client_key_ignores_forwarding_headers_by_default() {
        let peer: SocketAddr = "198.51.100.4:5000".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.9.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.9.0.2"));

        assert_eq!(client_key(&headers, Some(peer), false), "198.51.100.4");
        assert_eq!(client_key(&headers, None, false), "unknown");
    }

    #[test]
    fn test_client_key_precedence_behind_trusted_proxy() {
        let peer: SocketAddr = "10.0.0.9:5000".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_key(&headers, Some(peer), true), "10.0.0.9");
        assert_eq!(client_key(&headers, None, true), "unknown");

        headers.insert("x-real-ip", HeaderValue::from_static("192.168.1.2"));
        assert_eq!(client_key(&headers, Some(peer), true), "192.168.1.2");

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(client_key(&headers, Some(peer), true), "203.0.113.7");
    }

    #[test]
    fn test_rotating_forwarded_for_does_not_reset_budget() {
        let config = RateLimitConfig {
            auth: RateBudget::new(1, 900),
            ..RateLimitConfig::default()
        };
        let limiters = RateLimiters::new(&config);
        let peer: SocketAddr = "198.51.100.4:443".parse().unwrap();

        let mut allowed = 0;
        for i in 0..50 {
            let mut headers = HeaderMap::new();
            let spoofed = HeaderValue::from_str(&format!("10.9.0.{i}")).unwrap();
            headers.insert("x-forwarded-for", spoofed);
            let key = limiters.key_for(&headers, Some(peer));
            if limiters.check(Budget::Auth, &key).is_ok() {
                allowed += 1;
            }
        }

        assert_eq!(allowed, 1);
        assert_eq!(limiters.tracked_keys(), 1);
    }

    #[test]
    fn test_prune_drops_refilled_keys() {
        let config = RateLimitConfig {
            api: RateBudget::new(1000, 1),
            ..RateLimitConfig::default()
        };
        let limiters = RateLimiters::new(&config);
        for i in 0..20 {
            assert!(limiters.check(Budget::Api, &format!("client-{i}")).is_ok());
        }
        assert_eq!(limiters.tracked_keys(), 20);

        std::thread::sleep(Duration::from_millis(50));
        limiters.prune();
        assert_eq!(limiters.tracked_keys(), 0);
    }

    #[test]
    fn test_budget_exhaustion_reports_retry_after() {
        let config = RateLimitConfig {
            auth: RateBudget::new(2, 60),
            ..RateLimitConfig::default()
        };
        let limiters = RateLimiters::new(&config);

        assert!(limiters.check(Budget::Auth, "a").is_ok());
        assert!(limiters.check(Budget::Auth, "a").is_ok());
        let retry_after = limiters.check(Budget::Auth, "a").unwrap_err();
        assert!(retry_after >= 1 && retry_after <= 30);

        // other keys and budgets are independent
        assert!(limiters.check(Budget::Auth, "b").is_ok());
        assert!(limiters.check(Budget::Api, "a").is_ok());
    }
}

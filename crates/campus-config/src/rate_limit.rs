//! Rate limiting budgets.
//!
//! Each budget allows `max_requests` per `window_secs` for one client key.
//! It is expressed as a governor token bucket holding `max_requests` tokens,
//! refilled one token every `window / max_requests`.
//!
//! | Budget | Env vars | Default |
//! |--------|----------|---------|
//! | auth   | `RATE_LIMIT_AUTH_MAX`, `RATE_LIMIT_AUTH_WINDOW_SECS`   | 10 per 15 min |
//! | api    | `RATE_LIMIT_API_MAX`, `RATE_LIMIT_API_WINDOW_SECS`     | 60 per minute |
//! | admin  | `RATE_LIMIT_ADMIN_MAX`, `RATE_LIMIT_ADMIN_WINDOW_SECS` | 30 per hour   |
//!
//! Clients are keyed by the peer socket address. `RATE_LIMIT_TRUST_PROXY=true`
//! switches to `X-Forwarded-For` / `X-Real-IP`; only set it when every request
//! arrives through a reverse proxy that overwrites those headers.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::Quota;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateBudget {
    pub max_requests: u32,
    pub window_secs: u64,
}

impl RateBudget {
    pub const fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window_secs,
        }
    }

    fn from_env(prefix: &str, default: RateBudget) -> Self {
        let read = |suffix: &str| std::env::var(format!("RATE_LIMIT_{prefix}_{suffix}")).ok();
        Self {
            max_requests: read("MAX")
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_requests),
            window_secs: read("WINDOW_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.window_secs),
        }
    }

    /// Token bucket equivalent of this budget.
    #[must_use]
    pub fn quota(&self) -> Quota {
        let max = NonZeroU32::new(self.max_requests.max(1)).unwrap_or(NonZeroU32::MIN);
        let window = Duration::from_secs(self.window_secs.max(1));
        let period = window / max.get();

        Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(max))
            .allow_burst(max)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub auth: RateBudget,
    pub api: RateBudget,
    pub admin: RateBudget,
    /// Read the client address from proxy headers instead of the socket.
    pub trust_proxy: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            auth: RateBudget::new(10, 900),
            api: RateBudget::new(60, 60),
            admin: RateBudget::new(30, 3600),
            trust_proxy: false,
        }
    }
}

impl RateLimitConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            auth: RateBudget::from_env("AUTH", defaults.auth),
            api: RateBudget::from_env("API", defaults.api),
            admin: RateBudget::from_env("ADMIN", defaults.admin),
            trust_proxy: std::env::var("RATE_LIMIT_TRUST_PROXY")
                .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1"))
                .unwrap_or(defaults.trust_proxy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_budgets() {
        let config = RateLimitConfig::default();
        assert_eq!(config.auth, RateBudget::new(10, 900));
        assert_eq!(config.api, RateBudget::new(60, 60));
        assert_eq!(config.admin, RateBudget::new(30, 3600));
        assert!(!config.trust_proxy);
    }

    #[test]
    fn test_quota_burst_equals_max_requests() {
        let quota = RateBudget::new(10, 900).quota();
        assert_eq!(quota.burst_size().get(), 10);
        assert_eq!(quota.replenish_interval(), Duration::from_secs(90));
    }

    #[test]
    fn test_zero_values_are_clamped() {
        let quota = RateBudget::new(0, 0).quota();
        assert_eq!(quota.burst_size().get(), 1);
    }
}

//! Access token signing.
//!
//! | Env var | Default |
//! |---------|---------|
//! | `JWT_SECRET` | a development placeholder; see [`JwtConfig::uses_default_secret`] |
//! | `JWT_ACCESS_EXPIRY` | `86400` seconds (one day), at least 60 |

use std::env;

const DEFAULT_SECRET: &str = "campus-dev-secret-change-me";
const MIN_EXPIRY_SECS: i64 = 60;

#[derive(Clone, Debug)]
pub struct JwtConfig {
    pub secret: String,
    /// Token lifetime in seconds.
    pub access_token_expiry: i64,
}

impl JwtConfig {
    pub fn from_env() -> Self {
        Self {
            secret: env::var("JWT_SECRET")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SECRET.to_string()),
            access_token_expiry: env::var("JWT_ACCESS_EXPIRY")
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .unwrap_or(86_400)
                .max(MIN_EXPIRY_SECS),
        }
    }

    /// True when no `JWT_SECRET` was configured. Tokens signed this way are
    /// forgeable by anyone who has read this source.
    pub fn uses_default_secret(&self) -> bool {
        self.secret == DEFAULT_SECRET
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_secret_is_detected() {
        let config = JwtConfig {
            secret: DEFAULT_SECRET.to_string(),
            access_token_expiry: 3600,
        };
        assert!(config.uses_default_secret());

        let config = JwtConfig {
            secret: "a-real-secret".to_string(),
            ..config
        };
        assert!(!config.uses_default_secret());
    }
}

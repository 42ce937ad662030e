//! Cross-origin settings for the browser clients.
//!
//! | Env var | Default |
//! |---------|---------|
//! | `ALLOWED_ORIGINS` | `http://localhost:3000,http://localhost:5173` |
//! | `CORS_MAX_AGE_SECS` | `3600` |
//!
//! Origins are compared byte for byte by the browser, so entries are trimmed
//! and lose any trailing `/` before use.

use std::env;

const DEFAULT_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    /// How long browsers may cache a preflight response.
    pub max_age_secs: u64,
}

impl CorsConfig {
    pub fn from_env() -> Self {
        let raw = env::var("ALLOWED_ORIGINS").unwrap_or_else(|_| DEFAULT_ORIGINS.to_string());
        Self {
            allowed_origins: parse_origins(&raw),
            max_age_secs: env::var("CORS_MAX_AGE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),
        }
    }
}

/// Comma separated origins, normalised and de-duplicated in order.
pub fn parse_origins(raw: &str) -> Vec<String> {
    let mut origins: Vec<String> = Vec::new();
    for origin in raw.split(',') {
        let origin = origin.trim().trim_end_matches('/');
        if !origin.is_empty() && !origins.iter().any(|o| o == origin) {
            origins.push(origin.to_string());
        }
    }
    origins
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_origins_normalises_entries() {
        let origins =
            parse_origins(" https://campus.edu/ ,,https://admin.campus.edu,https://campus.edu");
        assert_eq!(origins, vec!["https://campus.edu", "https://admin.campus.edu"]);
    }

    #[test]
    fn test_parse_origins_empty() {
        assert!(parse_origins(" , ").is_empty());
    }
}

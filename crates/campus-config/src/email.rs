//! Outgoing mail for password resets.
//!
//! With `SMTP_ENABLED` unset or false, mail is logged instead of sent, which
//! is the expected setup for local development.
//!
//! | Env var | Default |
//! |---------|---------|
//! | `SMTP_ENABLED` | `false` |
//! | `SMTP_HOST`, `SMTP_PORT` | `localhost`, `1025` |
//! | `SMTP_USERNAME`, `SMTP_PASSWORD` | empty (no authentication) |
//! | `FROM_EMAIL`, `FROM_NAME` | `noreply@campus.local`, `Campus` |
//! | `FRONTEND_URL` | `http://localhost:5173` |

use std::env;

#[derive(Clone, Debug)]
pub struct EmailConfig {
    pub enabled: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_email: String,
    pub from_name: String,
    /// Base URL used to build password reset links.
    pub frontend_url: String,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

impl EmailConfig {
    pub fn from_env() -> Self {
        Self {
            enabled: env::var("SMTP_ENABLED")
                .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1"))
                .unwrap_or(false),
            smtp_host: var_or("SMTP_HOST", "localhost"),
            smtp_port: env::var("SMTP_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1025),
            smtp_username: var_or("SMTP_USERNAME", ""),
            smtp_password: var_or("SMTP_PASSWORD", ""),
            from_email: var_or("FROM_EMAIL", "noreply@campus.local"),
            from_name: var_or("FROM_NAME", "Campus"),
            frontend_url: var_or("FRONTEND_URL", "http://localhost:5173"),
        }
    }

    /// `From` mailbox, e.g. `Campus <noreply@campus.local>`.
    pub fn sender(&self) -> String {
        format!("{} <{}>", self.from_name, self.from_email)
    }

    /// Frontend page that consumes a reset token.
    pub fn reset_url(&self, reset_token: &str) -> String {
        format!(
            "{}/reset-password/{reset_token}",
            self.frontend_url.trim_end_matches('/')
        )
    }
}

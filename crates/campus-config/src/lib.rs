//! # Campus Config
//!
//! Configuration loaded from environment variables, one struct per concern:
//!
//! - [`server`]: bind address, metrics port, pool size
//! - [`jwt`]: token signing secret and lifetime
//! - [`cors`]: allowed origins
//! - [`email`]: SMTP settings for password reset mail
//! - [`rate_limit`]: auth, api and admin request budgets
//! - [`uploads`]: upload directory and public URL

pub mod cors;
pub mod email;
pub mod jwt;
pub mod rate_limit;
pub mod server;
pub mod uploads;

pub use cors::CorsConfig;
pub use email::EmailConfig;
pub use jwt::JwtConfig;
pub use rate_limit::{RateBudget, RateLimitConfig};
pub use server::ServerConfig;
pub use uploads::UploadConfig;

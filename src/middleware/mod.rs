//! Request middleware and extractors.
//!
//! - [`auth`]: the `AuthUser` extractor (bearer token, identity reload)
//! - [`role`]: role gates for routers and handlers
//! - [`rate_limit`]: per-client request budgets
//!
//! A protected request flows through `rate_limit`, then a role gate such as
//! `require_staff`, then the handler, which may extract `AuthUser` again
//! without another database round trip.

pub mod auth;
pub mod rate_limit;
pub mod role;

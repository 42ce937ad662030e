//! # Campus Auth
//!
//! JWT claims and HS256 token helpers.
//!
//! ```ignore
//! use campus_auth::{create_access_token, verify_token};
//!
//! let token = create_access_token(user_id, "ana@example.com", Role::Student, &config)?;
//! let claims = verify_token(&token, &config)?;
//! ```

pub mod claims;
pub mod jwt;

pub use claims::Claims;
pub use jwt::{create_access_token, verify_token};

//! Access token creation and verification.
//!
//! Tokens are HS256 JWTs signed with `JWT_SECRET`. They carry the identity id,
//! email and role; the server still loads the identity on every request, so a
//! deactivated account is rejected even while its token is unexpired.
//!
//! # Example
//!
//! ```ignore
//! use campus_auth::{create_access_token, verify_token};
//! use campus_config::JwtConfig;
//! use campus_core::Role;
//!
//! let config = JwtConfig::from_env();
//! let token = create_access_token(user_id, "ana@campus.edu", Role::Student, &config)?;
//!
//! let claims = verify_token(&token, &config)?;
//! assert_eq!(claims.role, Role::Student);
//! ```

use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use campus_config::JwtConfig;
use campus_core::{AppError, Role};

use crate::claims::Claims;

/// Signs an access token for an identity.
///
/// # Arguments
///
/// * `user_id` - The identity (`users.id`), stored as `sub`
/// * `email` - The identity's email address
/// * `role` - `admin`, `teacher` or `student`
/// * `jwt_config` - Secret and lifetime (`JWT_ACCESS_EXPIRY`, seconds)
///
/// # Errors
///
/// Returns a 500 [`AppError`] if encoding fails.
pub fn create_access_token(
    user_id: Uuid,
    email: &str,
    role: Role,
    jwt_config: &JwtConfig,
) -> Result<String, AppError> {
    let now = Utc::now().timestamp();
    let exp = (now + jwt_config.access_token_expiry).max(0) as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        role,
        exp,
        iat: now as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_config.secret.as_bytes()),
    )
    .map_err(|e| AppError::internal_error(format!("Failed to create token: {e}")))
}

/// Checks signature and expiry and returns the claims.
///
/// # Errors
///
/// Any failure (bad signature, malformed token, expired) is a 401
/// [`AppError`] with the same message, so callers cannot tell them apart.
pub fn verify_token(token: &str, jwt_config: &JwtConfig) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_config.secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::unauthorized("Invalid or expired token"))
}

//! Authentication DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::ids::{StudentId, TeacherId};
use crate::users::User;
use crate::value_types::Email;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    pub email: Email,
    #[validate(length(min = 1, message = "Password is required"))]
    #[schema(example = "password123")]
    pub password: String,
}

/// Token plus the identity it was issued for.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: User,
}

impl AuthResponse {
    pub fn bearer(access_token: String, expires_in: i64, user: User) -> Self {
        Self {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in,
            user,
        }
    }
}

/// The caller's identity plus the id of their role profile, if any.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<StudentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teacher_id: Option<TeacherId>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdatePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(length(min = 8, message = "New password must be at least 8 characters"))]
    #[schema(example = "newPassword123")]
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ForgotPasswordRequest {
    pub email: Email,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(example = "newPassword123")]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_request_normalizes_email() {
        let req: LoginRequest =
            serde_json::from_str(r#"{"email":"Admin@Campus.edu","password":"x"}"#).unwrap();
        assert_eq!(req.email.as_str(), "admin@campus.edu");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_update_password_requires_length() {
        let req = UpdatePasswordRequest {
            current_password: "old".to_string(),
            new_password: "short".to_string(),
        };
        assert!(req.validate().is_err());
    }
}

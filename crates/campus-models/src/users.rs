//! Identity models.
//!
//! `users` is the identity store every role profile hangs off. The password
//! hash only ever lives in [`UserCredentials`], which is not serializable.

use campus_core::Role;
use campus_core::PaginationParams;
use campus_core::serde::{deserialize_optional_bool, deserialize_optional_trimmed};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::ids::UserId;
use crate::value_types::Email;

pub const DEFAULT_PROFILE_PHOTO: &str = "default.jpg";

/// Column list matching [`User`].
pub const USER_COLUMNS: &str =
    "id, full_name, email, role, profile_photo, active, created_at, updated_at";

#[derive(Serialize, Deserialize, FromRow, Debug, Clone, PartialEq, Eq, ToSchema)]
pub struct User {
    pub id: UserId,
    pub full_name: String,
    pub email: Email,
    pub role: Role,
    pub profile_photo: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Identity row including the password hash, for login checks only.
#[derive(FromRow, Debug, Clone)]
pub struct UserCredentials {
    pub id: UserId,
    pub email: Email,
    pub role: Role,
    pub active: bool,
    pub password_hash: String,
}

/// Admin provisioning of a bare identity (`POST /auth/register`).
#[derive(Deserialize, Debug, Clone, Validate, ToSchema)]
pub struct CreateUserDto {
    #[validate(length(min = 2, max = 120, message = "Name must be 2-120 characters"))]
    pub full_name: String,
    pub email: Email,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub role: Role,
}

#[derive(Deserialize, Debug, Clone, Validate, ToSchema)]
pub struct UpdateUserStatusDto {
    pub active: bool,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema, IntoParams)]
pub struct UserFilterParams {
    pub role: Option<Role>,
    #[serde(default, deserialize_with = "deserialize_optional_bool")]
    pub active: Option<bool>,
    /// Matches name or email
    #[serde(default, deserialize_with = "deserialize_optional_trimmed")]
    pub search: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user() -> User {
        User {
            id: UserId::from(Uuid::new_v4()),
            full_name: "Ana Silva".to_string(),
            email: Email::new("ana@campus.edu").unwrap(),
            role: Role::Student,
            profile_photo: DEFAULT_PROFILE_PHOTO.to_string(),
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_user_serialization_has_no_password() {
        let json = serde_json::to_value(user()).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("password").is_none());
        assert_eq!(json["role"], "student");
    }

    #[test]
    fn test_create_user_validation() {
        let dto = CreateUserDto {
            full_name: "A".to_string(),
            email: Email::new("a@b.com").unwrap(),
            password: "short".to_string(),
            role: Role::Teacher,
        };
        let errors = dto.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("full_name"));
        assert!(errors.field_errors().contains_key("password"));
    }

    #[test]
    fn test_filter_from_query_string_shape() {
        let json = r#"{"role":"teacher","active":"true","search":"ana","page":"2"}"#;
        let filter: UserFilterParams = serde_json::from_str(json).unwrap();
        assert_eq!(filter.role, Some(Role::Teacher));
        assert_eq!(filter.active, Some(true));
        assert_eq!(filter.pagination.page(), Some(2));
    }
}

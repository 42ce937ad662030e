//! Teacher profile models and DTOs.

use campus_core::PaginationParams;
use campus_core::serde::deserialize_optional_trimmed;
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use crate::ids::{TeacherId, UserId};
use crate::value_types::{Address, Email, hhmm};

pub const TEACHER_SELECT: &str = r#"
    SELECT t.id, t.user_id, u.full_name, u.email, u.profile_photo, u.active,
           t.specialty, t.education, t.bio, t.phone, t.address,
           t.created_at, t.updated_at
    FROM teachers t
    JOIN users u ON u.id = t.user_id
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "weekday", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
pub struct Education {
    #[validate(length(max = 100))]
    pub title: Option<String>,
    #[validate(length(max = 200))]
    pub institution: Option<String>,
    #[validate(range(min = 1900, max = 2100))]
    pub completion_year: Option<i32>,
    #[validate(length(max = 100))]
    pub field: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Teacher {
    pub id: TeacherId,
    pub user_id: UserId,
    pub full_name: String,
    pub email: Email,
    pub profile_photo: String,
    pub active: bool,
    pub specialty: String,
    #[schema(value_type = Option<Education>)]
    pub education: Option<Json<Education>>,
    pub bio: Option<String>,
    pub phone: Option<String>,
    #[schema(value_type = Option<Address>)]
    pub address: Option<Json<Address>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn validate_slot(slot: &AvailabilitySlot) -> Result<(), ValidationError> {
    if slot.start_time >= slot.end_time {
        let mut err = ValidationError::new("time_range");
        err.message = Some("start_time must be before end_time".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, Validate, ToSchema)]
#[validate(schema(function = "validate_slot"))]
pub struct AvailabilitySlot {
    pub weekday: Weekday,
    #[serde(with = "hhmm")]
    #[schema(value_type = String, example = "08:00")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    #[schema(value_type = String, example = "12:00")]
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TeacherDetail {
    #[serde(flatten)]
    pub teacher: Teacher,
    pub availability: Vec<AvailabilitySlot>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateTeacherDto {
    #[validate(length(min = 3, max = 100, message = "Name must be 3-100 characters"))]
    pub full_name: String,
    pub email: Email,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 2, max = 100, message = "Specialty must be 2-100 characters"))]
    pub specialty: String,
    #[validate(nested)]
    pub education: Option<Education>,
    #[validate(length(max = 1000, message = "Bio cannot exceed 1000 characters"))]
    pub bio: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    #[validate(nested)]
    pub address: Option<Address>,
    #[serde(default)]
    #[validate(nested)]
    pub availability: Vec<AvailabilitySlot>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateTeacherDto {
    #[validate(length(min = 3, max = 100, message = "Name must be 3-100 characters"))]
    pub full_name: Option<String>,
    pub email: Option<Email>,
    #[validate(length(min = 2, max = 100, message = "Specialty must be 2-100 characters"))]
    pub specialty: Option<String>,
    #[validate(nested)]
    pub education: Option<Education>,
    #[validate(length(max = 1000, message = "Bio cannot exceed 1000 characters"))]
    pub bio: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    #[validate(nested)]
    pub address: Option<Address>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateAvailabilityDto {
    #[validate(nested)]
    pub availability: Vec<AvailabilitySlot>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema, IntoParams)]
pub struct TeacherFilterParams {
    #[serde(default, deserialize_with = "deserialize_optional_trimmed")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_trimmed")]
    pub specialty: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_requires_start_before_end() {
        let slot: AvailabilitySlot = serde_json::from_str(
            r#"{"weekday":"monday","start_time":"14:00","end_time":"10:00"}"#,
        )
        .unwrap();
        assert!(slot.validate().is_err());

        let slot: AvailabilitySlot = serde_json::from_str(
            r#"{"weekday":"friday","start_time":"08:00","end_time":"12:00"}"#,
        )
        .unwrap();
        assert!(slot.validate().is_ok());
        assert_eq!(
            serde_json::to_value(&slot).unwrap()["start_time"],
            "08:00"
        );
    }

    #[test]
    fn test_create_teacher_validates_nested_slots() {
        let dto: CreateTeacherDto = serde_json::from_value(serde_json::json!({
            "full_name": "Carlos Souza",
            "email": "carlos@campus.edu",
            "password": "password123",
            "specialty": "Mathematics",
            "availability": [
                {"weekday": "monday", "start_time": "10:00", "end_time": "10:00"}
            ]
        }))
        .unwrap();
        assert!(dto.validate().is_err());
    }

    #[test]
    fn test_bio_length() {
        let dto = UpdateTeacherDto {
            bio: Some("x".repeat(1001)),
            ..Default::default()
        };
        let errors = dto.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("bio"));
    }
}

//! Student profile models and DTOs.
//!
//! A student profile hangs off one `users` row (role `student`). Its
//! enrollment list mirrors the course rosters; see [`crate::courses`].

use campus_core::PaginationParams;
use campus_core::serde::deserialize_optional_trimmed;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use crate::courses::{CourseStatus, EnrollmentStatus};
use crate::ids::{CourseId, StudentId, UserId};
use crate::value_types::{Address, Email};

/// Student row joined with its identity.
pub const STUDENT_SELECT: &str = r#"
    SELECT s.id, s.user_id, u.full_name, u.email, u.profile_photo, u.active,
           s.enrollment_number, s.address, s.phone, s.birth_date,
           s.created_at, s.updated_at
    FROM students s
    JOIN users u ON u.id = s.user_id
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "academic_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AcademicStatus {
    Approved,
    Failed,
    InProgress,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Student {
    pub id: StudentId,
    pub user_id: UserId,
    pub full_name: String,
    pub email: Email,
    pub profile_photo: String,
    pub active: bool,
    pub enrollment_number: String,
    #[schema(value_type = Option<Address>)]
    pub address: Option<Json<Address>>,
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One entry of a student's enrollment list, with a course summary.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct StudentEnrollment {
    pub course_id: CourseId,
    pub course_name: String,
    pub course_status: CourseStatus,
    pub status: EnrollmentStatus,
    pub enrolled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AcademicRecord {
    pub course_id: CourseId,
    pub final_grade: Option<f64>,
    pub attendance_pct: Option<f64>,
    pub status: AcademicStatus,
    pub notes: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StudentDetail {
    #[serde(flatten)]
    pub student: Student,
    pub enrollments: Vec<StudentEnrollment>,
    pub academic_history: Vec<AcademicRecord>,
}

fn validate_enrollment_number(value: &str) -> Result<(), ValidationError> {
    let valid = (8..=12).contains(&value.len())
        && value
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
    if !valid {
        let mut err = ValidationError::new("enrollment_number");
        err.message = Some("Enrollment number must be 8-12 uppercase letters or digits".into());
        return Err(err);
    }
    Ok(())
}

fn validate_phone(value: &str) -> Result<(), ValidationError> {
    let digits = value.chars().filter(char::is_ascii_digit).count();
    let allowed = value
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '(' | ')' | '-' | ' '));
    if !allowed || !(8..=15).contains(&digits) {
        let mut err = ValidationError::new("phone");
        err.message = Some("Invalid phone number".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AcademicRecordInput {
    pub course_id: CourseId,
    #[validate(range(min = 0.0, max = 10.0, message = "final_grade must be between 0 and 10"))]
    pub final_grade: Option<f64>,
    #[validate(range(min = 0.0, max = 100.0, message = "attendance_pct must be between 0 and 100"))]
    pub attendance_pct: Option<f64>,
    pub status: AcademicStatus,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateStudentDto {
    #[validate(length(min = 3, max = 100, message = "Name must be 3-100 characters"))]
    pub full_name: String,
    pub email: Email,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(custom(function = "validate_enrollment_number"))]
    pub enrollment_number: String,
    #[validate(nested)]
    pub address: Option<Address>,
    #[validate(custom(function = "validate_phone"))]
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateStudentDto {
    #[validate(length(min = 3, max = 100, message = "Name must be 3-100 characters"))]
    pub full_name: Option<String>,
    pub email: Option<Email>,
    #[validate(custom(function = "validate_enrollment_number"))]
    pub enrollment_number: Option<String>,
    #[validate(nested)]
    pub address: Option<Address>,
    #[validate(custom(function = "validate_phone"))]
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    /// Replaces the whole academic history when present
    #[validate(nested)]
    pub academic_history: Option<Vec<AcademicRecordInput>>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema, IntoParams)]
pub struct StudentFilterParams {
    #[serde(default, deserialize_with = "deserialize_optional_trimmed")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_trimmed")]
    pub enrollment_number: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct StudentCoursesParams {
    pub status: Option<EnrollmentStatus>,
}

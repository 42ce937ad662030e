//! Course catalog, roster and enrollment models.
//!
//! A course's roster (`course_roster`) and each student's enrollment list
//! (`student_enrollments`) mirror one another. Seat availability is never
//! stored: it is derived from the active roster size with [`available_seats`].

use campus_core::PaginationParams;
use campus_core::serde::{deserialize_optional_trimmed, deserialize_optional_uuid};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::ids::{CourseId, MaterialId, StudentId, TeacherId, UserId};
use crate::value_types::Email;

pub const DEFAULT_CAPACITY: i32 = 30;

/// Seats left in a course: `max(0, capacity - active)`.
pub fn available_seats(capacity: i32, active_enrollments: i64) -> i64 {
    (i64::from(capacity) - active_enrollments).max(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "enrollment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Active,
    Completed,
    Withdrawn,
    Dropped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "course_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CourseStatus {
    Planning,
    OpenEnrollment,
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "material_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MaterialKind {
    Document,
    Video,
    Link,
    Presentation,
    Other,
}

/// Course row joined with its active roster count.
pub const COURSE_SELECT: &str = r#"
    SELECT c.id, c.name, c.description, c.teacher_id, c.total_hours, c.start_date,
           c.end_date, c.status, c.capacity, c.categories, c.created_at, c.updated_at,
           (SELECT COUNT(*) FROM course_roster r
             WHERE r.course_id = c.id AND r.status = 'active') AS active_enrollments
    FROM courses c
"#;

#[derive(Debug, Clone, FromRow)]
pub struct CourseRow {
    pub id: CourseId,
    pub name: String,
    pub description: Option<String>,
    pub teacher_id: Option<TeacherId>,
    pub total_hours: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: CourseStatus,
    pub capacity: i32,
    pub categories: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub active_enrollments: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Course {
    pub id: CourseId,
    pub name: String,
    pub description: Option<String>,
    pub teacher_id: Option<TeacherId>,
    pub total_hours: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: CourseStatus,
    pub capacity: i32,
    pub active_enrollments: i64,
    pub available_seats: i64,
    pub categories: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CourseRow> for Course {
    fn from(row: CourseRow) -> Self {
        Self {
            available_seats: available_seats(row.capacity, row.active_enrollments),
            id: row.id,
            name: row.name,
            description: row.description,
            teacher_id: row.teacher_id,
            total_hours: row.total_hours,
            start_date: row.start_date,
            end_date: row.end_date,
            status: row.status,
            capacity: row.capacity,
            active_enrollments: row.active_enrollments,
            categories: row.categories,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct CourseTeacher {
    pub id: TeacherId,
    pub user_id: UserId,
    pub full_name: String,
    pub email: Email,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct CourseMaterial {
    pub id: MaterialId,
    pub course_id: CourseId,
    pub title: String,
    pub description: Option<String>,
    pub kind: MaterialKind,
    pub url: Option<String>,
    pub file_key: Option<String>,
    pub uploaded_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: Course,
    pub teacher: Option<CourseTeacher>,
    pub materials: Vec<CourseMaterial>,
}

fn validate_course_dates(start: NaiveDate, end: NaiveDate) -> Result<(), ValidationError> {
    if start > end {
        let mut err = ValidationError::new("date_range");
        err.message = Some("start_date must not be after end_date".into());
        return Err(err);
    }
    Ok(())
}

fn validate_create_course(dto: &CreateCourseDto) -> Result<(), ValidationError> {
    validate_course_dates(dto.start_date, dto.end_date)
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_create_course"))]
pub struct CreateCourseDto {
    #[validate(length(min = 3, max = 100, message = "Name must be 3-100 characters"))]
    pub name: String,
    #[validate(length(max = 1000, message = "Description cannot exceed 1000 characters"))]
    pub description: Option<String>,
    pub teacher_id: TeacherId,
    #[validate(range(min = 1, message = "total_hours must be at least 1"))]
    pub total_hours: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: Option<CourseStatus>,
    #[validate(range(min = 0, message = "capacity cannot be negative"))]
    pub capacity: Option<i32>,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateCourseDto {
    #[validate(length(min = 3, max = 100, message = "Name must be 3-100 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 1000, message = "Description cannot exceed 1000 characters"))]
    pub description: Option<String>,
    pub teacher_id: Option<TeacherId>,
    #[validate(range(min = 1, message = "total_hours must be at least 1"))]
    pub total_hours: Option<i32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: Option<CourseStatus>,
    #[validate(range(min = 0, message = "capacity cannot be negative"))]
    pub capacity: Option<i32>,
    pub categories: Option<Vec<String>>,
}

impl UpdateCourseDto {
    /// Checks the date range that results from applying this update.
    pub fn validate_dates_against(&self, current: &Course) -> Result<(), ValidationError> {
        validate_course_dates(
            self.start_date.unwrap_or(current.start_date),
            self.end_date.unwrap_or(current.end_date),
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema, IntoParams)]
pub struct CourseFilterParams {
    pub status: Option<CourseStatus>,
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub teacher_id: Option<Uuid>,
    #[serde(default, deserialize_with = "deserialize_optional_trimmed")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_trimmed")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

/// Body of enroll/withdraw. Students may omit `student_id` to act on themselves.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct EnrollmentRequest {
    pub student_id: Option<StudentId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EnrollmentResult {
    pub course_id: CourseId,
    pub student_id: StudentId,
    pub status: EnrollmentStatus,
    pub available_seats: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct RosterEntry {
    pub student_id: StudentId,
    pub user_id: UserId,
    pub full_name: String,
    pub email: Email,
    pub enrollment_number: String,
    pub status: EnrollmentStatus,
    pub enrolled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct RosterFilterParams {
    pub status: Option<EnrollmentStatus>,
}

fn validate_material(dto: &CreateMaterialDto) -> Result<(), ValidationError> {
    if dto.url.is_none() && dto.file_key.is_none() {
        let mut err = ValidationError::new("material_source");
        err.message = Some("Either url or file_key is required".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_material"))]
pub struct CreateMaterialDto {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    pub kind: MaterialKind,
    #[validate(url(message = "url must be a valid URL"))]
    pub url: Option<String>,
    /// Key returned by `POST /uploads/materials`
    pub file_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_seats_formula() {
        assert_eq!(available_seats(30, 0), 30);
        assert_eq!(available_seats(1, 1), 0);
        assert_eq!(available_seats(2, 5), 0);
        assert_eq!(available_seats(0, 0), 0);
    }

    #[test]
    fn test_course_from_row_derives_seats() {
        let row = CourseRow {
            id: CourseId::new(),
            name: "Algorithms".to_string(),
            description: None,
            teacher_id: None,
            total_hours: 40,
            start_date: NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
            status: CourseStatus::OpenEnrollment,
            capacity: 3,
            categories: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
            active_enrollments: 2,
        };
        let course = Course::from(row);
        assert_eq!(course.available_seats, 1);
    }

    #[test]
    fn test_create_course_rejects_inverted_dates() {
        let dto = CreateCourseDto {
            name: "Physics".to_string(),
            description: None,
            teacher_id: TeacherId::new(),
            total_hours: 10,
            start_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            status: None,
            capacity: Some(10),
            categories: vec![],
        };
        assert!(dto.validate().is_err());
    }

    #[test]
    fn test_create_course_rejects_zero_hours_and_negative_capacity() {
        let dto = CreateCourseDto {
            name: "Physics".to_string(),
            description: None,
            teacher_id: TeacherId::new(),
            total_hours: 0,
            start_date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            status: None,
            capacity: Some(-1),
            categories: vec![],
        };
        let errors = dto.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("total_hours"));
        assert!(errors.field_errors().contains_key("capacity"));
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&CourseStatus::OpenEnrollment).unwrap();
        assert_eq!(json, r#""open_enrollment""#);
    }

    #[test]
    fn test_material_requires_a_source() {
        let dto = CreateMaterialDto {
            title: "Slides".to_string(),
            description: None,
            kind: MaterialKind::Presentation,
            url: None,
            file_key: None,
        };
        assert!(dto.validate().is_err());
    }
}

//! Per-student academic progress: assessment grades and lesson attendance.
//!
//! Both views are scoped to one course when `course_id` is given, otherwise
//! to every course on the student's enrollment list.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use crate::ids::{AssessmentId, CourseId, LessonId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "assessment_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AssessmentKind {
    Exam,
    Assignment,
    Project,
    Seminar,
    Participation,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "attendance_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Excused,
}

/// One grade the student received, with its assessment and course.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct StudentGrade {
    pub assessment_id: AssessmentId,
    pub assessment_title: String,
    pub kind: AssessmentKind,
    pub weight: f64,
    pub applied_on: NaiveDate,
    pub course_id: CourseId,
    pub course_name: String,
    pub value: f64,
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// The student's attendance record for one lesson.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct StudentAttendance {
    pub lesson_id: LessonId,
    pub lesson_title: String,
    pub starts_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub course_id: CourseId,
    pub course_name: String,
    pub status: AttendanceStatus,
    pub justification: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ProgressParams {
    /// Limit to one course instead of the whole enrollment list.
    pub course_id: Option<CourseId>,
}

//! Report documents and their access grants.

use campus_core::policy::Grant;
use campus_core::{PaginationParams, Role};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::ids::{CourseId, ReportId, StudentId, TeacherId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "report_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Performance,
    Attendance,
    Financial,
    Administrative,
    Custom,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Performance => "performance",
            ReportKind::Attendance => "attendance",
            ReportKind::Financial => "financial",
            ReportKind::Administrative => "administrative",
            ReportKind::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "report_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Processing,
    Done,
    Error,
    Archived,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "report_format", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Json,
    Pdf,
    Csv,
    Xlsx,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "grant_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum GrantKind {
    Role,
    User,
}

/// Who besides the creator may read a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AccessGrant {
    Role { role: Role },
    User { user_id: UserId },
}

impl AccessGrant {
    pub fn admins() -> Self {
        Self::Role { role: Role::Admin }
    }

    pub fn as_policy(&self) -> Grant {
        match *self {
            Self::Role { role } => Grant::Role(role),
            Self::User { user_id } => Grant::User(user_id.into_inner()),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct AccessGrantRow {
    pub kind: GrantKind,
    pub role: Option<Role>,
    pub user_id: Option<UserId>,
}

impl AccessGrantRow {
    pub fn into_grant(self) -> Option<AccessGrant> {
        match (self.kind, self.role, self.user_id) {
            (GrantKind::Role, Some(role), _) => Some(AccessGrant::Role { role }),
            (GrantKind::User, _, Some(user_id)) => Some(AccessGrant::User { user_id }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RelatedEntities {
    #[serde(default)]
    pub courses: Vec<CourseId>,
    #[serde(default)]
    pub students: Vec<StudentId>,
    #[serde(default)]
    pub teachers: Vec<TeacherId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReportPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Clone, FromRow)]
pub struct ReportRow {
    pub id: ReportId,
    pub title: String,
    pub description: Option<String>,
    pub kind: ReportKind,
    pub format: ReportFormat,
    pub status: ReportStatus,
    pub parameters: Json<serde_json::Value>,
    pub payload: Option<Json<serde_json::Value>>,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub related_courses: Vec<CourseId>,
    pub related_students: Vec<StudentId>,
    pub related_teachers: Vec<TeacherId>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const REPORT_COLUMNS: &str = "id, title, description, kind, format, status, parameters, \
    payload, period_start, period_end, related_courses, related_students, related_teachers, \
    created_by, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Report {
    pub id: ReportId,
    pub title: String,
    pub description: Option<String>,
    pub kind: ReportKind,
    pub format: ReportFormat,
    pub status: ReportStatus,
    pub parameters: serde_json::Value,
    pub payload: Option<serde_json::Value>,
    pub period: Option<ReportPeriod>,
    pub related: RelatedEntities,
    pub access_grants: Vec<AccessGrant>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Report {
    pub fn from_row(row: ReportRow, access_grants: Vec<AccessGrant>) -> Self {
        let period = match (row.period_start, row.period_end) {
            (Some(start), Some(end)) => Some(ReportPeriod { start, end }),
            _ => None,
        };
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            kind: row.kind,
            format: row.format,
            status: row.status,
            parameters: row.parameters.0,
            payload: row.payload.map(|Json(v)| v),
            period,
            related: RelatedEntities {
                courses: row.related_courses,
                students: row.related_students,
                teachers: row.related_teachers,
            },
            access_grants,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    pub fn policy_grants(&self) -> Vec<Grant> {
        self.access_grants.iter().map(AccessGrant::as_policy).collect()
    }
}

fn validate_create_report(dto: &CreateReportDto) -> Result<(), ValidationError> {
    if let Some(period) = dto.period
        && period.start > period.end
    {
        let mut err = ValidationError::new("period");
        err.message = Some("period.start must not be after period.end".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_create_report"))]
pub struct CreateReportDto {
    #[validate(length(min = 3, max = 200, message = "Title must be 3-200 characters"))]
    pub title: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    pub kind: ReportKind,
    pub format: Option<ReportFormat>,
    #[serde(default)]
    pub parameters: Option<serde_json::Value>,
    pub period: Option<ReportPeriod>,
    #[serde(default)]
    pub related: RelatedEntities,
    /// Defaults to admins only
    pub access_grants: Option<Vec<AccessGrant>>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateReportDto {
    #[validate(length(min = 3, max = 200, message = "Title must be 3-200 characters"))]
    pub title: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    pub status: Option<ReportStatus>,
    pub access_grants: Option<Vec<AccessGrant>>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema, IntoParams)]
pub struct ReportFilterParams {
    pub kind: Option<ReportKind>,
    pub status: Option<ReportStatus>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

/// Everything an aggregator needs to compute a payload.
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub kind: ReportKind,
    pub parameters: serde_json::Value,
    pub period: Option<ReportPeriod>,
    pub related: RelatedEntities,
    pub requested_by: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_wire_format() {
        let grants: Vec<AccessGrant> = serde_json::from_str(
            r#"[{"kind":"role","role":"teacher"},{"kind":"user","user_id":"6f1c3a52-52ef-4c54-8a39-3a5b4b0f1d10"}]"#,
        )
        .unwrap();
        assert_eq!(grants[0], AccessGrant::Role { role: Role::Teacher });
        assert!(matches!(grants[1].as_policy(), Grant::User(_)));
    }

    #[test]
    fn test_grant_row_conversion() {
        let row = AccessGrantRow {
            kind: GrantKind::Role,
            role: Some(Role::Admin),
            user_id: None,
        };
        assert_eq!(row.into_grant(), Some(AccessGrant::admins()));

        let broken = AccessGrantRow {
            kind: GrantKind::User,
            role: None,
            user_id: None,
        };
        assert_eq!(broken.into_grant(), None);
    }

    #[test]
    fn test_period_order() {
        let dto: CreateReportDto = serde_json::from_value(serde_json::json!({
            "title": "Term performance",
            "kind": "performance",
            "period": {"start": "2025-06-30", "end": "2025-01-01"}
        }))
        .unwrap();
        assert!(dto.validate().is_err());
    }
}

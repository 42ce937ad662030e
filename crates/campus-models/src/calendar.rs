//! Calendar event models.

use campus_core::PaginationParams;
use campus_core::serde::deserialize_optional_uuid;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::ids::{CourseId, EventId, UserId};
use crate::teachers::Weekday;

pub const DEFAULT_EVENT_COLOR: &str = "#3788d8";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "event_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Class,
    Exam,
    Holiday,
    Event,
    Meeting,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
pub struct Recurrence {
    pub frequency: Frequency,
    #[serde(default = "default_interval")]
    #[validate(range(min = 1, message = "interval must be at least 1"))]
    pub interval: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekdays: Option<Vec<Weekday>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<NaiveDate>,
}

fn default_interval() -> i32 {
    1
}

#[derive(Debug, Clone, FromRow)]
pub struct CalendarEventRow {
    pub id: EventId,
    pub title: String,
    pub description: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub all_day: bool,
    pub kind: EventKind,
    pub color: String,
    pub recurrence: Option<Json<Recurrence>>,
    pub creator_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub course_ids: Vec<CourseId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CalendarEvent {
    pub id: EventId,
    pub title: String,
    pub description: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub all_day: bool,
    pub kind: EventKind,
    pub color: String,
    pub recurrence: Option<Recurrence>,
    pub creator_id: Option<UserId>,
    pub course_ids: Vec<CourseId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CalendarEventRow> for CalendarEvent {
    fn from(row: CalendarEventRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            start_at: row.start_at,
            end_at: row.end_at,
            all_day: row.all_day,
            kind: row.kind,
            color: row.color,
            recurrence: row.recurrence.map(|Json(r)| r),
            creator_id: row.creator_id,
            course_ids: row.course_ids,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Event row with its linked course ids aggregated.
pub const EVENT_SELECT: &str = r#"
    SELECT e.id, e.title, e.description, e.start_at, e.end_at, e.all_day, e.kind,
           e.color, e.recurrence, e.creator_id, e.created_at, e.updated_at,
           COALESCE(
               (SELECT array_agg(ec.course_id) FROM calendar_event_courses ec
                 WHERE ec.event_id = e.id),
               '{}'
           ) AS course_ids
    FROM calendar_events e
"#;

fn validate_time_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), ValidationError> {
    if start > end {
        let mut err = ValidationError::new("time_window");
        err.message = Some("start_at must not be after end_at".into());
        return Err(err);
    }
    Ok(())
}

fn validate_create_event(dto: &CreateEventDto) -> Result<(), ValidationError> {
    validate_time_window(dto.start_at, dto.end_at)
}

fn validate_color(color: &str) -> Result<(), ValidationError> {
    let hex = color.strip_prefix('#').unwrap_or("");
    if !matches!(hex.len(), 3 | 6) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        let mut err = ValidationError::new("color");
        err.message = Some("color must be a hex value such as #3788d8".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_create_event"))]
pub struct CreateEventDto {
    #[validate(length(min = 3, max = 100, message = "Title must be 3-100 characters"))]
    pub title: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    #[serde(default)]
    pub all_day: bool,
    pub kind: EventKind,
    #[validate(custom(function = "validate_color"))]
    pub color: Option<String>,
    #[validate(nested)]
    pub recurrence: Option<Recurrence>,
    #[serde(default)]
    pub course_ids: Vec<CourseId>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateEventDto {
    #[validate(length(min = 3, max = 100, message = "Title must be 3-100 characters"))]
    pub title: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub all_day: Option<bool>,
    pub kind: Option<EventKind>,
    #[validate(custom(function = "validate_color"))]
    pub color: Option<String>,
    #[validate(nested)]
    pub recurrence: Option<Recurrence>,
    pub course_ids: Option<Vec<CourseId>>,
}

impl UpdateEventDto {
    pub fn validate_window_against(&self, current: &CalendarEvent) -> Result<(), ValidationError> {
        validate_time_window(
            self.start_at.unwrap_or(current.start_at),
            self.end_at.unwrap_or(current.end_at),
        )
    }
}

fn deserialize_optional_datetime<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom),
    }
}

/// Events overlapping `[from, to]`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema, IntoParams)]
pub struct EventFilterParams {
    #[serde(default, deserialize_with = "deserialize_optional_datetime")]
    pub from: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_optional_datetime")]
    pub to: Option<DateTime<Utc>>,
    pub kind: Option<EventKind>,
    #[serde(default, deserialize_with = "deserialize_optional_uuid")]
    pub course_id: Option<Uuid>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn create_dto() -> CreateEventDto {
        let start = Utc::now();
        CreateEventDto {
            title: "Midterm exam".to_string(),
            description: None,
            start_at: start,
            end_at: start + Duration::hours(2),
            all_day: false,
            kind: EventKind::Exam,
            color: None,
            recurrence: None,
            course_ids: vec![],
        }
    }

    #[test]
    fn test_event_window_validation() {
        assert!(create_dto().validate().is_ok());

        let mut dto = create_dto();
        dto.end_at = dto.start_at - Duration::minutes(1);
        assert!(dto.validate().is_err());

        let mut dto = create_dto();
        dto.end_at = dto.start_at;
        assert!(dto.validate().is_ok());
    }

    #[test]
    fn test_color_validation() {
        let mut dto = create_dto();
        dto.color = Some("blue".to_string());
        assert!(dto.validate().is_err());
        dto.color = Some("#fff".to_string());
        assert!(dto.validate().is_ok());
    }

    #[test]
    fn test_recurrence_interval() {
        let recurrence: Recurrence =
            serde_json::from_str(r#"{"frequency":"weekly","interval":0}"#).unwrap();
        assert!(recurrence.validate().is_err());

        let recurrence: Recurrence =
            serde_json::from_str(r#"{"frequency":"daily","weekdays":["monday"]}"#).unwrap();
        assert_eq!(recurrence.interval, 1);
        assert!(recurrence.validate().is_ok());
    }

    #[test]
    fn test_filter_parses_window() {
        let filter: EventFilterParams = serde_json::from_str(
            r#"{"from":"2025-03-01T00:00:00Z","to":"","kind":"exam"}"#,
        )
        .unwrap();
        assert!(filter.from.is_some());
        assert!(filter.to.is_none());
        assert_eq!(filter.kind, Some(EventKind::Exam));
    }
}

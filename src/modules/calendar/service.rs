use anyhow::Context;
use campus_core::{Action, Actor, AppError, PaginationMeta, Paginated, Resource, authorize};
use campus_models::ids::{CourseId, EventId};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use tracing::{info, instrument};
use uuid::Uuid;

use super::model::{
    CalendarEvent, CalendarEventRow, CreateEventDto, DEFAULT_EVENT_COLOR, EVENT_SELECT,
    EventFilterParams, UpdateEventDto,
};

pub struct CalendarService;

impl CalendarService {
    async fn fetch_event(
        conn: &mut PgConnection,
        id: EventId,
    ) -> Result<CalendarEvent, AppError> {
        sqlx::query_as::<_, CalendarEventRow>(&format!("{EVENT_SELECT} WHERE e.id = $1"))
            .bind(id)
            .fetch_optional(conn)
            .await
            .context("Failed to fetch event")
            .map_err(AppError::database)?
            .map(CalendarEvent::from)
            .ok_or_else(|| AppError::not_found("Event not found"))
    }

    /// Rejects course ids that do not exist.
    async fn ensure_courses_exist(
        conn: &mut PgConnection,
        course_ids: &[CourseId],
    ) -> Result<(), AppError> {
        if course_ids.is_empty() {
            return Ok(());
        }
        let missing = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM UNNEST($1::uuid[]) AS wanted(id)
             WHERE NOT EXISTS (SELECT 1 FROM courses c WHERE c.id = wanted.id)",
        )
        .bind(course_ids)
        .fetch_one(conn)
        .await
        .context("Failed to check related courses")
        .map_err(AppError::database)?;

        if missing > 0 {
            return Err(AppError::bad_request("One or more related courses do not exist"));
        }
        Ok(())
    }

    async fn link_courses(
        conn: &mut PgConnection,
        id: EventId,
        course_ids: &[CourseId],
    ) -> Result<(), AppError> {
        sqlx::query("DELETE FROM calendar_event_courses WHERE event_id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await
            .context("Failed to clear event courses")
            .map_err(AppError::database)?;

        sqlx::query(
            "INSERT INTO calendar_event_courses (event_id, course_id)
             SELECT $1, UNNEST($2::uuid[])
             ON CONFLICT DO NOTHING",
        )
        .bind(id)
        .bind(course_ids)
        .execute(conn)
        .await
        .context("Failed to link event courses")
        .map_err(AppError::database)?;

        Ok(())
    }

    fn creator_resource(event: &CalendarEvent) -> Resource<'static> {
        Resource::CalendarEvent {
            creator: event
                .creator_id
                .map(|id| id.into_inner())
                .unwrap_or(Uuid::nil()),
        }
    }

    /// Events overlapping the `from`/`to` window, ordered by start.
    #[instrument(skip(db, filters), fields(db.operation = "SELECT", db.table = "calendar_events"))]
    pub async fn get_events(
        db: &PgPool,
        filters: EventFilterParams,
    ) -> Result<Paginated<CalendarEvent>, AppError> {
        const WHERE: &str = "WHERE ($1::timestamptz IS NULL OR e.end_at >= $1)
              AND ($2::timestamptz IS NULL OR e.start_at <= $2)
              AND ($3::event_kind IS NULL OR e.kind = $3)
              AND ($4::uuid IS NULL OR EXISTS (
                    SELECT 1 FROM calendar_event_courses ec
                    WHERE ec.event_id = e.id AND ec.course_id = $4))";

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM calendar_events e {WHERE}"
        ))
        .bind(filters.from)
        .bind(filters.to)
        .bind(filters.kind)
        .bind(filters.course_id)
        .fetch_one(db)
        .await
        .context("Failed to count events")
        .map_err(AppError::database)?;

        let rows = sqlx::query_as::<_, CalendarEventRow>(&format!(
            "{EVENT_SELECT} {WHERE} ORDER BY e.start_at LIMIT $5 OFFSET $6"
        ))
        .bind(filters.from)
        .bind(filters.to)
        .bind(filters.kind)
        .bind(filters.course_id)
        .bind(filters.pagination.limit())
        .bind(filters.pagination.offset())
        .fetch_all(db)
        .await
        .context("Failed to fetch events")
        .map_err(AppError::database)?;

        Ok(Paginated::new(
            rows.into_iter().map(CalendarEvent::from).collect(),
            PaginationMeta::new(total, &filters.pagination),
        ))
    }

    #[instrument(skip(db, filters))]
    pub async fn get_course_events(
        db: &PgPool,
        course_id: CourseId,
        mut filters: EventFilterParams,
    ) -> Result<Paginated<CalendarEvent>, AppError> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM courses WHERE id = $1)")
                .bind(course_id)
                .fetch_one(db)
                .await
                .context("Failed to check course")
                .map_err(AppError::database)?;
        if !exists {
            return Err(AppError::not_found("Course not found"));
        }

        filters.course_id = Some(course_id.into_inner());
        Self::get_events(db, filters).await
    }

    #[instrument(skip(db))]
    pub async fn get_event(db: &PgPool, id: EventId) -> Result<CalendarEvent, AppError> {
        let mut conn = db
            .acquire()
            .await
            .context("Failed to acquire connection")
            .map_err(AppError::database)?;
        Self::fetch_event(&mut conn, id).await
    }

    #[instrument(skip(db, dto), fields(db.operation = "INSERT", db.table = "calendar_events"))]
    pub async fn create_event(
        db: &PgPool,
        actor: &Actor,
        dto: CreateEventDto,
    ) -> Result<CalendarEvent, AppError> {
        authorize(
            actor,
            Action::Create,
            &Resource::CalendarEvent {
                creator: actor.user_id,
            },
        )?;

        let mut tx = db
            .begin()
            .await
            .context("Failed to begin transaction")
            .map_err(AppError::database)?;

        Self::ensure_courses_exist(&mut tx, &dto.course_ids).await?;

        let id = sqlx::query_scalar::<_, EventId>(
            "INSERT INTO calendar_events
                (title, description, start_at, end_at, all_day, kind, color, recurrence, creator_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING id",
        )
        .bind(dto.title.trim())
        .bind(&dto.description)
        .bind(dto.start_at)
        .bind(dto.end_at)
        .bind(dto.all_day)
        .bind(dto.kind)
        .bind(dto.color.as_deref().unwrap_or(DEFAULT_EVENT_COLOR))
        .bind(dto.recurrence.map(Json))
        .bind(actor.user_id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to insert event")
        .map_err(AppError::database)?;

        Self::link_courses(&mut tx, id, &dto.course_ids).await?;
        let event = Self::fetch_event(&mut tx, id).await?;

        tx.commit()
            .await
            .context("Failed to commit transaction")
            .map_err(AppError::database)?;

        info!(event.id = %id, "Calendar event created");
        Ok(event)
    }

    #[instrument(skip(db, dto), fields(db.operation = "UPDATE", db.table = "calendar_events"))]
    pub async fn update_event(
        db: &PgPool,
        actor: &Actor,
        id: EventId,
        dto: UpdateEventDto,
    ) -> Result<CalendarEvent, AppError> {
        let mut tx = db
            .begin()
            .await
            .context("Failed to begin transaction")
            .map_err(AppError::database)?;

        let existing = Self::fetch_event(&mut tx, id).await?;
        authorize(actor, Action::Update, &Self::creator_resource(&existing))?;

        dto.validate_window_against(&existing).map_err(|e| {
            AppError::bad_request(
                e.message
                    .map(|m| m.into_owned())
                    .unwrap_or_else(|| "Invalid time window".to_string()),
            )
        })?;

        if let Some(course_ids) = &dto.course_ids {
            Self::ensure_courses_exist(&mut tx, course_ids).await?;
        }

        sqlx::query(
            "UPDATE calendar_events
             SET title = COALESCE($2, title),
                 description = COALESCE($3, description),
                 start_at = COALESCE($4, start_at),
                 end_at = COALESCE($5, end_at),
                 all_day = COALESCE($6, all_day),
                 kind = COALESCE($7, kind),
                 color = COALESCE($8, color),
                 recurrence = COALESCE($9, recurrence),
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(dto.title.as_deref().map(str::trim))
        .bind(&dto.description)
        .bind(dto.start_at)
        .bind(dto.end_at)
        .bind(dto.all_day)
        .bind(dto.kind)
        .bind(&dto.color)
        .bind(dto.recurrence.map(Json))
        .execute(&mut *tx)
        .await
        .context("Failed to update event")
        .map_err(AppError::database)?;

        if let Some(course_ids) = &dto.course_ids {
            Self::link_courses(&mut tx, id, course_ids).await?;
        }

        let event = Self::fetch_event(&mut tx, id).await?;

        tx.commit()
            .await
            .context("Failed to commit transaction")
            .map_err(AppError::database)?;

        info!(event.id = %id, "Calendar event updated");
        Ok(event)
    }

    #[instrument(skip(db), fields(db.operation = "DELETE", db.table = "calendar_events"))]
    pub async fn delete_event(db: &PgPool, actor: &Actor, id: EventId) -> Result<(), AppError> {
        let mut conn = db
            .acquire()
            .await
            .context("Failed to acquire connection")
            .map_err(AppError::database)?;

        let existing = Self::fetch_event(&mut conn, id).await?;
        authorize(actor, Action::Delete, &Self::creator_resource(&existing))?;

        sqlx::query("DELETE FROM calendar_events WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await
            .context("Failed to delete event")
            .map_err(AppError::database)?;

        info!(event.id = %id, "Calendar event deleted");
        Ok(())
    }
}

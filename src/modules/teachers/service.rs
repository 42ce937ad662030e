use anyhow::Context;
use campus_core::{Action, Actor, AppError, PaginationMeta, Paginated, Resource, Role, authorize};
use campus_models::courses::{COURSE_SELECT, Course, CourseRow};
use campus_models::ids::TeacherId;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use tracing::{info, instrument};
use uuid::Uuid;

use super::model::{
    AvailabilitySlot, CreateTeacherDto, TEACHER_SELECT, Teacher, TeacherDetail,
    TeacherFilterParams, UpdateTeacherDto,
};
use crate::modules::users::service::UserService;

pub struct TeacherService;

impl TeacherService {
    pub async fn fetch_teacher(
        conn: &mut PgConnection,
        id: TeacherId,
    ) -> Result<Option<Teacher>, AppError> {
        sqlx::query_as::<_, Teacher>(&format!("{TEACHER_SELECT} WHERE t.id = $1"))
            .bind(id)
            .fetch_optional(conn)
            .await
            .context("Failed to fetch teacher")
            .map_err(AppError::database)
    }

    async fn require_teacher(conn: &mut PgConnection, id: TeacherId) -> Result<Teacher, AppError> {
        Self::fetch_teacher(conn, id)
            .await?
            .ok_or_else(|| AppError::not_found("Teacher not found"))
    }

    async fn availability(
        conn: &mut PgConnection,
        id: TeacherId,
    ) -> Result<Vec<AvailabilitySlot>, AppError> {
        sqlx::query_as::<_, AvailabilitySlot>(
            "SELECT weekday, start_time, end_time
             FROM teacher_availability
             WHERE teacher_id = $1
             ORDER BY weekday, start_time",
        )
        .bind(id)
        .fetch_all(conn)
        .await
        .context("Failed to fetch availability")
        .map_err(AppError::database)
    }

    async fn replace_availability(
        conn: &mut PgConnection,
        id: TeacherId,
        slots: &[AvailabilitySlot],
    ) -> Result<(), AppError> {
        sqlx::query("DELETE FROM teacher_availability WHERE teacher_id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await
            .context("Failed to clear availability")
            .map_err(AppError::database)?;

        for slot in slots {
            sqlx::query(
                "INSERT INTO teacher_availability (teacher_id, weekday, start_time, end_time)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(id)
            .bind(slot.weekday)
            .bind(slot.start_time)
            .bind(slot.end_time)
            .execute(&mut *conn)
            .await
            .context("Failed to insert availability slot")
            .map_err(AppError::database)?;
        }

        Ok(())
    }

    #[instrument(skip(db, dto), fields(db.operation = "INSERT", db.table = "teachers"))]
    pub async fn create_teacher(
        db: &PgPool,
        dto: CreateTeacherDto,
    ) -> Result<TeacherDetail, AppError> {
        let mut tx = db
            .begin()
            .await
            .context("Failed to begin transaction")
            .map_err(AppError::database)?;

        let user = UserService::insert_identity(
            &mut tx,
            &dto.full_name,
            &dto.email,
            &dto.password,
            Role::Teacher,
        )
        .await?;

        let id = sqlx::query_scalar::<_, TeacherId>(
            "INSERT INTO teachers (user_id, specialty, education, bio, phone, address)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id",
        )
        .bind(user.id)
        .bind(dto.specialty.trim())
        .bind(dto.education.map(Json))
        .bind(&dto.bio)
        .bind(&dto.phone)
        .bind(dto.address.map(Json))
        .fetch_one(&mut *tx)
        .await
        .context("Failed to insert teacher")
        .map_err(AppError::database)?;

        Self::replace_availability(&mut tx, id, &dto.availability).await?;

        let teacher = Self::require_teacher(&mut tx, id).await?;
        let availability = Self::availability(&mut tx, id).await?;

        tx.commit()
            .await
            .context("Failed to commit transaction")
            .map_err(AppError::database)?;

        info!(teacher.id = %id, user.id = %user.id, "Teacher created");
        Ok(TeacherDetail {
            teacher,
            availability,
        })
    }

    #[instrument(skip(db, filters), fields(db.operation = "SELECT", db.table = "teachers"))]
    pub async fn get_teachers(
        db: &PgPool,
        filters: TeacherFilterParams,
    ) -> Result<Paginated<Teacher>, AppError> {
        let name = filters.name.as_ref().map(|n| format!("%{n}%"));
        let specialty = filters.specialty.as_ref().map(|s| format!("%{s}%"));

        const WHERE: &str = "WHERE ($1::text IS NULL OR u.full_name ILIKE $1)
              AND ($2::text IS NULL OR t.specialty ILIKE $2)";

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM teachers t JOIN users u ON u.id = t.user_id {WHERE}"
        ))
        .bind(&name)
        .bind(&specialty)
        .fetch_one(db)
        .await
        .context("Failed to count teachers")
        .map_err(AppError::database)?;

        let teachers = sqlx::query_as::<_, Teacher>(&format!(
            "{TEACHER_SELECT} {WHERE} ORDER BY u.full_name LIMIT $3 OFFSET $4"
        ))
        .bind(&name)
        .bind(&specialty)
        .bind(filters.pagination.limit())
        .bind(filters.pagination.offset())
        .fetch_all(db)
        .await
        .context("Failed to fetch teachers")
        .map_err(AppError::database)?;

        Ok(Paginated::new(
            teachers,
            PaginationMeta::new(total, &filters.pagination),
        ))
    }

    #[instrument(skip(db))]
    pub async fn get_teacher(
        db: &PgPool,
        actor: &Actor,
        id: TeacherId,
    ) -> Result<TeacherDetail, AppError> {
        let mut conn = db
            .acquire()
            .await
            .context("Failed to acquire connection")
            .map_err(AppError::database)?;

        let teacher = Self::require_teacher(&mut conn, id).await?;
        authorize(
            actor,
            Action::Read,
            &Resource::Teacher {
                owner: teacher.user_id.into_inner(),
            },
        )?;

        let availability = Self::availability(&mut conn, id).await?;
        Ok(TeacherDetail {
            teacher,
            availability,
        })
    }

    #[instrument(skip(db, dto), fields(db.operation = "UPDATE", db.table = "teachers"))]
    pub async fn update_teacher(
        db: &PgPool,
        actor: &Actor,
        id: TeacherId,
        dto: UpdateTeacherDto,
    ) -> Result<Teacher, AppError> {
        let mut tx = db
            .begin()
            .await
            .context("Failed to begin transaction")
            .map_err(AppError::database)?;

        let existing = Self::require_teacher(&mut tx, id).await?;
        authorize(
            actor,
            Action::Update,
            &Resource::Teacher {
                owner: existing.user_id.into_inner(),
            },
        )?;

        UserService::update_identity(
            &mut tx,
            existing.user_id.into_inner(),
            dto.full_name.as_deref(),
            dto.email.as_ref(),
        )
        .await?;

        sqlx::query(
            "UPDATE teachers
             SET specialty = COALESCE($2, specialty),
                 education = COALESCE($3, education),
                 bio = COALESCE($4, bio),
                 phone = COALESCE($5, phone),
                 address = COALESCE($6, address),
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(dto.specialty.as_deref().map(str::trim))
        .bind(dto.education.map(Json))
        .bind(&dto.bio)
        .bind(&dto.phone)
        .bind(dto.address.map(Json))
        .execute(&mut *tx)
        .await
        .context("Failed to update teacher")
        .map_err(AppError::database)?;

        let teacher = Self::require_teacher(&mut tx, id).await?;

        tx.commit()
            .await
            .context("Failed to commit transaction")
            .map_err(AppError::database)?;

        info!(teacher.id = %id, "Teacher updated");
        Ok(teacher)
    }

    /// Rejected while the teacher has an active course. Remaining courses
    /// are unassigned, the profile is deleted and the identity deactivated.
    #[instrument(skip(db), fields(db.operation = "DELETE", db.table = "teachers"))]
    pub async fn delete_teacher(db: &PgPool, id: TeacherId) -> Result<(), AppError> {
        let mut tx = db
            .begin()
            .await
            .context("Failed to begin transaction")
            .map_err(AppError::database)?;

        let user_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM teachers WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to lock teacher")
        .map_err(AppError::database)?
        .ok_or_else(|| AppError::not_found("Teacher not found"))?;

        let active_courses = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM courses WHERE teacher_id = $1 AND status = 'active'",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to count active courses")
        .map_err(AppError::database)?;

        if active_courses > 0 {
            return Err(AppError::bad_request(
                "Teacher is assigned to active courses; reassign them first",
            ));
        }

        for statement in [
            "UPDATE courses SET teacher_id = NULL, updated_at = NOW() WHERE teacher_id = $1",
            "DELETE FROM teacher_courses WHERE teacher_id = $1",
            "DELETE FROM teacher_availability WHERE teacher_id = $1",
            "DELETE FROM teachers WHERE id = $1",
        ] {
            sqlx::query(statement)
                .bind(id)
                .execute(&mut *tx)
                .await
                .context("Failed to delete teacher data")
                .map_err(AppError::database)?;
        }

        UserService::deactivate(&mut tx, user_id).await?;

        tx.commit()
            .await
            .context("Failed to commit transaction")
            .map_err(AppError::database)?;

        info!(teacher.id = %id, user.id = %user_id, "Teacher deleted");
        Ok(())
    }

    /// Admin or the teacher themself; the same rule as profile edits.
    async fn authorize_private(
        conn: &mut PgConnection,
        actor: &Actor,
        id: TeacherId,
    ) -> Result<Teacher, AppError> {
        let teacher = Self::require_teacher(conn, id).await?;
        authorize(
            actor,
            Action::Update,
            &Resource::Teacher {
                owner: teacher.user_id.into_inner(),
            },
        )?;
        Ok(teacher)
    }

    #[instrument(skip(db))]
    pub async fn get_teacher_courses(
        db: &PgPool,
        actor: &Actor,
        id: TeacherId,
    ) -> Result<Vec<Course>, AppError> {
        let mut conn = db
            .acquire()
            .await
            .context("Failed to acquire connection")
            .map_err(AppError::database)?;

        Self::authorize_private(&mut conn, actor, id).await?;

        let rows = sqlx::query_as::<_, CourseRow>(&format!(
            "{COURSE_SELECT}
             JOIN teacher_courses tc ON tc.course_id = c.id
             WHERE tc.teacher_id = $1
             ORDER BY c.start_date DESC"
        ))
        .bind(id)
        .fetch_all(&mut *conn)
        .await
        .context("Failed to fetch teacher courses")
        .map_err(AppError::database)?;

        Ok(rows.into_iter().map(Course::from).collect())
    }

    #[instrument(skip(db))]
    pub async fn get_availability(
        db: &PgPool,
        actor: &Actor,
        id: TeacherId,
    ) -> Result<Vec<AvailabilitySlot>, AppError> {
        let mut conn = db
            .acquire()
            .await
            .context("Failed to acquire connection")
            .map_err(AppError::database)?;

        Self::authorize_private(&mut conn, actor, id).await?;
        Self::availability(&mut conn, id).await
    }

    #[instrument(skip(db, slots))]
    pub async fn set_availability(
        db: &PgPool,
        actor: &Actor,
        id: TeacherId,
        slots: Vec<AvailabilitySlot>,
    ) -> Result<Vec<AvailabilitySlot>, AppError> {
        let mut tx = db
            .begin()
            .await
            .context("Failed to begin transaction")
            .map_err(AppError::database)?;

        Self::authorize_private(&mut tx, actor, id).await?;
        Self::replace_availability(&mut tx, id, &slots).await?;
        let availability = Self::availability(&mut tx, id).await?;

        tx.commit()
            .await
            .context("Failed to commit transaction")
            .map_err(AppError::database)?;

        info!(teacher.id = %id, slots = availability.len(), "Availability replaced");
        Ok(availability)
    }
}

use anyhow::Context;
use campus_core::{Action, Actor, AppError, PaginationMeta, Paginated, Resource, authorize};
use campus_models::ids::{CourseId, MaterialId, TeacherId};
use sqlx::{PgConnection, PgPool};
use tracing::{info, instrument};
use uuid::Uuid;

use super::model::{
    COURSE_SELECT, Course, CourseDetail, CourseFilterParams, CourseMaterial, CourseRow,
    CourseStatus, CourseTeacher, CreateCourseDto, CreateMaterialDto, DEFAULT_CAPACITY,
    RosterEntry, RosterFilterParams, UpdateCourseDto,
};

const MATERIAL_COLUMNS: &str =
    "id, course_id, title, description, kind, url, file_key, uploaded_by, created_at";

pub struct CourseService;

impl CourseService {
    pub async fn fetch_course(
        conn: &mut PgConnection,
        id: CourseId,
    ) -> Result<Option<Course>, AppError> {
        let row = sqlx::query_as::<_, CourseRow>(&format!("{COURSE_SELECT} WHERE c.id = $1"))
            .bind(id)
            .fetch_optional(conn)
            .await
            .context("Failed to fetch course")
            .map_err(AppError::database)?;
        Ok(row.map(Course::from))
    }

    pub async fn require_course(conn: &mut PgConnection, id: CourseId) -> Result<Course, AppError> {
        Self::fetch_course(conn, id)
            .await?
            .ok_or_else(|| AppError::not_found("Course not found"))
    }

    /// User id of the teacher assigned to a course, for ownership checks.
    pub async fn teacher_user_id(
        conn: &mut PgConnection,
        teacher_id: Option<TeacherId>,
    ) -> Result<Option<Uuid>, AppError> {
        let Some(teacher_id) = teacher_id else {
            return Ok(None);
        };
        sqlx::query_scalar::<_, Uuid>("SELECT user_id FROM teachers WHERE id = $1")
            .bind(teacher_id)
            .fetch_optional(conn)
            .await
            .context("Failed to resolve course teacher")
            .map_err(AppError::database)
    }

    async fn authorize_course(
        conn: &mut PgConnection,
        actor: &Actor,
        action: Action,
        id: CourseId,
    ) -> Result<Course, AppError> {
        let course = Self::require_course(&mut *conn, id).await?;
        let teacher = Self::teacher_user_id(conn, course.teacher_id).await?;
        authorize(actor, action, &Resource::Course { teacher })?;
        Ok(course)
    }

    async fn ensure_teacher_exists(
        conn: &mut PgConnection,
        teacher_id: TeacherId,
    ) -> Result<(), AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM teachers WHERE id = $1)",
        )
        .bind(teacher_id)
        .fetch_one(conn)
        .await
        .context("Failed to check teacher")
        .map_err(AppError::database)?;

        if !exists {
            return Err(AppError::not_found("Teacher not found"));
        }
        Ok(())
    }

    async fn active_count(conn: &mut PgConnection, id: CourseId) -> Result<i64, AppError> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM course_roster WHERE course_id = $1 AND status = 'active'",
        )
        .bind(id)
        .fetch_one(conn)
        .await
        .context("Failed to count active roster")
        .map_err(AppError::database)
    }

    #[instrument(skip(db, filters), fields(db.operation = "SELECT", db.table = "courses"))]
    pub async fn get_courses(
        db: &PgPool,
        filters: CourseFilterParams,
    ) -> Result<Paginated<Course>, AppError> {
        let name = filters.name.as_ref().map(|n| format!("%{n}%"));

        const WHERE: &str = "WHERE ($1::course_status IS NULL OR c.status = $1)
              AND ($2::uuid IS NULL OR c.teacher_id = $2)
              AND ($3::text IS NULL OR $3 = ANY(c.categories))
              AND ($4::text IS NULL OR c.name ILIKE $4)";

        let total =
            sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM courses c {WHERE}"))
                .bind(filters.status)
                .bind(filters.teacher_id)
                .bind(&filters.category)
                .bind(&name)
                .fetch_one(db)
                .await
                .context("Failed to count courses")
                .map_err(AppError::database)?;

        let rows = sqlx::query_as::<_, CourseRow>(&format!(
            "{COURSE_SELECT} {WHERE} ORDER BY c.start_date DESC, c.name LIMIT $5 OFFSET $6"
        ))
        .bind(filters.status)
        .bind(filters.teacher_id)
        .bind(&filters.category)
        .bind(&name)
        .bind(filters.pagination.limit())
        .bind(filters.pagination.offset())
        .fetch_all(db)
        .await
        .context("Failed to fetch courses")
        .map_err(AppError::database)?;

        Ok(Paginated::new(
            rows.into_iter().map(Course::from).collect(),
            PaginationMeta::new(total, &filters.pagination),
        ))
    }

    #[instrument(skip(db))]
    pub async fn get_course(db: &PgPool, id: CourseId) -> Result<CourseDetail, AppError> {
        let mut conn = db
            .acquire()
            .await
            .context("Failed to acquire connection")
            .map_err(AppError::database)?;

        let course = Self::require_course(&mut conn, id).await?;

        let teacher = sqlx::query_as::<_, CourseTeacher>(
            "SELECT t.id, t.user_id, u.full_name, u.email
             FROM teachers t JOIN users u ON u.id = t.user_id
             WHERE t.id = $1",
        )
        .bind(course.teacher_id)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to fetch course teacher")
        .map_err(AppError::database)?;

        let materials = sqlx::query_as::<_, CourseMaterial>(&format!(
            "SELECT {MATERIAL_COLUMNS} FROM course_materials WHERE course_id = $1 ORDER BY created_at"
        ))
        .bind(id)
        .fetch_all(&mut *conn)
        .await
        .context("Failed to fetch course materials")
        .map_err(AppError::database)?;

        Ok(CourseDetail {
            course,
            teacher,
            materials,
        })
    }

    #[instrument(skip(db, dto), fields(db.operation = "INSERT", db.table = "courses"))]
    pub async fn create_course(db: &PgPool, dto: CreateCourseDto) -> Result<Course, AppError> {
        let mut tx = db
            .begin()
            .await
            .context("Failed to begin transaction")
            .map_err(AppError::database)?;

        Self::ensure_teacher_exists(&mut tx, dto.teacher_id).await?;

        let id = sqlx::query_scalar::<_, CourseId>(
            "INSERT INTO courses
                (name, description, teacher_id, total_hours, start_date, end_date, status, capacity, categories)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING id",
        )
        .bind(dto.name.trim())
        .bind(&dto.description)
        .bind(dto.teacher_id)
        .bind(dto.total_hours)
        .bind(dto.start_date)
        .bind(dto.end_date)
        .bind(dto.status.unwrap_or(CourseStatus::Planning))
        .bind(dto.capacity.unwrap_or(DEFAULT_CAPACITY))
        .bind(&dto.categories)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to insert course")
        .map_err(AppError::database)?;

        sqlx::query("INSERT INTO teacher_courses (teacher_id, course_id) VALUES ($1, $2)")
            .bind(dto.teacher_id)
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to assign course to teacher")
            .map_err(AppError::database)?;

        let course = Self::require_course(&mut tx, id).await?;

        tx.commit()
            .await
            .context("Failed to commit transaction")
            .map_err(AppError::database)?;

        info!(course.id = %id, teacher.id = %dto.teacher_id, "Course created");
        Ok(course)
    }

    /// Admin, or the course's own teacher. Only an admin may reassign the
    /// teacher, and capacity cannot drop below the active roster.
    #[instrument(skip(db, dto), fields(db.operation = "UPDATE", db.table = "courses"))]
    pub async fn update_course(
        db: &PgPool,
        actor: &Actor,
        id: CourseId,
        dto: UpdateCourseDto,
    ) -> Result<Course, AppError> {
        let mut tx = db
            .begin()
            .await
            .context("Failed to begin transaction")
            .map_err(AppError::database)?;

        sqlx::query("SELECT id FROM courses WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to lock course")
            .map_err(AppError::database)?
            .ok_or_else(|| AppError::not_found("Course not found"))?;

        let course = Self::authorize_course(&mut tx, actor, Action::Update, id).await?;

        let new_teacher = dto.teacher_id.filter(|t| Some(*t) != course.teacher_id);
        if new_teacher.is_some() && !actor.is_admin() {
            return Err(AppError::forbidden("Only an admin may change the course teacher"));
        }

        dto.validate_dates_against(&course).map_err(|e| {
            AppError::bad_request(
                e.message
                    .map(|m| m.into_owned())
                    .unwrap_or_else(|| "Invalid date range".to_string()),
            )
        })?;

        if let Some(capacity) = dto.capacity {
            let active = Self::active_count(&mut tx, id).await?;
            if i64::from(capacity) < active {
                return Err(AppError::bad_request(format!(
                    "Capacity cannot be lower than the {active} active enrollments"
                )));
            }
        }

        if let Some(teacher_id) = new_teacher {
            Self::ensure_teacher_exists(&mut tx, teacher_id).await?;
        }

        sqlx::query(
            "UPDATE courses
             SET name = COALESCE($2, name),
                 description = COALESCE($3, description),
                 teacher_id = COALESCE($4, teacher_id),
                 total_hours = COALESCE($5, total_hours),
                 start_date = COALESCE($6, start_date),
                 end_date = COALESCE($7, end_date),
                 status = COALESCE($8, status),
                 capacity = COALESCE($9, capacity),
                 categories = COALESCE($10, categories),
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(dto.name.as_deref().map(str::trim))
        .bind(&dto.description)
        .bind(new_teacher)
        .bind(dto.total_hours)
        .bind(dto.start_date)
        .bind(dto.end_date)
        .bind(dto.status)
        .bind(dto.capacity)
        .bind(&dto.categories)
        .execute(&mut *tx)
        .await
        .context("Failed to update course")
        .map_err(AppError::database)?;

        if let Some(teacher_id) = new_teacher {
            sqlx::query("DELETE FROM teacher_courses WHERE course_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await
                .context("Failed to unassign previous teacher")
                .map_err(AppError::database)?;

            sqlx::query(
                "INSERT INTO teacher_courses (teacher_id, course_id) VALUES ($1, $2)
                 ON CONFLICT DO NOTHING",
            )
            .bind(teacher_id)
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to assign new teacher")
            .map_err(AppError::database)?;

            info!(
                course.id = %id,
                from = ?course.teacher_id,
                to = %teacher_id,
                "Course teacher changed"
            );
        }

        let course = Self::require_course(&mut tx, id).await?;

        tx.commit()
            .await
            .context("Failed to commit transaction")
            .map_err(AppError::database)?;

        Ok(course)
    }

    /// Rejected while the course is active with anyone actively enrolled.
    #[instrument(skip(db), fields(db.operation = "DELETE", db.table = "courses"))]
    pub async fn delete_course(db: &PgPool, id: CourseId) -> Result<(), AppError> {
        let mut tx = db
            .begin()
            .await
            .context("Failed to begin transaction")
            .map_err(AppError::database)?;

        let status = sqlx::query_scalar::<_, CourseStatus>(
            "SELECT status FROM courses WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to lock course")
        .map_err(AppError::database)?
        .ok_or_else(|| AppError::not_found("Course not found"))?;

        let active = Self::active_count(&mut tx, id).await?;
        if status == CourseStatus::Active && active > 0 {
            return Err(AppError::bad_request(
                "Cannot delete an active course with enrolled students; cancel or complete it first",
            ));
        }

        for statement in [
            "DELETE FROM teacher_courses WHERE course_id = $1",
            "DELETE FROM course_roster WHERE course_id = $1",
            "DELETE FROM student_enrollments WHERE course_id = $1",
            "DELETE FROM calendar_event_courses WHERE course_id = $1",
            "DELETE FROM course_materials WHERE course_id = $1",
            "DELETE FROM courses WHERE id = $1",
        ] {
            sqlx::query(statement)
                .bind(id)
                .execute(&mut *tx)
                .await
                .context("Failed to delete course data")
                .map_err(AppError::database)?;
        }

        tx.commit()
            .await
            .context("Failed to commit transaction")
            .map_err(AppError::database)?;

        info!(course.id = %id, "Course deleted");
        Ok(())
    }

    #[instrument(skip(db))]
    pub async fn get_roster(
        db: &PgPool,
        actor: &Actor,
        id: CourseId,
        params: RosterFilterParams,
    ) -> Result<Vec<RosterEntry>, AppError> {
        let mut conn = db
            .acquire()
            .await
            .context("Failed to acquire connection")
            .map_err(AppError::database)?;

        Self::authorize_course(&mut conn, actor, Action::ManageCourse, id).await?;

        sqlx::query_as::<_, RosterEntry>(
            "SELECT r.student_id, s.user_id, u.full_name, u.email, s.enrollment_number,
                    r.status, r.enrolled_at
             FROM course_roster r
             JOIN students s ON s.id = r.student_id
             JOIN users u ON u.id = s.user_id
             WHERE r.course_id = $1
               AND ($2::enrollment_status IS NULL OR r.status = $2)
             ORDER BY r.enrolled_at",
        )
        .bind(id)
        .bind(params.status)
        .fetch_all(&mut *conn)
        .await
        .context("Failed to fetch roster")
        .map_err(AppError::database)
    }

    #[instrument(skip(db, dto))]
    pub async fn add_material(
        db: &PgPool,
        actor: &Actor,
        id: CourseId,
        dto: CreateMaterialDto,
    ) -> Result<CourseMaterial, AppError> {
        let mut conn = db
            .acquire()
            .await
            .context("Failed to acquire connection")
            .map_err(AppError::database)?;

        Self::authorize_course(&mut conn, actor, Action::ManageCourse, id).await?;

        let material = sqlx::query_as::<_, CourseMaterial>(&format!(
            "INSERT INTO course_materials (course_id, title, description, kind, url, file_key, uploaded_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {MATERIAL_COLUMNS}"
        ))
        .bind(id)
        .bind(dto.title.trim())
        .bind(&dto.description)
        .bind(dto.kind)
        .bind(&dto.url)
        .bind(&dto.file_key)
        .bind(actor.user_id)
        .fetch_one(&mut *conn)
        .await
        .context("Failed to insert material")
        .map_err(AppError::database)?;

        info!(course.id = %id, material.id = %material.id, "Material added");
        Ok(material)
    }

    #[instrument(skip(db))]
    pub async fn delete_material(
        db: &PgPool,
        actor: &Actor,
        id: CourseId,
        material_id: MaterialId,
    ) -> Result<(), AppError> {
        let mut conn = db
            .acquire()
            .await
            .context("Failed to acquire connection")
            .map_err(AppError::database)?;

        Self::authorize_course(&mut conn, actor, Action::ManageCourse, id).await?;

        let result = sqlx::query("DELETE FROM course_materials WHERE id = $1 AND course_id = $2")
            .bind(material_id)
            .bind(id)
            .execute(&mut *conn)
            .await
            .context("Failed to delete material")
            .map_err(AppError::database)?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Material not found"));
        }
        Ok(())
    }
}

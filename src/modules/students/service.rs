use anyhow::Context;
use campus_core::{Action, Actor, AppError, PaginationMeta, Paginated, Resource, Role, authorize};
use campus_models::ids::{CourseId, StudentId};
use campus_models::progress::{ProgressParams, StudentAttendance, StudentGrade};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use tracing::{info, instrument};
use uuid::Uuid;

use super::model::{
    AcademicRecord, AcademicRecordInput, CreateStudentDto, STUDENT_SELECT, Student,
    StudentCoursesParams, StudentDetail, StudentEnrollment, StudentFilterParams, UpdateStudentDto,
};
use crate::modules::users::service::UserService;

pub struct StudentService;

impl StudentService {
    async fn enrollment_number_taken(
        conn: &mut PgConnection,
        enrollment_number: &str,
        exclude: Option<StudentId>,
    ) -> Result<bool, AppError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM students WHERE enrollment_number = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(enrollment_number)
        .bind(exclude)
        .fetch_one(conn)
        .await
        .context("Failed to check enrollment number")
        .map_err(AppError::database)
    }

    async fn fetch_student(
        conn: &mut PgConnection,
        id: StudentId,
    ) -> Result<Option<Student>, AppError> {
        sqlx::query_as::<_, Student>(&format!("{STUDENT_SELECT} WHERE s.id = $1"))
            .bind(id)
            .fetch_optional(conn)
            .await
            .context("Failed to fetch student")
            .map_err(AppError::database)
    }

    /// The student profile owned by `user_id`, if any.
    pub async fn profile_id_for_user(
        db: &PgPool,
        user_id: Uuid,
    ) -> Result<Option<StudentId>, AppError> {
        sqlx::query_scalar::<_, StudentId>("SELECT id FROM students WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(db)
            .await
            .context("Failed to resolve student profile")
            .map_err(AppError::database)
    }

    #[instrument(skip(db, dto), fields(db.operation = "INSERT", db.table = "students"))]
    pub async fn create_student(
        db: &PgPool,
        dto: CreateStudentDto,
    ) -> Result<Student, AppError> {
        let mut tx = db
            .begin()
            .await
            .context("Failed to begin transaction")
            .map_err(AppError::database)?;

        if Self::enrollment_number_taken(&mut tx, &dto.enrollment_number, None).await? {
            return Err(AppError::conflict("Enrollment number already in use"));
        }

        let user = UserService::insert_identity(
            &mut tx,
            &dto.full_name,
            &dto.email,
            &dto.password,
            Role::Student,
        )
        .await?;

        let id = sqlx::query_scalar::<_, StudentId>(
            "INSERT INTO students (user_id, enrollment_number, address, phone, birth_date)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id",
        )
        .bind(user.id)
        .bind(&dto.enrollment_number)
        .bind(dto.address.map(Json))
        .bind(&dto.phone)
        .bind(dto.birth_date)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to insert student")
        .map_err(AppError::database)?;

        let student = Self::fetch_student(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::internal_error("Student vanished after insert"))?;

        tx.commit()
            .await
            .context("Failed to commit transaction")
            .map_err(AppError::database)?;

        info!(student.id = %id, user.id = %user.id, "Student created");
        Ok(student)
    }

    #[instrument(skip(db, filters), fields(db.operation = "SELECT", db.table = "students"))]
    pub async fn get_students(
        db: &PgPool,
        filters: StudentFilterParams,
    ) -> Result<Paginated<Student>, AppError> {
        let name = filters.name.as_ref().map(|n| format!("%{n}%"));
        let enrollment_number = filters
            .enrollment_number
            .as_ref()
            .map(|n| format!("%{}%", n.to_uppercase()));

        const WHERE: &str = "WHERE ($1::text IS NULL OR u.full_name ILIKE $1)
              AND ($2::text IS NULL OR s.enrollment_number LIKE $2)";

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM students s JOIN users u ON u.id = s.user_id {WHERE}"
        ))
        .bind(&name)
        .bind(&enrollment_number)
        .fetch_one(db)
        .await
        .context("Failed to count students")
        .map_err(AppError::database)?;

        let students = sqlx::query_as::<_, Student>(&format!(
            "{STUDENT_SELECT} {WHERE} ORDER BY u.full_name LIMIT $3 OFFSET $4"
        ))
        .bind(&name)
        .bind(&enrollment_number)
        .bind(filters.pagination.limit())
        .bind(filters.pagination.offset())
        .fetch_all(db)
        .await
        .context("Failed to fetch students")
        .map_err(AppError::database)?;

        Ok(Paginated::new(
            students,
            PaginationMeta::new(total, &filters.pagination),
        ))
    }

    /// Profile plus enrollments and academic history. Staff or the student themself.
    #[instrument(skip(db))]
    pub async fn get_student(
        db: &PgPool,
        actor: &Actor,
        id: StudentId,
    ) -> Result<StudentDetail, AppError> {
        let mut conn = db
            .acquire()
            .await
            .context("Failed to acquire connection")
            .map_err(AppError::database)?;

        let student = Self::readable_student(&mut conn, actor, id).await?;
        let enrollments = Self::enrollments(&mut conn, id, None).await?;

        let academic_history = sqlx::query_as::<_, AcademicRecord>(
            "SELECT course_id, final_grade, attendance_pct, status, notes, completed_at
             FROM academic_history
             WHERE student_id = $1
             ORDER BY completed_at DESC NULLS FIRST",
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await
        .context("Failed to fetch academic history")
        .map_err(AppError::database)?;

        Ok(StudentDetail {
            student,
            enrollments,
            academic_history,
        })
    }

    async fn enrollments(
        conn: &mut PgConnection,
        id: StudentId,
        params: Option<&StudentCoursesParams>,
    ) -> Result<Vec<StudentEnrollment>, AppError> {
        sqlx::query_as::<_, StudentEnrollment>(
            "SELECT e.course_id, c.name AS course_name, c.status AS course_status,
                    e.status, e.enrolled_at
             FROM student_enrollments e
             JOIN courses c ON c.id = e.course_id
             WHERE e.student_id = $1
               AND ($2::enrollment_status IS NULL OR e.status = $2)
             ORDER BY e.enrolled_at DESC",
        )
        .bind(id)
        .bind(params.and_then(|p| p.status))
        .fetch_all(conn)
        .await
        .context("Failed to fetch student enrollments")
        .map_err(AppError::database)
    }

    #[instrument(skip(db))]
    pub async fn get_student_courses(
        db: &PgPool,
        actor: &Actor,
        id: StudentId,
        params: StudentCoursesParams,
    ) -> Result<Vec<StudentEnrollment>, AppError> {
        let mut conn = db
            .acquire()
            .await
            .context("Failed to acquire connection")
            .map_err(AppError::database)?;

        Self::readable_student(&mut conn, actor, id).await?;
        Self::enrollments(&mut conn, id, Some(&params)).await
    }

    async fn readable_student(
        conn: &mut PgConnection,
        actor: &Actor,
        id: StudentId,
    ) -> Result<Student, AppError> {
        let student = Self::fetch_student(conn, id)
            .await?
            .ok_or_else(|| AppError::not_found("Student not found"))?;
        authorize(
            actor,
            Action::Read,
            &Resource::Student {
                owner: student.user_id.into_inner(),
            },
        )?;
        Ok(student)
    }

    /// Grades recorded for the student, oldest assessment first.
    #[instrument(skip(db))]
    pub async fn get_student_grades(
        db: &PgPool,
        actor: &Actor,
        id: StudentId,
        params: ProgressParams,
    ) -> Result<Vec<StudentGrade>, AppError> {
        let mut conn = db
            .acquire()
            .await
            .context("Failed to acquire connection")
            .map_err(AppError::database)?;
        Self::readable_student(&mut conn, actor, id).await?;

        sqlx::query_as::<_, StudentGrade>(
            "SELECT a.id AS assessment_id, a.title AS assessment_title, a.kind, a.weight,
                    a.applied_on, c.id AS course_id, c.name AS course_name,
                    g.value, g.notes, g.recorded_at
             FROM assessment_grades g
             JOIN assessments a ON a.id = g.assessment_id
             JOIN courses c ON c.id = a.course_id
             WHERE g.student_id = $1
               AND CASE
                   WHEN $2::uuid IS NOT NULL THEN a.course_id = $2
                   ELSE a.course_id IN (
                       SELECT course_id FROM student_enrollments WHERE student_id = $1
                   )
               END
             ORDER BY a.applied_on, a.title",
        )
        .bind(id)
        .bind(params.course_id)
        .fetch_all(&mut *conn)
        .await
        .context("Failed to fetch grades")
        .map_err(AppError::database)
    }

    /// Attendance records for the student, in lesson order.
    #[instrument(skip(db))]
    pub async fn get_student_attendance(
        db: &PgPool,
        actor: &Actor,
        id: StudentId,
        params: ProgressParams,
    ) -> Result<Vec<StudentAttendance>, AppError> {
        let mut conn = db
            .acquire()
            .await
            .context("Failed to acquire connection")
            .map_err(AppError::database)?;
        Self::readable_student(&mut conn, actor, id).await?;

        sqlx::query_as::<_, StudentAttendance>(
            "SELECT l.id AS lesson_id, l.title AS lesson_title, l.starts_at, l.duration_minutes,
                    c.id AS course_id, c.name AS course_name, la.status, la.justification
             FROM lesson_attendance la
             JOIN lessons l ON l.id = la.lesson_id
             JOIN courses c ON c.id = l.course_id
             WHERE la.student_id = $1
               AND CASE
                   WHEN $2::uuid IS NOT NULL THEN l.course_id = $2
                   ELSE l.course_id IN (
                       SELECT course_id FROM student_enrollments WHERE student_id = $1
                   )
               END
             ORDER BY l.starts_at",
        )
        .bind(id)
        .bind(params.course_id)
        .fetch_all(&mut *conn)
        .await
        .context("Failed to fetch attendance")
        .map_err(AppError::database)
    }

    async fn replace_academic_history(
        conn: &mut PgConnection,
        id: StudentId,
        records: &[AcademicRecordInput],
    ) -> Result<(), AppError> {
        let course_ids: Vec<CourseId> = records.iter().map(|r| r.course_id).collect();
        let known = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(DISTINCT id) FROM courses WHERE id = ANY($1)",
        )
        .bind(&course_ids)
        .fetch_one(&mut *conn)
        .await
        .context("Failed to check courses")
        .map_err(AppError::database)?;

        let mut distinct = course_ids.clone();
        distinct.sort_by_key(|c| c.into_inner());
        distinct.dedup();
        if known != distinct.len() as i64 {
            return Err(AppError::bad_request(
                "Academic history references an unknown course",
            ));
        }

        sqlx::query("DELETE FROM academic_history WHERE student_id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await
            .context("Failed to clear academic history")
            .map_err(AppError::database)?;

        for record in records {
            sqlx::query(
                "INSERT INTO academic_history
                    (student_id, course_id, final_grade, attendance_pct, status, notes, completed_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(id)
            .bind(record.course_id)
            .bind(record.final_grade)
            .bind(record.attendance_pct)
            .bind(record.status)
            .bind(&record.notes)
            .bind(record.completed_at)
            .execute(&mut *conn)
            .await
            .context("Failed to insert academic record")
            .map_err(AppError::database)?;
        }

        Ok(())
    }

    #[instrument(skip(db, dto), fields(db.operation = "UPDATE", db.table = "students"))]
    pub async fn update_student(
        db: &PgPool,
        id: StudentId,
        dto: UpdateStudentDto,
    ) -> Result<Student, AppError> {
        let mut tx = db
            .begin()
            .await
            .context("Failed to begin transaction")
            .map_err(AppError::database)?;

        let existing = Self::fetch_student(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::not_found("Student not found"))?;

        if let Some(number) = &dto.enrollment_number
            && Self::enrollment_number_taken(&mut tx, number, Some(id)).await?
        {
            return Err(AppError::conflict("Enrollment number already in use"));
        }

        UserService::update_identity(
            &mut tx,
            existing.user_id.into_inner(),
            dto.full_name.as_deref(),
            dto.email.as_ref(),
        )
        .await?;

        sqlx::query(
            "UPDATE students
             SET enrollment_number = COALESCE($2, enrollment_number),
                 address = COALESCE($3, address),
                 phone = COALESCE($4, phone),
                 birth_date = COALESCE($5, birth_date),
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(&dto.enrollment_number)
        .bind(dto.address.map(Json))
        .bind(&dto.phone)
        .bind(dto.birth_date)
        .execute(&mut *tx)
        .await
        .context("Failed to update student")
        .map_err(AppError::database)?;

        if let Some(records) = &dto.academic_history {
            Self::replace_academic_history(&mut tx, id, records).await?;
        }

        let student = Self::fetch_student(&mut tx, id)
            .await?
            .ok_or_else(|| AppError::not_found("Student not found"))?;

        tx.commit()
            .await
            .context("Failed to commit transaction")
            .map_err(AppError::database)?;

        info!(student.id = %id, "Student updated");
        Ok(student)
    }

    /// Rejected while the student holds an active enrollment. Otherwise the
    /// roster and enrollment rows go, the profile goes, and the identity is
    /// deactivated.
    #[instrument(skip(db), fields(db.operation = "DELETE", db.table = "students"))]
    pub async fn delete_student(db: &PgPool, id: StudentId) -> Result<(), AppError> {
        let mut tx = db
            .begin()
            .await
            .context("Failed to begin transaction")
            .map_err(AppError::database)?;

        let user_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM students WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to lock student")
        .map_err(AppError::database)?
        .ok_or_else(|| AppError::not_found("Student not found"))?;

        let active = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM course_roster WHERE student_id = $1 AND status = 'active'",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to count active enrollments")
        .map_err(AppError::database)?;

        if active > 0 {
            return Err(AppError::bad_request(
                "Student has active enrollments; withdraw them first",
            ));
        }

        for statement in [
            "DELETE FROM course_roster WHERE student_id = $1",
            "DELETE FROM student_enrollments WHERE student_id = $1",
            "DELETE FROM academic_history WHERE student_id = $1",
            "DELETE FROM students WHERE id = $1",
        ] {
            sqlx::query(statement)
                .bind(id)
                .execute(&mut *tx)
                .await
                .context("Failed to delete student data")
                .map_err(AppError::database)?;
        }

        UserService::deactivate(&mut tx, user_id).await?;

        tx.commit()
            .await
            .context("Failed to commit transaction")
            .map_err(AppError::database)?;

        info!(student.id = %id, user.id = %user_id, "Student deleted");
        Ok(())
    }
}

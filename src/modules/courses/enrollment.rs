//! Enrollment and withdrawal.
//!
//! `course_roster` and `student_enrollments` are written together in one
//! transaction, with the course row locked first so concurrent enrollments
//! into the same course are serialised. Seats are always recounted from the
//! roster, never stored.

use anyhow::Context;
use campus_core::{Action, Actor, AppError, Resource, Role, authorize};
use campus_models::courses::{CourseStatus, EnrollmentResult, EnrollmentStatus, available_seats};
use campus_models::ids::{CourseId, StudentId};
use serde_json::json;
use sqlx::{FromRow, PgConnection, PgPool};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::metrics::{track_enrollment, track_withdrawal};
use crate::modules::notifications::events::Notification;
use crate::modules::notifications::hub::NotificationHub;
use crate::modules::students::service::StudentService;

#[derive(FromRow)]
struct LockedCourse {
    name: String,
    status: CourseStatus,
    capacity: i32,
}

/// A committed enrollment change plus what is needed to tell the student.
#[derive(Debug, Clone)]
pub struct EnrollmentOutcome {
    pub result: EnrollmentResult,
    pub course_name: String,
    pub student_user_id: Uuid,
}

pub struct EnrollmentService;

impl EnrollmentService {
    /// The student an enroll/withdraw request is about. Students may omit the
    /// id to mean themselves; admins must name one.
    pub async fn resolve_student(
        db: &PgPool,
        actor: &Actor,
        requested: Option<StudentId>,
    ) -> Result<StudentId, AppError> {
        if let Some(id) = requested {
            return Ok(id);
        }
        match actor.role {
            Role::Student => StudentService::profile_id_for_user(db, actor.user_id)
                .await?
                .ok_or_else(|| AppError::not_found("Student profile not found")),
            Role::Admin => Err(AppError::bad_request("student_id is required")),
            Role::Teacher => Err(AppError::forbidden(
                "Teachers cannot enroll or withdraw students",
            )),
        }
    }

    async fn lock_course(
        conn: &mut PgConnection,
        course_id: CourseId,
    ) -> Result<LockedCourse, AppError> {
        sqlx::query_as::<_, LockedCourse>(
            "SELECT name, status, capacity FROM courses WHERE id = $1 FOR UPDATE",
        )
        .bind(course_id)
        .fetch_optional(conn)
        .await
        .context("Failed to lock course")
        .map_err(AppError::database)?
        .ok_or_else(|| AppError::not_found("Course not found"))
    }

    async fn student_owner(
        conn: &mut PgConnection,
        student_id: StudentId,
    ) -> Result<Uuid, AppError> {
        sqlx::query_scalar::<_, Uuid>("SELECT user_id FROM students WHERE id = $1")
            .bind(student_id)
            .fetch_optional(conn)
            .await
            .context("Failed to load student")
            .map_err(AppError::database)?
            .ok_or_else(|| AppError::not_found("Student not found"))
    }

    async fn seats_left(
        conn: &mut PgConnection,
        course_id: CourseId,
        capacity: i32,
    ) -> Result<i64, AppError> {
        let active = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM course_roster WHERE course_id = $1 AND status = 'active'",
        )
        .bind(course_id)
        .fetch_one(conn)
        .await
        .context("Failed to count active roster")
        .map_err(AppError::database)?;
        Ok(available_seats(capacity, active))
    }

    /// Enrolls inside the caller's transaction. Checks run in order: course
    /// exists, course open, student exists, caller allowed, not already
    /// enrolled, seat available.
    pub async fn enroll_in(
        conn: &mut PgConnection,
        actor: &Actor,
        course_id: CourseId,
        student_id: StudentId,
    ) -> Result<EnrollmentOutcome, AppError> {
        let course = Self::lock_course(&mut *conn, course_id).await?;

        if course.status != CourseStatus::OpenEnrollment {
            return Err(AppError::bad_request("Course is not open for enrollment"));
        }

        let student_user_id = Self::student_owner(&mut *conn, student_id).await?;
        authorize(
            actor,
            Action::Enroll,
            &Resource::Enrollment {
                student: student_user_id,
            },
        )?;

        let already_active = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(
                SELECT 1 FROM course_roster
                WHERE course_id = $1 AND student_id = $2 AND status = 'active'
             )",
        )
        .bind(course_id)
        .bind(student_id)
        .fetch_one(&mut *conn)
        .await
        .context("Failed to check existing enrollment")
        .map_err(AppError::database)?;

        if already_active {
            return Err(AppError::conflict(
                "Student is already enrolled in this course",
            ));
        }

        if Self::seats_left(&mut *conn, course_id, course.capacity).await? == 0 {
            return Err(AppError::conflict("Course is full"));
        }

        for statement in [
            "INSERT INTO course_roster (course_id, student_id, status, enrolled_at)
             VALUES ($1, $2, 'active', NOW())
             ON CONFLICT (course_id, student_id)
             DO UPDATE SET status = 'active', enrolled_at = NOW(), updated_at = NOW()",
            "INSERT INTO student_enrollments (course_id, student_id, status, enrolled_at)
             VALUES ($1, $2, 'active', NOW())
             ON CONFLICT (course_id, student_id)
             DO UPDATE SET status = 'active', enrolled_at = NOW(), updated_at = NOW()",
        ] {
            sqlx::query(statement)
                .bind(course_id)
                .bind(student_id)
                .execute(&mut *conn)
                .await
                .context("Failed to write enrollment")
                .map_err(AppError::database)?;
        }

        let seats = Self::seats_left(conn, course_id, course.capacity).await?;

        Ok(EnrollmentOutcome {
            result: EnrollmentResult {
                course_id,
                student_id,
                status: EnrollmentStatus::Active,
                available_seats: seats,
            },
            course_name: course.name,
            student_user_id,
        })
    }

    /// Withdraws inside the caller's transaction. Both the roster row and
    /// the mirrored student row are marked withdrawn.
    pub async fn withdraw_in(
        conn: &mut PgConnection,
        actor: &Actor,
        course_id: CourseId,
        student_id: StudentId,
    ) -> Result<EnrollmentOutcome, AppError> {
        let course = Self::lock_course(&mut *conn, course_id).await?;
        let student_user_id = Self::student_owner(&mut *conn, student_id).await?;
        authorize(
            actor,
            Action::Withdraw,
            &Resource::Enrollment {
                student: student_user_id,
            },
        )?;

        let roster = sqlx::query(
            "UPDATE course_roster SET status = 'withdrawn', updated_at = NOW()
             WHERE course_id = $1 AND student_id = $2 AND status = 'active'",
        )
        .bind(course_id)
        .bind(student_id)
        .execute(&mut *conn)
        .await
        .context("Failed to withdraw roster entry")
        .map_err(AppError::database)?;

        if roster.rows_affected() == 0 {
            return Err(AppError::not_found(
                "No active enrollment for this student in this course",
            ));
        }

        sqlx::query(
            "UPDATE student_enrollments SET status = 'withdrawn', updated_at = NOW()
             WHERE course_id = $1 AND student_id = $2",
        )
        .bind(course_id)
        .bind(student_id)
        .execute(&mut *conn)
        .await
        .context("Failed to withdraw student enrollment")
        .map_err(AppError::database)?;

        let seats = Self::seats_left(conn, course_id, course.capacity).await?;

        Ok(EnrollmentOutcome {
            result: EnrollmentResult {
                course_id,
                student_id,
                status: EnrollmentStatus::Withdrawn,
                available_seats: seats,
            },
            course_name: course.name,
            student_user_id,
        })
    }

    /// Enrolls `student_id` in `course_id` in its own transaction, then sends
    /// the student an `enrollment` notification.
    ///
    /// The seat count is re-read under the course row lock taken by
    /// [`Self::enroll_in`], so concurrent requests cannot overfill a course.
    /// Every outcome, including rejections, is counted in the
    /// `enrollments_total` metric.
    ///
    /// # Errors
    ///
    /// * 404 when the course or student does not exist.
    /// * 400 when the course is not `active`.
    /// * 403 when the actor may not enroll this student.
    /// * 409 when the student is already enrolled or no seat is left.
    #[instrument(skip(db, hub))]
    pub async fn enroll(
        db: &PgPool,
        hub: &NotificationHub,
        actor: &Actor,
        course_id: CourseId,
        student_id: StudentId,
    ) -> Result<EnrollmentResult, AppError> {
        let mut tx = db
            .begin()
            .await
            .context("Failed to begin transaction")
            .map_err(AppError::database)?;

        let outcome = match Self::enroll_in(&mut tx, actor, course_id, student_id).await {
            Ok(outcome) => outcome,
            Err(err) => {
                track_enrollment(outcome_label(&err));
                return Err(err);
            }
        };

        tx.commit()
            .await
            .context("Failed to commit enrollment")
            .map_err(AppError::database)?;

        track_enrollment("enrolled");
        info!(
            course.id = %course_id,
            student.id = %student_id,
            available_seats = outcome.result.available_seats,
            "Student enrolled"
        );

        let notification = Notification::new(
            "enrollment",
            "Enrollment confirmed",
            format!("You are enrolled in {}", outcome.course_name),
        )
        .with_data(json!({ "course_id": course_id }));
        hub.notify_user(outcome.student_user_id, notification).await;

        Ok(outcome.result)
    }

    #[instrument(skip(db, hub))]
    pub async fn withdraw(
        db: &PgPool,
        hub: &NotificationHub,
        actor: &Actor,
        course_id: CourseId,
        student_id: StudentId,
    ) -> Result<EnrollmentResult, AppError> {
        let mut tx = db
            .begin()
            .await
            .context("Failed to begin transaction")
            .map_err(AppError::database)?;

        let outcome = Self::withdraw_in(&mut tx, actor, course_id, student_id).await?;

        tx.commit()
            .await
            .context("Failed to commit withdrawal")
            .map_err(AppError::database)?;

        track_withdrawal();
        info!(
            course.id = %course_id,
            student.id = %student_id,
            available_seats = outcome.result.available_seats,
            "Student withdrawn"
        );

        let notification = Notification::new(
            "withdrawal",
            "Enrollment withdrawn",
            format!("You have been withdrawn from {}", outcome.course_name),
        )
        .with_data(json!({ "course_id": course_id }));
        hub.notify_user(outcome.student_user_id, notification).await;

        Ok(outcome.result)
    }
}

fn outcome_label(err: &AppError) -> &'static str {
    match err.status.as_u16() {
        400 => "closed",
        403 => "forbidden",
        404 => "not_found",
        409 => "conflict",
        _ => "error",
    }
}

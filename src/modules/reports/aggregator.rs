//! Report payload computation.
//!
//! The report service only depends on [`ReportAggregator`]; the default
//! implementation reads live figures from the database.

use std::future::Future;
use std::pin::Pin;

use anyhow::{Context, anyhow};
use campus_models::ids::CourseId;
use campus_models::reports::{ReportKind, ReportRequest};
use serde::Serialize;
use serde_json::{Value, json};
use sqlx::{FromRow, PgPool};

pub type AggregateFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send + 'a>>;

pub trait ReportAggregator: Send + Sync {
    /// Compute the payload for a report. An error marks the report as failed.
    fn aggregate<'a>(&'a self, request: &'a ReportRequest) -> AggregateFuture<'a>;
}

#[derive(Debug, Serialize, FromRow)]
struct CoursePerformance {
    course_id: CourseId,
    course_name: String,
    total_students: i64,
    active_students: i64,
    completed_students: i64,
    average_grade: Option<f64>,
    min_grade: Option<f64>,
    max_grade: Option<f64>,
}

#[derive(Debug, Serialize, FromRow)]
struct CourseAttendance {
    course_id: CourseId,
    course_name: String,
    records: i64,
    average_attendance: Option<f64>,
}

#[derive(Debug, Serialize, FromRow)]
struct StatusCount {
    status: String,
    count: i64,
}

#[derive(Clone)]
pub struct DatabaseReportAggregator {
    db: PgPool,
}

impl DatabaseReportAggregator {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn performance(&self, courses: &[CourseId]) -> anyhow::Result<Value> {
        let rows = sqlx::query_as::<_, CoursePerformance>(
            "SELECT c.id AS course_id, c.name AS course_name,
                    (SELECT COUNT(*) FROM course_roster r WHERE r.course_id = c.id) AS total_students,
                    (SELECT COUNT(*) FROM course_roster r
                      WHERE r.course_id = c.id AND r.status = 'active') AS active_students,
                    (SELECT COUNT(*) FROM course_roster r
                      WHERE r.course_id = c.id AND r.status = 'completed') AS completed_students,
                    AVG(h.final_grade) AS average_grade,
                    MIN(h.final_grade) AS min_grade,
                    MAX(h.final_grade) AS max_grade
             FROM courses c
             LEFT JOIN academic_history h ON h.course_id = c.id
             WHERE (cardinality($1::uuid[]) = 0 OR c.id = ANY($1))
             GROUP BY c.id, c.name
             ORDER BY c.name",
        )
        .bind(courses)
        .fetch_all(&self.db)
        .await
        .context("Failed to aggregate course performance")?;

        Ok(json!({ "courses": rows }))
    }

    async fn attendance(&self, courses: &[CourseId]) -> anyhow::Result<Value> {
        let rows = sqlx::query_as::<_, CourseAttendance>(
            "SELECT c.id AS course_id, c.name AS course_name,
                    COUNT(h.attendance_pct) AS records,
                    AVG(h.attendance_pct) AS average_attendance
             FROM courses c
             LEFT JOIN academic_history h ON h.course_id = c.id
             WHERE (cardinality($1::uuid[]) = 0 OR c.id = ANY($1))
             GROUP BY c.id, c.name
             ORDER BY c.name",
        )
        .bind(courses)
        .fetch_all(&self.db)
        .await
        .context("Failed to aggregate attendance")?;

        Ok(json!({ "courses": rows }))
    }

    async fn administrative(&self) -> anyhow::Result<Value> {
        let students = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM students s
             JOIN users u ON u.id = s.user_id
             WHERE u.active",
        )
        .fetch_one(&self.db)
        .await
        .context("Failed to count students")?;

        let teachers = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM teachers t
             JOIN users u ON u.id = t.user_id
             WHERE u.active",
        )
        .fetch_one(&self.db)
        .await
        .context("Failed to count teachers")?;

        let courses_by_status = sqlx::query_as::<_, StatusCount>(
            "SELECT status::text AS status, COUNT(*) AS count
             FROM courses GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.db)
        .await
        .context("Failed to count courses")?;

        let active_enrollments = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM course_roster WHERE status = 'active'",
        )
        .fetch_one(&self.db)
        .await
        .context("Failed to count enrollments")?;

        Ok(json!({
            "students": students,
            "teachers": teachers,
            "courses_by_status": courses_by_status,
            "active_enrollments": active_enrollments,
        }))
    }
}

impl ReportAggregator for DatabaseReportAggregator {
    fn aggregate<'a>(&'a self, request: &'a ReportRequest) -> AggregateFuture<'a> {
        Box::pin(async move {
            let data = match request.kind {
                ReportKind::Performance => self.performance(&request.related.courses).await?,
                ReportKind::Attendance => self.attendance(&request.related.courses).await?,
                ReportKind::Administrative => self.administrative().await?,
                ReportKind::Custom => json!({ "parameters": request.parameters }),
                ReportKind::Financial => {
                    return Err(anyhow!("No data source available for financial reports"));
                }
            };

            Ok(json!({
                "kind": request.kind,
                "period": request.period,
                "generated_at": chrono::Utc::now(),
                "data": data,
            }))
        })
    }
}

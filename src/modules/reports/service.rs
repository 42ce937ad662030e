use std::collections::HashMap;

use anyhow::Context;
use campus_core::policy::Grant;
use campus_core::{Action, Actor, AppError, PaginationMeta, Paginated, Resource, authorize};
use campus_models::ids::ReportId;
use serde_json::json;
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection, PgPool};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::aggregator::ReportAggregator;
use super::model::{
    AccessGrant, AccessGrantRow, CreateReportDto, REPORT_COLUMNS, RelatedEntities, Report,
    ReportFilterParams, ReportRequest, ReportRow, ReportStatus, UpdateReportDto,
};
use crate::metrics::track_report_generated;

#[derive(FromRow)]
struct ReportGrantRow {
    report_id: ReportId,
    #[sqlx(flatten)]
    grant: AccessGrantRow,
}

fn report_resource<'a>(report: &Report, grants: &'a [Grant]) -> Resource<'a> {
    Resource::Report {
        creator: report
            .created_by
            .map(|id| id.into_inner())
            .unwrap_or(Uuid::nil()),
        grants,
    }
}

pub struct ReportService;

impl ReportService {
    async fn grants_for(
        conn: &mut PgConnection,
        ids: &[ReportId],
    ) -> Result<HashMap<ReportId, Vec<AccessGrant>>, AppError> {
        let rows = sqlx::query_as::<_, ReportGrantRow>(
            "SELECT report_id, kind, role, user_id FROM report_access_grants
             WHERE report_id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(conn)
        .await
        .context("Failed to fetch report grants")
        .map_err(AppError::database)?;

        let mut grants: HashMap<ReportId, Vec<AccessGrant>> = HashMap::new();
        for row in rows {
            if let Some(grant) = row.grant.into_grant() {
                grants.entry(row.report_id).or_default().push(grant);
            }
        }
        Ok(grants)
    }

    async fn fetch_report(conn: &mut PgConnection, id: ReportId) -> Result<Report, AppError> {
        let row = sqlx::query_as::<_, ReportRow>(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to fetch report")
        .map_err(AppError::database)?
        .ok_or_else(|| AppError::not_found("Report not found"))?;

        let mut grants = Self::grants_for(conn, &[id]).await?;
        Ok(Report::from_row(row, grants.remove(&id).unwrap_or_default()))
    }

    async fn replace_grants(
        conn: &mut PgConnection,
        id: ReportId,
        grants: &[AccessGrant],
    ) -> Result<(), AppError> {
        sqlx::query("DELETE FROM report_access_grants WHERE report_id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await
            .context("Failed to clear report grants")
            .map_err(AppError::database)?;

        for grant in grants {
            let query = match *grant {
                AccessGrant::Role { role } => sqlx::query(
                    "INSERT INTO report_access_grants (report_id, kind, role) VALUES ($1, 'role', $2)",
                )
                .bind(id)
                .bind(role),
                AccessGrant::User { user_id } => sqlx::query(
                    "INSERT INTO report_access_grants (report_id, kind, user_id) VALUES ($1, 'user', $2)",
                )
                .bind(id)
                .bind(user_id),
            };
            query
                .execute(&mut *conn)
                .await
                .context("Failed to insert report grant")
                .map_err(AppError::database)?;
        }
        Ok(())
    }

    /// Rejects related ids that do not exist.
    async fn ensure_related_exist(db: &PgPool, related: &RelatedEntities) -> Result<(), AppError> {
        let missing = sqlx::query_scalar::<_, i64>(
            "SELECT
                (SELECT COUNT(*) FROM UNNEST($1::uuid[]) AS w(id)
                  WHERE NOT EXISTS (SELECT 1 FROM courses WHERE id = w.id))
              + (SELECT COUNT(*) FROM UNNEST($2::uuid[]) AS w(id)
                  WHERE NOT EXISTS (SELECT 1 FROM students WHERE id = w.id))
              + (SELECT COUNT(*) FROM UNNEST($3::uuid[]) AS w(id)
                  WHERE NOT EXISTS (SELECT 1 FROM teachers WHERE id = w.id))",
        )
        .bind(&related.courses)
        .bind(&related.students)
        .bind(&related.teachers)
        .fetch_one(db)
        .await
        .context("Failed to check related entities")
        .map_err(AppError::database)?;

        if missing > 0 {
            return Err(AppError::bad_request(
                "One or more related courses, students or teachers do not exist",
            ));
        }
        Ok(())
    }

    /// Admins see every report; teachers see their own and those granted to
    /// their role or identity.
    #[instrument(skip(db, filters), fields(db.operation = "SELECT", db.table = "reports"))]
    pub async fn get_reports(
        db: &PgPool,
        actor: &Actor,
        filters: ReportFilterParams,
    ) -> Result<Paginated<Report>, AppError> {
        const WHERE: &str = "WHERE ($1::report_kind IS NULL OR r.kind = $1)
              AND ($2::report_status IS NULL OR r.status = $2)
              AND ($3 OR r.created_by = $4 OR EXISTS (
                    SELECT 1 FROM report_access_grants g
                    WHERE g.report_id = r.id
                      AND ((g.kind = 'role' AND g.role = $5) OR (g.kind = 'user' AND g.user_id = $4))))";

        let mut conn = db
            .acquire()
            .await
            .context("Failed to acquire connection")
            .map_err(AppError::database)?;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM reports r {WHERE}"
        ))
        .bind(filters.kind)
        .bind(filters.status)
        .bind(actor.is_admin())
        .bind(actor.user_id)
        .bind(actor.role)
        .fetch_one(&mut *conn)
        .await
        .context("Failed to count reports")
        .map_err(AppError::database)?;

        let rows = sqlx::query_as::<_, ReportRow>(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports r {WHERE}
             ORDER BY r.created_at DESC
             LIMIT $6 OFFSET $7"
        ))
        .bind(filters.kind)
        .bind(filters.status)
        .bind(actor.is_admin())
        .bind(actor.user_id)
        .bind(actor.role)
        .bind(filters.pagination.limit())
        .bind(filters.pagination.offset())
        .fetch_all(&mut *conn)
        .await
        .context("Failed to fetch reports")
        .map_err(AppError::database)?;

        let ids: Vec<ReportId> = rows.iter().map(|r| r.id).collect();
        let mut grants = Self::grants_for(&mut conn, &ids).await?;
        let reports = rows
            .into_iter()
            .map(|row| {
                let access = grants.remove(&row.id).unwrap_or_default();
                Report::from_row(row, access)
            })
            .collect();

        Ok(Paginated::new(
            reports,
            PaginationMeta::new(total, &filters.pagination),
        ))
    }

    /// Validates, aggregates, and stores a report. Aggregation failures are
    /// stored as `status = error` rather than returned.
    #[instrument(skip(db, aggregator, dto), fields(db.operation = "INSERT", db.table = "reports"))]
    pub async fn create_report(
        db: &PgPool,
        aggregator: &dyn ReportAggregator,
        actor: &Actor,
        dto: CreateReportDto,
    ) -> Result<Report, AppError> {
        authorize(
            actor,
            Action::Create,
            &Resource::Report {
                creator: actor.user_id,
                grants: &[],
            },
        )?;

        Self::ensure_related_exist(db, &dto.related).await?;

        let request = ReportRequest {
            kind: dto.kind,
            parameters: dto.parameters.clone().unwrap_or_else(|| json!({})),
            period: dto.period,
            related: dto.related.clone(),
            requested_by: actor.user_id,
        };

        let (status, payload) = match aggregator.aggregate(&request).await {
            Ok(payload) => (ReportStatus::Done, payload),
            Err(err) => {
                warn!(kind = dto.kind.as_str(), error = %err, "Report aggregation failed");
                (ReportStatus::Error, json!({ "error": err.to_string() }))
            }
        };
        track_report_generated(
            dto.kind.as_str(),
            if status == ReportStatus::Done { "done" } else { "error" },
        );

        let grants = dto
            .access_grants
            .clone()
            .unwrap_or_else(|| vec![AccessGrant::admins()]);

        let mut tx = db
            .begin()
            .await
            .context("Failed to begin transaction")
            .map_err(AppError::database)?;

        let id = sqlx::query_scalar::<_, ReportId>(
            "INSERT INTO reports
                (title, description, kind, format, status, parameters, payload,
                 period_start, period_end, related_courses, related_students, related_teachers,
                 created_by)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             RETURNING id",
        )
        .bind(dto.title.trim())
        .bind(&dto.description)
        .bind(dto.kind)
        .bind(dto.format.unwrap_or_default())
        .bind(status)
        .bind(Json(&request.parameters))
        .bind(Json(&payload))
        .bind(dto.period.map(|p| p.start))
        .bind(dto.period.map(|p| p.end))
        .bind(&dto.related.courses)
        .bind(&dto.related.students)
        .bind(&dto.related.teachers)
        .bind(actor.user_id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to insert report")
        .map_err(AppError::database)?;

        Self::replace_grants(&mut tx, id, &grants).await?;
        let report = Self::fetch_report(&mut tx, id).await?;

        tx.commit()
            .await
            .context("Failed to commit transaction")
            .map_err(AppError::database)?;

        info!(report.id = %id, kind = dto.kind.as_str(), status = ?status, "Report generated");
        Ok(report)
    }

    #[instrument(skip(db))]
    pub async fn get_report(db: &PgPool, actor: &Actor, id: ReportId) -> Result<Report, AppError> {
        let mut conn = db
            .acquire()
            .await
            .context("Failed to acquire connection")
            .map_err(AppError::database)?;

        let report = Self::fetch_report(&mut conn, id).await?;
        let grants = report.policy_grants();
        authorize(actor, Action::Read, &report_resource(&report, &grants))?;
        Ok(report)
    }

    #[instrument(skip(db, dto), fields(db.operation = "UPDATE", db.table = "reports"))]
    pub async fn update_report(
        db: &PgPool,
        actor: &Actor,
        id: ReportId,
        dto: UpdateReportDto,
    ) -> Result<Report, AppError> {
        let mut tx = db
            .begin()
            .await
            .context("Failed to begin transaction")
            .map_err(AppError::database)?;

        let existing = Self::fetch_report(&mut tx, id).await?;
        let grants = existing.policy_grants();
        authorize(actor, Action::Update, &report_resource(&existing, &grants))?;

        sqlx::query(
            "UPDATE reports
             SET title = COALESCE($2, title),
                 description = COALESCE($3, description),
                 status = COALESCE($4, status),
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(dto.title.as_deref().map(str::trim))
        .bind(&dto.description)
        .bind(dto.status)
        .execute(&mut *tx)
        .await
        .context("Failed to update report")
        .map_err(AppError::database)?;

        if let Some(access_grants) = &dto.access_grants {
            Self::replace_grants(&mut tx, id, access_grants).await?;
        }

        let report = Self::fetch_report(&mut tx, id).await?;

        tx.commit()
            .await
            .context("Failed to commit transaction")
            .map_err(AppError::database)?;

        info!(report.id = %id, "Report updated");
        Ok(report)
    }

    #[instrument(skip(db), fields(db.operation = "DELETE", db.table = "reports"))]
    pub async fn delete_report(db: &PgPool, actor: &Actor, id: ReportId) -> Result<(), AppError> {
        let mut conn = db
            .acquire()
            .await
            .context("Failed to acquire connection")
            .map_err(AppError::database)?;

        let existing = Self::fetch_report(&mut conn, id).await?;
        let grants = existing.policy_grants();
        authorize(actor, Action::Delete, &report_resource(&existing, &grants))?;

        sqlx::query("DELETE FROM reports WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await
            .context("Failed to delete report")
            .map_err(AppError::database)?;

        info!(report.id = %id, "Report deleted");
        Ok(())
    }
}

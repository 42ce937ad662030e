use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use campus_core::{ApiResponse, AppError, Paginated};
use campus_models::ids::ReportId;
use tracing::instrument;

use super::model::{CreateReportDto, Report, ReportFilterParams, UpdateReportDto};
use super::service::ReportService;
use crate::middleware::auth::AuthUser;
use crate::middleware::role::RequireStaff;
use crate::state::AppState;
use crate::validator::ValidatedJson;

/// List reports visible to the caller
#[utoipa::path(
    get,
    path = "/api/reports",
    params(ReportFilterParams),
    responses(
        (status = 200, description = "Paginated reports", body = ApiResponse<Paginated<Report>>),
        (status = 403, description = "Staff only"),
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
#[instrument(skip(state, staff))]
pub async fn get_reports(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    Query(filters): Query<ReportFilterParams>,
) -> Result<Json<ApiResponse<Paginated<Report>>>, AppError> {
    let reports = ReportService::get_reports(&state.db, &staff.actor(), filters).await?;
    Ok(Json(ApiResponse::success(reports)))
}

/// Generate a report
#[utoipa::path(
    post,
    path = "/api/reports",
    request_body = CreateReportDto,
    responses(
        (status = 201, description = "Report generated", body = ApiResponse<Report>),
        (status = 400, description = "Validation error or unknown related entity"),
        (status = 403, description = "Staff only"),
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
#[instrument(skip(state, staff, dto))]
pub async fn create_report(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
    ValidatedJson(dto): ValidatedJson<CreateReportDto>,
) -> Result<(StatusCode, Json<ApiResponse<Report>>), AppError> {
    let report = ReportService::create_report(
        &state.db,
        state.report_aggregator.as_ref(),
        &staff.actor(),
        dto,
    )
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(report, "Report generated")),
    ))
}

/// Get a report
#[utoipa::path(
    get,
    path = "/api/reports/{id}",
    params(("id" = ReportId, Path, description = "Report ID")),
    responses(
        (status = 200, description = "Report", body = ApiResponse<Report>),
        (status = 403, description = "Not shared with the caller"),
        (status = 404, description = "Report not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
#[instrument(skip(state, auth_user))]
pub async fn get_report(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<ReportId>,
) -> Result<Json<ApiResponse<Report>>, AppError> {
    let report = ReportService::get_report(&state.db, &auth_user.actor(), id).await?;
    Ok(Json(ApiResponse::success(report)))
}

/// Update a report's title, description, status or grants
#[utoipa::path(
    put,
    path = "/api/reports/{id}",
    params(("id" = ReportId, Path, description = "Report ID")),
    request_body = UpdateReportDto,
    responses(
        (status = 200, description = "Report updated", body = ApiResponse<Report>),
        (status = 403, description = "Not an admin or the creator"),
        (status = 404, description = "Report not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
#[instrument(skip(state, auth_user, dto))]
pub async fn update_report(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<ReportId>,
    ValidatedJson(dto): ValidatedJson<UpdateReportDto>,
) -> Result<Json<ApiResponse<Report>>, AppError> {
    let report = ReportService::update_report(&state.db, &auth_user.actor(), id, dto).await?;
    Ok(Json(ApiResponse::with_message(report, "Report updated")))
}

/// Delete a report
#[utoipa::path(
    delete,
    path = "/api/reports/{id}",
    params(("id" = ReportId, Path, description = "Report ID")),
    responses(
        (status = 204, description = "Report deleted"),
        (status = 403, description = "Not an admin or the creator"),
        (status = 404, description = "Report not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
#[instrument(skip(state, auth_user))]
pub async fn delete_report(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<ReportId>,
) -> Result<StatusCode, AppError> {
    ReportService::delete_report(&state.db, &auth_user.actor(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use campus_core::{ApiResponse, AppError, Paginated};
use tracing::instrument;
use uuid::Uuid;

use super::model::{UpdateUserStatusDto, User, UserFilterParams};
use super::service::UserService;
use crate::middleware::role::RequireAdmin;
use crate::state::AppState;
use crate::validator::ValidatedJson;

/// List identities
#[utoipa::path(
    get,
    path = "/api/users",
    params(UserFilterParams),
    responses(
        (status = 200, description = "Paginated identities", body = ApiResponse<Paginated<User>>),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Admin only"),
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
#[instrument(skip(state))]
pub async fn get_users(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(filters): Query<UserFilterParams>,
) -> Result<Json<ApiResponse<Paginated<User>>>, AppError> {
    let users = UserService::get_users(&state.db, filters).await?;
    Ok(Json(ApiResponse::success(users)))
}

/// Get an identity by id
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Identity", body = ApiResponse<User>),
        (status = 404, description = "User not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<User>>, AppError> {
    let user = UserService::get_user(&state.db, id).await?;
    Ok(Json(ApiResponse::success(user)))
}

/// Activate or deactivate an identity
#[utoipa::path(
    patch,
    path = "/api/users/{id}/status",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserStatusDto,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<User>),
        (status = 403, description = "Admins cannot change their own status"),
        (status = 404, description = "User not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Users"
)]
#[instrument(skip(state))]
pub async fn update_user_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<Uuid>,
    ValidatedJson(dto): ValidatedJson<UpdateUserStatusDto>,
) -> Result<(StatusCode, Json<ApiResponse<User>>), AppError> {
    let user = UserService::set_status(&state.db, &admin.actor(), id, dto.active).await?;
    let message = if user.active {
        "User activated"
    } else {
        "User deactivated"
    };
    Ok((StatusCode::OK, Json(ApiResponse::with_message(user, message))))
}

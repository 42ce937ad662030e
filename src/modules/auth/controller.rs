use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use campus_core::{ApiResponse, AppError};
use tracing::instrument;

use super::model::{
    AuthResponse, CreateUserDto, ForgotPasswordRequest, LoginRequest, MeResponse,
    MessageResponse, ResetPasswordRequest, UpdatePasswordRequest,
};
use super::service::AuthService;
use crate::middleware::auth::AuthUser;
use crate::middleware::role::RequireAdmin;
use crate::modules::users::model::User;
use crate::state::AppState;
use crate::validator::ValidatedJson;

const RESET_REQUESTED: &str = "If that email is registered, a reset link has been sent";

/// Login and receive an access token
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = ApiResponse<AuthResponse>),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Invalid credentials or deactivated account"),
        (status = 429, description = "Too many requests"),
    ),
    tag = "Authentication"
)]
#[instrument(skip(state, dto))]
pub async fn login_user(
    State(state): State<AppState>,
    ValidatedJson(dto): ValidatedJson<LoginRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>, AppError> {
    let response = AuthService::login_user(&state.db, dto, &state.jwt_config).await?;
    Ok(Json(ApiResponse::success(response)))
}

/// Provision an identity (admin only)
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = CreateUserDto,
    responses(
        (status = 201, description = "Identity created", body = ApiResponse<User>),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Email already registered"),
    ),
    security(("bearer_auth" = [])),
    tag = "Authentication"
)]
#[instrument(skip(state, dto))]
pub async fn register_user(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    ValidatedJson(dto): ValidatedJson<CreateUserDto>,
) -> Result<(StatusCode, Json<ApiResponse<User>>), AppError> {
    let user = AuthService::register_user(&state.db, dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(user, "User registered")),
    ))
}

/// Current identity
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = ApiResponse<MeResponse>),
        (status = 401, description = "Missing or invalid token"),
    ),
    security(("bearer_auth" = [])),
    tag = "Authentication"
)]
#[instrument(skip(state, auth_user), fields(user.id = %auth_user.user_id))]
pub async fn get_me(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<MeResponse>>, AppError> {
    let me = AuthService::me(&state.db, auth_user.user_id).await?;
    Ok(Json(ApiResponse::success(me)))
}

/// Change the caller's password
#[utoipa::path(
    patch,
    path = "/api/auth/update-password",
    request_body = UpdatePasswordRequest,
    responses(
        (status = 200, description = "Password updated, new token issued", body = ApiResponse<AuthResponse>),
        (status = 401, description = "Current password is incorrect"),
    ),
    security(("bearer_auth" = [])),
    tag = "Authentication"
)]
#[instrument(skip(state, auth_user, dto), fields(user.id = %auth_user.user_id))]
pub async fn update_password(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ValidatedJson(dto): ValidatedJson<UpdatePasswordRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>, AppError> {
    let response =
        AuthService::update_password(&state.db, auth_user.user_id, dto, &state.jwt_config)
            .await?;
    Ok(Json(ApiResponse::with_message(response, "Password updated")))
}

/// Request a password reset email
#[utoipa::path(
    post,
    path = "/api/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset requested", body = ApiResponse<MessageResponse>),
        (status = 400, description = "Validation error"),
    ),
    tag = "Authentication"
)]
#[instrument(skip(state, dto))]
pub async fn forgot_password(
    State(state): State<AppState>,
    ValidatedJson(dto): ValidatedJson<ForgotPasswordRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, AppError> {
    AuthService::forgot_password(&state.db, &state.email_config, &dto.email).await?;
    Ok(Json(ApiResponse::success(MessageResponse {
        message: RESET_REQUESTED.to_string(),
    })))
}

/// Reset a password with an emailed token
#[utoipa::path(
    patch,
    path = "/api/auth/reset-password/{token}",
    params(("token" = String, Path, description = "Reset token from the email link")),
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset, new token issued", body = ApiResponse<AuthResponse>),
        (status = 400, description = "Invalid or expired reset token"),
    ),
    tag = "Authentication"
)]
#[instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    ValidatedJson(dto): ValidatedJson<ResetPasswordRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>, AppError> {
    let response = AuthService::reset_password(&state.db, &token, dto, &state.jwt_config).await?;
    Ok(Json(ApiResponse::with_message(response, "Password reset")))
}

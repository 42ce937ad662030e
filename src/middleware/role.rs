//! Role gates for whole routers and per-handler extractors.
//!
//! These only look at the caller's role. Ownership rules ("the teacher of
//! this course", "the creator of this event") live in `campus_core::policy`.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use campus_core::{AppError, Role};

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub fn check_role(auth_user: &AuthUser, allowed_roles: &[Role]) -> Result<(), AppError> {
    if allowed_roles.contains(&auth_user.role) {
        return Ok(());
    }
    Err(AppError::forbidden(
        "You do not have permission to access this resource",
    ))
}

/// Authenticates the request and rejects callers whose role is not allowed.
///
/// ```rust,ignore
/// let routes = Router::new()
///     .route("/", get(list))
///     .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));
/// ```
pub async fn require_roles(
    State(state): State<AppState>,
    req: Request,
    next: Next,
    allowed_roles: &[Role],
) -> Result<Response, AppError> {
    let (mut parts, body) = req.into_parts();

    let auth_user = AuthUser::from_request_parts(&mut parts, &state).await?;
    check_role(&auth_user, allowed_roles)?;

    let req = Request::from_parts(parts, body);
    Ok(next.run(req).await)
}

pub async fn require_admin(State(state): State<AppState>, req: Request, next: Next) -> Response {
    match require_roles(State(state), req, next, &[Role::Admin]).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

/// Admins and teachers.
pub async fn require_staff(State(state): State<AppState>, req: Request, next: Next) -> Response {
    match require_roles(State(state), req, next, &[Role::Admin, Role::Teacher]).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

/// Any authenticated identity.
pub async fn require_auth(State(state): State<AppState>, req: Request, next: Next) -> Response {
    match require_roles(
        State(state),
        req,
        next,
        &[Role::Admin, Role::Teacher, Role::Student],
    )
    .await
    {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

#[derive(Debug, Clone)]
pub struct RequireAdmin(pub AuthUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_user = AuthUser::from_request_parts(parts, state).await?;
        check_role(&auth_user, &[Role::Admin])?;
        Ok(RequireAdmin(auth_user))
    }
}

#[derive(Debug, Clone)]
pub struct RequireStaff(pub AuthUser);

impl FromRequestParts<AppState> for RequireStaff {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_user = AuthUser::from_request_parts(parts, state).await?;
        check_role(&auth_user, &[Role::Admin, Role::Teacher])?;
        Ok(RequireStaff(auth_user))
    }
}

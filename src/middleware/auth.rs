use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use campus_auth::{Claims, verify_token};
use campus_core::{Actor, AppError, Role};
use campus_models::ids::UserId;
use sqlx::FromRow;
use uuid::Uuid;

use crate::state::AppState;

/// The authenticated caller, resolved from the bearer token and reloaded
/// from `users` so role and active flag are current.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub claims: Claims,
}

#[derive(FromRow)]
struct IdentityRow {
    id: UserId,
    email: String,
    role: Role,
    active: bool,
}

impl AuthUser {
    pub fn actor(&self) -> Actor {
        Actor::new(self.user_id, self.role)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }
}

/// Verifies `token` and loads the identity it names.
///
/// Missing or invalid tokens and deactivated identities are 401; an identity
/// that no longer exists is 404.
pub async fn authenticate(state: &AppState, token: &str) -> Result<AuthUser, AppError> {
    let claims = verify_token(token, &state.jwt_config)?;
    let user_id = claims.user_id()?;

    let identity = sqlx::query_as::<_, IdentityRow>(
        "SELECT id, email, role, active FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(&state.db)
    .await
    .map_err(AppError::database)?
    .ok_or_else(|| AppError::not_found("User no longer exists"))?;

    if !identity.active {
        return Err(AppError::unauthorized("Account is deactivated"));
    }

    Ok(AuthUser {
        user_id: identity.id.into_inner(),
        email: identity.email,
        role: identity.role,
        claims,
    })
}

pub fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let auth_header = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::unauthorized("Missing authorization header"))?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::unauthorized("Invalid authorization header format"))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(cached) = parts.extensions.get::<AuthUser>() {
            return Ok(cached.clone());
        }

        let token = bearer_token(parts)?;
        let auth_user = authenticate(state, token).await?;

        parts.extensions.insert(auth_user.clone());
        Ok(auth_user)
    }
}

/// `AuthUser` when a bearer header is present, `None` otherwise.
#[derive(Debug, Clone)]
pub struct MaybeAuthUser(pub Option<AuthUser>);

impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if !parts.headers.contains_key(header::AUTHORIZATION) {
            return Ok(MaybeAuthUser(None));
        }
        AuthUser::from_request_parts(parts, state)
            .await
            .map(|user| MaybeAuthUser(Some(user)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    fn parts_with(header_value: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header_value {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        let (parts, _) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&parts_with(Some("Bearer abc"))).unwrap(), "abc");

        for header_value in [None, Some("Basic abc"), Some("Bearer "), Some("abc")] {
            let err = bearer_token(&parts_with(header_value)).unwrap_err();
            assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        }
    }

    #[test]
    fn test_actor_from_auth_user() {
        let user_id = Uuid::new_v4();
        let user = AuthUser {
            user_id,
            email: "ana@campus.edu".to_string(),
            role: Role::Teacher,
            claims: Claims {
                sub: user_id.to_string(),
                email: "ana@campus.edu".to_string(),
                role: Role::Teacher,
                exp: 0,
                iat: 0,
            },
        };
        let actor = user.actor();
        assert_eq!(actor.user_id, user_id);
        assert!(user.is_staff());
        assert!(!user.is_admin());
    }
}

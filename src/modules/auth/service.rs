use anyhow::Context;
use campus_auth::create_access_token;
use campus_config::{EmailConfig, JwtConfig};
use campus_core::{AppError, Role, hash_password, verify_password};
use campus_models::ids::{StudentId, TeacherId};
use campus_models::users::{USER_COLUMNS, User, UserCredentials};
use campus_models::value_types::Email;
use chrono::{Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::model::{
    AuthResponse, CreateUserDto, LoginRequest, MeResponse, ResetPasswordRequest,
    UpdatePasswordRequest,
};
use crate::metrics::{track_user_login_failure, track_user_login_success};
use crate::modules::users::service::UserService;
use crate::utils::email::EmailService;

const RESET_TOKEN_TTL_HOURS: i64 = 1;

/// Stored form of a password reset token.
pub fn hash_reset_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn generate_reset_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub struct AuthService;

impl AuthService {
    fn issue_token(user: User, jwt_config: &JwtConfig) -> Result<AuthResponse, AppError> {
        let access_token = create_access_token(
            user.id.into_inner(),
            user.email.as_str(),
            user.role,
            jwt_config,
        )?;
        Ok(AuthResponse::bearer(
            access_token,
            jwt_config.access_token_expiry,
            user,
        ))
    }

    #[instrument(skip(db, dto, jwt_config), fields(user.email = %dto.email))]
    pub async fn login_user(
        db: &PgPool,
        dto: LoginRequest,
        jwt_config: &JwtConfig,
    ) -> Result<AuthResponse, AppError> {
        let credentials = sqlx::query_as::<_, UserCredentials>(
            "SELECT id, email, role, active, password_hash FROM users WHERE email = $1",
        )
        .bind(&dto.email)
        .fetch_optional(db)
        .await
        .context("Failed to load credentials")
        .map_err(AppError::database)?;

        let Some(credentials) = credentials else {
            track_user_login_failure("unknown_email");
            return Err(AppError::unauthorized("Invalid email or password"));
        };

        if !verify_password(&dto.password, &credentials.password_hash)? {
            track_user_login_failure("bad_password");
            warn!(user.id = %credentials.id, "Login failed: bad password");
            return Err(AppError::unauthorized("Invalid email or password"));
        }

        if !credentials.active {
            track_user_login_failure("inactive");
            return Err(AppError::unauthorized("Account is deactivated"));
        }

        let user = UserService::get_user(db, credentials.id.into_inner()).await?;
        track_user_login_success(user.role.as_str());
        info!(user.id = %user.id, "User logged in");

        Self::issue_token(user, jwt_config)
    }

    #[instrument(skip(db, dto), fields(user.email = %dto.email, user.role = %dto.role))]
    pub async fn register_user(db: &PgPool, dto: CreateUserDto) -> Result<User, AppError> {
        let mut tx = db
            .begin()
            .await
            .context("Failed to begin transaction")
            .map_err(AppError::database)?;

        let user = UserService::insert_identity(
            &mut tx,
            &dto.full_name,
            &dto.email,
            &dto.password,
            dto.role,
        )
        .await?;

        tx.commit()
            .await
            .context("Failed to commit transaction")
            .map_err(AppError::database)?;

        Ok(user)
    }

    #[instrument(skip(db))]
    pub async fn me(db: &PgPool, user_id: Uuid) -> Result<MeResponse, AppError> {
        let user = UserService::get_user(db, user_id).await?;

        let student_id = match user.role {
            Role::Student => sqlx::query_scalar::<_, StudentId>(
                "SELECT id FROM students WHERE user_id = $1",
            )
            .bind(user_id)
            .fetch_optional(db)
            .await
            .context("Failed to load student profile")
            .map_err(AppError::database)?,
            _ => None,
        };

        let teacher_id = match user.role {
            Role::Teacher => sqlx::query_scalar::<_, TeacherId>(
                "SELECT id FROM teachers WHERE user_id = $1",
            )
            .bind(user_id)
            .fetch_optional(db)
            .await
            .context("Failed to load teacher profile")
            .map_err(AppError::database)?,
            _ => None,
        };

        Ok(MeResponse {
            user,
            student_id,
            teacher_id,
        })
    }

    #[instrument(skip(db, dto, jwt_config))]
    pub async fn update_password(
        db: &PgPool,
        user_id: Uuid,
        dto: UpdatePasswordRequest,
        jwt_config: &JwtConfig,
    ) -> Result<AuthResponse, AppError> {
        let current_hash =
            sqlx::query_scalar::<_, String>("SELECT password_hash FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(db)
                .await
                .context("Failed to load password hash")
                .map_err(AppError::database)?
                .ok_or_else(|| AppError::not_found("User not found"))?;

        if !verify_password(&dto.current_password, &current_hash)? {
            return Err(AppError::unauthorized("Current password is incorrect"));
        }

        let new_hash = hash_password(&dto.new_password)?;
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .bind(&new_hash)
        .fetch_one(db)
        .await
        .context("Failed to update password")
        .map_err(AppError::database)?;

        info!(user.id = %user_id, "Password updated");
        Self::issue_token(user, jwt_config)
    }

    /// Creates a one-hour reset token and emails it. Unknown or inactive
    /// emails are silently ignored.
    #[instrument(skip(db, email_config))]
    pub async fn forgot_password(
        db: &PgPool,
        email_config: &EmailConfig,
        email: &Email,
    ) -> Result<(), AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND active"
        ))
        .bind(email)
        .fetch_optional(db)
        .await
        .context("Failed to look up user")
        .map_err(AppError::database)?;

        let Some(user) = user else {
            info!("Password reset requested for unknown email");
            return Ok(());
        };

        let token = generate_reset_token();
        let expires_at = Utc::now() + Duration::hours(RESET_TOKEN_TTL_HOURS);

        sqlx::query(
            "INSERT INTO password_reset_tokens (user_id, token_hash, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(user.id)
        .bind(hash_reset_token(&token))
        .bind(expires_at)
        .execute(db)
        .await
        .context("Failed to store reset token")
        .map_err(AppError::database)?;

        let mailer = EmailService::new(email_config.clone());
        if let Err(e) = mailer
            .send_password_reset_email(user.email.as_str(), &user.full_name, &token)
            .await
        {
            error!(error = %e, user.id = %user.id, "Failed to send password reset email");
        }

        Ok(())
    }

    #[instrument(skip_all)]
    pub async fn reset_password(
        db: &PgPool,
        token: &str,
        dto: ResetPasswordRequest,
        jwt_config: &JwtConfig,
    ) -> Result<AuthResponse, AppError> {
        let mut tx = db
            .begin()
            .await
            .context("Failed to begin transaction")
            .map_err(AppError::database)?;

        let user_id = sqlx::query_scalar::<_, Uuid>(
            "UPDATE password_reset_tokens SET used_at = NOW()
             WHERE token_hash = $1 AND used_at IS NULL AND expires_at > NOW()
             RETURNING user_id",
        )
        .bind(hash_reset_token(token))
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to consume reset token")
        .map_err(AppError::database)?
        .ok_or_else(|| AppError::bad_request("Invalid or expired reset token"))?;

        let new_hash = hash_password(&dto.password)?;
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET password_hash = $2, updated_at = NOW()
             WHERE id = $1 AND active
             RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .bind(&new_hash)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to reset password")
        .map_err(AppError::database)?
        .ok_or_else(|| AppError::bad_request("Invalid or expired reset token"))?;

        tx.commit()
            .await
            .context("Failed to commit transaction")
            .map_err(AppError::database)?;

        info!(user.id = %user_id, "Password reset");
        Self::issue_token(user, jwt_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_token_hash_is_stable_hex() {
        let hash = hash_reset_token("abc");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_reset_token("abc"));
        assert_ne!(hash, hash_reset_token("abd"));
    }

    #[test]
    fn test_generated_tokens_are_unique() {
        let a = generate_reset_token();
        let b = generate_reset_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }
}

use anyhow::Context;
use campus_core::{
    Action, Actor, AppError, PaginationMeta, Paginated, Resource, Role, authorize, hash_password,
};
use campus_models::value_types::Email;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::model::{USER_COLUMNS, User, UserFilterParams};
use crate::metrics::track_user_created;

pub struct UserService;

impl UserService {
    /// Whether `email` belongs to an identity other than `exclude`.
    pub async fn email_taken(
        conn: &mut PgConnection,
        email: &Email,
        exclude: Option<Uuid>,
    ) -> Result<bool, AppError> {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(email)
        .bind(exclude)
        .fetch_one(conn)
        .await
        .context("Failed to check email uniqueness")
        .map_err(AppError::database)?;

        Ok(taken)
    }

    /// Inserts an identity after checking its email, inside the caller's transaction.
    #[instrument(skip(conn, password), fields(db.operation = "INSERT", db.table = "users"))]
    pub async fn insert_identity(
        conn: &mut PgConnection,
        full_name: &str,
        email: &Email,
        password: &str,
        role: Role,
    ) -> Result<User, AppError> {
        if Self::email_taken(&mut *conn, email, None).await? {
            return Err(AppError::conflict("Email already registered"));
        }

        let password_hash = hash_password(password)?;

        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (full_name, email, password_hash, role)
             VALUES ($1, $2, $3, $4)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(full_name.trim())
        .bind(email)
        .bind(&password_hash)
        .bind(role)
        .fetch_one(conn)
        .await
        .context("Failed to insert user")
        .map_err(AppError::database)?;

        track_user_created(role.as_str());
        info!(user.id = %user.id, user.role = %role, "Identity created");

        Ok(user)
    }

    /// Updates name and/or email, re-checking email uniqueness on change.
    pub async fn update_identity(
        conn: &mut PgConnection,
        user_id: Uuid,
        full_name: Option<&str>,
        email: Option<&Email>,
    ) -> Result<(), AppError> {
        if let Some(email) = email
            && Self::email_taken(&mut *conn, email, Some(user_id)).await?
        {
            return Err(AppError::conflict("Email already registered"));
        }

        sqlx::query(
            "UPDATE users
             SET full_name = COALESCE($2, full_name),
                 email = COALESCE($3, email),
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(user_id)
        .bind(full_name.map(str::trim))
        .bind(email)
        .execute(conn)
        .await
        .context("Failed to update user")
        .map_err(AppError::database)?;

        Ok(())
    }

    pub async fn deactivate(conn: &mut PgConnection, user_id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET active = FALSE, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .execute(conn)
            .await
            .context("Failed to deactivate user")
            .map_err(AppError::database)?;
        Ok(())
    }

    #[instrument(skip(db, filters), fields(db.operation = "SELECT", db.table = "users"))]
    pub async fn get_users(
        db: &PgPool,
        filters: UserFilterParams,
    ) -> Result<Paginated<User>, AppError> {
        let limit = filters.pagination.limit();
        let offset = filters.pagination.offset();
        let search = filters.search.as_ref().map(|s| format!("%{s}%"));

        const WHERE: &str = "WHERE ($1::user_role IS NULL OR role = $1)
              AND ($2::bool IS NULL OR active = $2)
              AND ($3::text IS NULL OR full_name ILIKE $3 OR email ILIKE $3)";

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM users {WHERE}"))
            .bind(filters.role)
            .bind(filters.active)
            .bind(&search)
            .fetch_one(db)
            .await
            .context("Failed to count users")
            .map_err(AppError::database)?;

        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users {WHERE}
             ORDER BY created_at DESC
             LIMIT $4 OFFSET $5"
        ))
        .bind(filters.role)
        .bind(filters.active)
        .bind(&search)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await
        .context("Failed to fetch users")
        .map_err(AppError::database)?;

        debug!(total, returned = users.len(), "Users fetched");

        Ok(Paginated::new(
            users,
            PaginationMeta::new(total, &filters.pagination),
        ))
    }

    #[instrument(skip(db))]
    pub async fn get_user(db: &PgPool, user_id: Uuid) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id)
            .fetch_optional(db)
            .await
            .context("Failed to fetch user")
            .map_err(AppError::database)?
            .ok_or_else(|| AppError::not_found("User not found"))
    }

    /// Soft delete or reactivation. Admins cannot change their own status.
    #[instrument(skip(db))]
    pub async fn set_status(
        db: &PgPool,
        actor: &Actor,
        user_id: Uuid,
        active: bool,
    ) -> Result<User, AppError> {
        Self::get_user(db, user_id).await?;
        authorize(actor, Action::Update, &Resource::Identity { user_id })?;

        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET active = $2, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .bind(active)
        .fetch_one(db)
        .await
        .context("Failed to update user status")
        .map_err(AppError::database)?;

        info!(user.id = %user_id, active, "User status changed");
        Ok(user)
    }

    #[instrument(skip(db))]
    pub async fn set_profile_photo(
        db: &PgPool,
        user_id: Uuid,
        photo_key: &str,
    ) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET profile_photo = $2, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .bind(photo_key)
        .fetch_optional(db)
        .await
        .context("Failed to update profile photo")
        .map_err(AppError::database)?
        .ok_or_else(|| AppError::not_found("User not found"))
    }
}

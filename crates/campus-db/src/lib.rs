//! # Campus DB
//!
//! PostgreSQL connection pool and the embedded schema migrations
//! (`./migrations` at the workspace root).

use sqlx::postgres::PgPoolOptions;
use std::env;
use std::time::Duration;

pub use sqlx::PgPool;

/// Connects to `DATABASE_URL` with at most `max_connections` connections.
pub async fn init_db_pool(max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let database_url = env::var("DATABASE_URL")
        .map_err(|_| sqlx::Error::Configuration("DATABASE_URL must be set".into()))?;

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&database_url)
        .await?;

    tracing::info!(max_connections, "database pool initialized");
    Ok(pool)
}

/// Applies pending migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    tracing::info!("database migrations applied");
    Ok(())
}

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use campus::logging::{init_tracing, shutdown_tracer};
use campus::metrics::{init_metrics, metrics_app};
use campus::router::init_router;
use campus::state::AppState;
use campus_config::ServerConfig;
use campus_db::{init_db_pool, run_migrations};
use dotenvy::dotenv;
use tracing::{error, info, warn};

const RATE_LIMIT_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env();

    let db = init_db_pool(config.database_max_connections)
        .await
        .context("Failed to connect to database")?;
    run_migrations(&db)
        .await
        .context("Failed to run migrations")?;

    match init_metrics() {
        Ok(Some(handle)) => {
            let metrics_addr = format!("{}:{}", config.host, config.metrics_port);
            let listener = tokio::net::TcpListener::bind(&metrics_addr)
                .await
                .with_context(|| format!("Failed to bind metrics listener on {metrics_addr}"))?;
            info!(address = %metrics_addr, "Metrics available at /metrics");
            tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, metrics_app(handle)).await {
                    error!(error = %e, "Metrics server stopped");
                }
            });
        }
        Ok(None) => info!("Observability disabled, metrics not exported"),
        Err(e) => error!(error = %e, "Failed to install metrics recorder"),
    }

    let state = AppState::from_env(db);
    if state.jwt_config.uses_default_secret() {
        warn!("JWT_SECRET is not set; using the development secret");
    }
    state.rate_limiters.spawn_pruner(RATE_LIMIT_PRUNE_INTERVAL);
    let app = init_router(state);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;

    info!(address = %address, "Server running");
    info!("Swagger UI at /swagger-ui, Scalar at /scalar");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    shutdown_tracer();
    Ok(())
}

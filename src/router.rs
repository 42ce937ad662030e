use crate::docs::ApiDoc;
use crate::logging::{REQUEST_ID_HEADER, logging_middleware};
use crate::metrics::metrics_middleware;
use crate::middleware::rate_limit::rate_limit;
use crate::middleware::role::require_admin;
use crate::modules::auth::router::init_auth_router;
use crate::modules::calendar::router::init_calendar_router;
use crate::modules::conversations::router::init_conversations_router;
use crate::modules::courses::router::init_courses_router;
use crate::modules::notifications::router::init_ws_router;
use crate::modules::reports::router::init_reports_router;
use crate::modules::students::router::init_students_router;
use crate::modules::teachers::router::init_teachers_router;
use crate::modules::uploads::router::init_uploads_router;
use crate::modules::users::router::init_users_router;
use crate::state::AppState;
use std::time::Duration;

use axum::http::{HeaderValue, Method};
use axum::{Router, middleware};
use campus_core::AppError;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable as _};
use utoipa_swagger_ui::SwaggerUi;

async fn route_not_found() -> AppError {
    AppError::not_found("Route not found")
}

fn cors_layer(state: &AppState) -> CorsLayer {
    let allowed_origins: Vec<HeaderValue> = state
        .cors_config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
        ])
        .expose_headers([REQUEST_ID_HEADER])
        .max_age(Duration::from_secs(state.cors_config.max_age_secs))
        .allow_credentials(true)
}

pub fn init_router(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(Scalar::with_url("/scalar", ApiDoc::openapi()))
        .nest(
            "/api",
            Router::new()
                .nest("/auth", init_auth_router())
                .nest(
                    "/users",
                    init_users_router()
                        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin)),
                )
                .nest("/students", init_students_router())
                .nest("/teachers", init_teachers_router())
                .nest("/courses", init_courses_router())
                .nest("/calendar", init_calendar_router())
                .nest("/conversations", init_conversations_router())
                .nest("/reports", init_reports_router())
                .nest("/uploads", init_uploads_router())
                .nest("/ws", init_ws_router())
                .fallback(route_not_found),
        )
        .fallback(route_not_found)
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .layer(cors_layer(&state))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(logging_middleware))
}

//! Application error type and its JSON error envelope.
//!
//! Every handler returns `Result<_, AppError>`. Client-facing failures carry
//! their message verbatim, while 5xx failures are logged with the full error
//! chain and reported to the client as a generic message.

use anyhow::Error;
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

const GENERIC_SERVER_MESSAGE: &str = "Something went wrong";

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub error: Error,
    /// Field-level details, rendered as `errors` in the envelope.
    pub errors: Option<Value>,
    /// Seconds the client should wait before retrying (429 only).
    pub retry_after: Option<u64>,
}

impl AppError {
    pub fn new<E>(status: StatusCode, err: E) -> Self
    where
        E: Into<Error>,
    {
        Self {
            status,
            error: err.into(),
            errors: None,
            retry_after: None,
        }
    }

    fn message(status: StatusCode, message: impl Into<String>) -> Self {
        Self::new(status, anyhow::anyhow!(message.into()))
    }

    pub fn internal<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::message(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Database failure. Unique violations that slipped past service-level
    /// checks become 409.
    pub fn database<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        let error = err.into();
        if let Some(sqlx::Error::Database(db_err)) = error.downcast_ref::<sqlx::Error>()
            && db_err.is_unique_violation()
        {
            return Self::conflict("Resource already exists");
        }
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::message(StatusCode::BAD_REQUEST, message)
    }

    /// 400 with field-level details attached.
    pub fn validation(message: impl Into<String>, errors: Value) -> Self {
        Self {
            errors: Some(errors),
            ..Self::bad_request(message)
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::message(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::message(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::message(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::message(StatusCode::CONFLICT, message)
    }

    pub fn too_many_requests(retry_after_secs: u64) -> Self {
        Self {
            retry_after: Some(retry_after_secs),
            ..Self::message(
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests, please try again later",
            )
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.status.is_server_error()
    }

    /// Builds the `{status:"error", ...}` body sent to the client.
    pub fn to_body(&self) -> Value {
        let message = if self.is_server_error() {
            GENERIC_SERVER_MESSAGE.to_string()
        } else {
            self.error.to_string()
        };

        let mut body = json!({
            "status": "error",
            "message": message,
        });

        if let Some(errors) = &self.errors {
            body["errors"] = errors.clone();
        }
        if let Some(retry_after) = self.retry_after {
            body["retry_after"] = json!(retry_after);
        }

        body
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.error)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            tracing::error!(
                status = %self.status,
                error = ?self.error,
                "request failed with server error"
            );
        }

        let body = Json(self.to_body());
        let mut response = (self.status, body).into_response();

        if let Some(retry_after) = self.retry_after
            && let Ok(value) = HeaderValue::from_str(&retry_after.to_string())
        {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }

        response
    }
}

impl<E> From<E> for AppError
where
    E: Into<Error>,
{
    fn from(err: E) -> Self {
        AppError::internal(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_constructors_map_to_status_codes() {
        assert_eq!(AppError::bad_request("x").status, StatusCode::BAD_REQUEST);
        assert_eq!(AppError::unauthorized("x").status, StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::forbidden("x").status, StatusCode::FORBIDDEN);
        assert_eq!(AppError::not_found("x").status, StatusCode::NOT_FOUND);
        assert_eq!(AppError::conflict("x").status, StatusCode::CONFLICT);
        assert_eq!(
            AppError::too_many_requests(5).status,
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::internal_error("x").status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_unknown_errors_become_internal() {
        let err: AppError = std::io::Error::other("disk on fire").into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_client_error_message_is_verbatim() {
        let response = AppError::not_found("Course not found").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "Course not found");
        assert!(body.get("errors").is_none());
    }

    #[tokio::test]
    async fn test_server_error_hides_details() {
        let response = AppError::internal(anyhow::anyhow!("connection refused on 5432"))
            .into_response();
        let body = body_json(response).await;
        assert_eq!(body["message"], GENERIC_SERVER_MESSAGE);
    }

    #[tokio::test]
    async fn test_validation_errors_are_included() {
        let errors = json!([{ "field": "email", "message": "Invalid email" }]);
        let response = AppError::validation("Validation failed", errors.clone()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["errors"], errors);
    }

    #[tokio::test]
    async fn test_rate_limit_sets_retry_after_header() {
        let response = AppError::too_many_requests(42).into_response();
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            "42"
        );

        let body = body_json(response).await;
        assert_eq!(body["retry_after"], 42);
    }
}

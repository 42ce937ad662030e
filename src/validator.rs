use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
};
use campus_core::AppError;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// Flattens nested validator errors into `[{field, message}]`.
///
/// Nested structs are joined with `.`, list items with `[i]`. Struct-level
/// (schema) errors are reported under the parent path, or `body` at the root.
pub fn collect_errors(errors: &ValidationErrors) -> Vec<(String, String)> {
    let mut out = Vec::new();
    walk(errors, "", &mut out);
    out
}

fn walk(errors: &ValidationErrors, prefix: &str, out: &mut Vec<(String, String)>) {
    for (field, kind) in errors.errors() {
        let path = match (prefix.is_empty(), field.as_ref()) {
            (true, "__all__") => "body".to_string(),
            (false, "__all__") => prefix.to_string(),
            (true, name) => name.to_string(),
            (false, name) => format!("{prefix}.{name}"),
        };
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for error in field_errors {
                    let message = error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{path} is invalid"));
                    out.push((path.clone(), message));
                }
            }
            ValidationErrorsKind::Struct(inner) => walk(inner, &path, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    walk(inner, &format!("{path}[{index}]"), out);
                }
            }
        }
    }
}

pub fn validation_error(errors: &ValidationErrors) -> AppError {
    let details = collect_errors(errors);
    let message = details
        .iter()
        .map(|(_, message)| message.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let list: Vec<Value> = details
        .iter()
        .map(|(field, message)| json!({ "field": field, "message": message }))
        .collect();
    AppError::validation(message, Value::Array(list))
}

fn rejection_error(rejection: JsonRejection) -> AppError {
    if matches!(rejection, JsonRejection::MissingJsonContentType(_)) {
        return AppError::bad_request("Missing 'Content-Type: application/json' header");
    }

    let error_msg = rejection.body_text();

    if let Some(field) = error_msg
        .split("missing field `")
        .nth(1)
        .and_then(|s| s.split('`').next())
    {
        return AppError::validation(
            format!("{field} is required"),
            json!([{ "field": field, "message": format!("{field} is required") }]),
        );
    }

    if error_msg.contains("invalid type")
        || error_msg.contains("unknown variant")
        || error_msg.contains("invalid value")
    {
        return AppError::bad_request(format!("Invalid field in request: {error_msg}"));
    }

    AppError::bad_request("Invalid request body")
}

/// JSON body extractor that runs `validator` rules; every failure is a 400.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(rejection_error)?;

        value.validate().map_err(|errors| validation_error(&errors))?;

        Ok(ValidatedJson(value))
    }
}

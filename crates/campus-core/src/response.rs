//! Success envelopes shared by every endpoint.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::pagination::PaginationMeta;

/// `{"status":"success","data":...,"message"?:...}`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    pub status: String,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success".to_string(),
            data,
            message: None,
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::success(data)
        }
    }
}

/// A page of items and the pagination metadata that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub meta: PaginationMeta,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, meta: PaginationMeta) -> Self {
        Self { items, meta }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_envelope_omits_message() {
        let json = serde_json::to_value(ApiResponse::success(1)).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["data"], 1);
        assert!(json.get("message").is_none());
    }

    #[test]
    fn test_envelope_with_message() {
        let json = serde_json::to_value(ApiResponse::with_message((), "done")).unwrap();
        assert_eq!(json["message"], "done");
    }
}

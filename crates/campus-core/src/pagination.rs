//! Pagination for list endpoints.
//!
//! Lists accept `limit` plus either `page` (1-indexed) or `offset`. When
//! `page` is given it takes precedence over `offset`. `limit` is clamped to
//! `[1, 100]`.

use serde::{Deserialize, Deserializer, Serialize};
use utoipa::{IntoParams, ToSchema};

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

/// Query strings may carry empty values (`?page=`), which count as absent.
pub fn deserialize_optional_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s {
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => s.parse::<i64>().map(Some).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaginationMeta {
    /// Total number of matching items
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    pub has_more: bool,
}

impl PaginationMeta {
    pub fn new(total: i64, params: &PaginationParams) -> Self {
        Self::with_default_limit(total, params, DEFAULT_LIMIT)
    }

    pub fn with_default_limit(total: i64, params: &PaginationParams, default_limit: i64) -> Self {
        let limit = params.limit_or(default_limit);
        let offset = params.offset_or(default_limit);
        Self {
            total,
            limit,
            offset,
            page: params.page(),
            has_more: offset + limit < total,
        }
    }
}

#[derive(Debug, Clone, Default, Hash, Deserialize, ToSchema, IntoParams)]
pub struct PaginationParams {
    /// Maximum number of items to return (1-100)
    #[serde(default, deserialize_with = "deserialize_optional_i64")]
    pub limit: Option<i64>,
    /// Number of items to skip (ignored if `page` is set)
    #[serde(default, deserialize_with = "deserialize_optional_i64")]
    pub offset: Option<i64>,
    /// Page number (1-indexed)
    #[serde(default, deserialize_with = "deserialize_optional_i64")]
    pub page: Option<i64>,
}

impl PaginationParams {
    #[must_use]
    pub fn limit(&self) -> i64 {
        self.limit_or(DEFAULT_LIMIT)
    }

    #[must_use]
    pub fn limit_or(&self, default_limit: i64) -> i64 {
        self.limit.unwrap_or(default_limit).clamp(1, MAX_LIMIT)
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        self.offset_or(DEFAULT_LIMIT)
    }

    #[must_use]
    pub fn offset_or(&self, default_limit: i64) -> i64 {
        match self.page {
            Some(page) => (page.max(1) - 1) * self.limit_or(default_limit),
            None => self.offset.unwrap_or(0).max(0),
        }
    }

    #[must_use]
    pub fn page(&self) -> Option<i64> {
        self.page.map(|p| p.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(limit: Option<i64>, offset: Option<i64>, page: Option<i64>) -> PaginationParams {
        PaginationParams {
            limit,
            offset,
            page,
        }
    }

    #[test]
    fn test_defaults() {
        let p = PaginationParams::default();
        assert_eq!(p.limit(), 10);
        assert_eq!(p.offset(), 0);
        assert_eq!(p.page(), None);
    }

    #[test]
    fn test_limit_is_clamped() {
        let cases = [(Some(0), 1), (Some(-1), 1), (Some(50), 50), (Some(101), 100)];
        for (input, expected) in cases {
            assert_eq!(params(input, None, None).limit(), expected);
        }
    }

    #[test]
    fn test_page_takes_precedence_over_offset() {
        let p = params(Some(20), Some(5), Some(3));
        assert_eq!(p.offset(), 40);
    }

    #[test]
    fn test_negative_offset_is_zero() {
        assert_eq!(params(None, Some(-5), None).offset(), 0);
    }

    #[test]
    fn test_custom_default_limit() {
        let p = params(None, None, Some(2));
        assert_eq!(p.limit_or(20), 20);
        assert_eq!(p.offset_or(20), 20);
    }

    #[test]
    fn test_meta_has_more() {
        let p = params(Some(10), None, Some(1));
        assert!(PaginationMeta::new(11, &p).has_more);
        assert!(!PaginationMeta::new(10, &p).has_more);
    }

    #[test]
    fn test_deserialize_empty_strings() {
        let p: PaginationParams = serde_json::from_str(r#"{"limit":"","page":""}"#).unwrap();
        assert_eq!(p.limit(), 10);
        assert_eq!(p.page(), None);
    }

    #[test]
    fn test_deserialize_string_numbers() {
        let p: PaginationParams = serde_json::from_str(r#"{"limit":"25","offset":"50"}"#).unwrap();
        assert_eq!(p.limit(), 25);
        assert_eq!(p.offset(), 50);
    }
}

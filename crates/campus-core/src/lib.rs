//! # Campus Core
//!
//! Foundational types shared by every Campus crate:
//!
//! - [`errors`]: `AppError` and the JSON error envelope
//! - [`response`]: success envelopes and paginated lists
//! - [`pagination`]: query parameters and metadata for list endpoints
//! - [`password`]: bcrypt hashing and verification
//! - [`policy`]: roles and the declarative authorization check
//! - [`file_storage`]: storage backend abstraction for uploads
//! - [`serde`]: query-string deserialization helpers

pub mod errors;
pub mod file_storage;
pub mod pagination;
pub mod password;
pub mod policy;
pub mod response;
pub mod serde;

pub use errors::AppError;
pub use pagination::{PaginationMeta, PaginationParams};
pub use password::{hash_password, verify_password};
pub use policy::{Action, Actor, Resource, Role, authorize, is_allowed};
pub use response::{ApiResponse, Paginated};

//! # Campus Models
//!
//! Domain entities and DTOs shared by the API server and the CLI.
//!
//! # Modules
//!
//! - [`ids`]: typed `Uuid` wrappers per entity
//! - [`value_types`]: validated values (email, address)
//! - [`users`]: identities
//! - [`auth`]: login, token and password-reset payloads
//! - [`students`], [`teachers`]: role profiles
//! - [`courses`]: catalog, roster, enrollment and materials
//! - [`progress`]: assessment grades and lesson attendance per student
//! - [`calendar`]: events and recurrence
//! - [`conversations`]: conversations, participants and messages
//! - [`reports`]: report documents and access grants

pub mod auth;
pub mod calendar;
pub mod conversations;
pub mod courses;
pub mod ids;
pub mod progress;
pub mod reports;
pub mod students;
pub mod teachers;
pub mod users;
pub mod value_types;

pub use ids::{
    AssessmentId, ConversationId, CourseId, EventId, LessonId, MaterialId, MessageId, ReportId,
    StudentId, TeacherId, UserId,
};
pub use value_types::{Address, Email};

pub use auth::{
    AuthResponse, ForgotPasswordRequest, LoginRequest, MeResponse, MessageResponse,
    ResetPasswordRequest, UpdatePasswordRequest,
};
pub use courses::{Course, CourseStatus, EnrollmentStatus, available_seats};
pub use users::{CreateUserDto, User, UserFilterParams};

pub mod auth;
pub mod calendar;
pub mod conversations;
pub mod courses;
pub mod notifications;
pub mod reports;
pub mod students;
pub mod teachers;
pub mod uploads;
pub mod users;

pub use self::auth::model::LoginRequest;
pub use self::users::model::User;

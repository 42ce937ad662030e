pub use campus_models::auth::*;
pub use campus_models::users::CreateUserDto;

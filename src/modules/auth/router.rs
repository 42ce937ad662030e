use axum::{
    Router,
    routing::{get, patch, post},
};

use super::controller::{
    forgot_password, get_me, login_user, register_user, reset_password, update_password,
};
use crate::state::AppState;

pub fn init_auth_router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login_user))
        .route("/register", post(register_user))
        .route("/me", get(get_me))
        .route("/update-password", patch(update_password))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password/{token}", patch(reset_password))
}

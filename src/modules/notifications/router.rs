use axum::{Router, routing::get};

use crate::modules::notifications::ws::ws_handler;
use crate::state::AppState;

pub fn init_ws_router() -> Router<AppState> {
    Router::new().route("/", get(ws_handler))
}

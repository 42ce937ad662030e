use axum::{
    Router,
    routing::{delete, get, patch, post},
};

use crate::modules::conversations::controller::{
    add_participants, create_conversation, get_conversation, get_conversations, get_messages,
    remove_participant, send_message, toggle_archive,
};
use crate::state::AppState;

pub fn init_conversations_router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_conversations).post(create_conversation))
        .route("/{id}", get(get_conversation))
        .route("/{id}/participants", post(add_participants))
        .route("/{id}/participants/{user_id}", delete(remove_participant))
        .route("/{id}/messages", get(get_messages).post(send_message))
        .route("/{id}/archive", patch(toggle_archive))
}

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

use super::model::UploadKind;
use crate::modules::uploads::controller::{
    get_file, upload_materials, upload_messages, upload_profile,
};
use crate::state::AppState;

pub fn init_uploads_router() -> Router<AppState> {
    Router::new()
        .route(
            "/profile",
            post(upload_profile).layer(DefaultBodyLimit::max(UploadKind::Profile.body_limit())),
        )
        .route(
            "/materials",
            post(upload_materials)
                .layer(DefaultBodyLimit::max(UploadKind::Materials.body_limit())),
        )
        .route(
            "/messages",
            post(upload_messages).layer(DefaultBodyLimit::max(UploadKind::Messages.body_limit())),
        )
        .route("/{kind}/{file_name}", get(get_file))
}

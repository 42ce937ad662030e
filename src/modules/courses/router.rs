use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::modules::courses::controller::{
    add_material, create_course, delete_course, delete_material, enroll, get_course,
    get_course_students, get_courses, update_course, withdraw,
};
use crate::state::AppState;

pub fn init_courses_router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_courses).post(create_course))
        .route(
            "/{id}",
            get(get_course).put(update_course).delete(delete_course),
        )
        .route("/{id}/enroll", post(enroll))
        .route("/{id}/withdraw", post(withdraw))
        .route("/{id}/students", get(get_course_students))
        .route("/{id}/materials", post(add_material))
        .route("/{id}/materials/{material_id}", delete(delete_material))
}

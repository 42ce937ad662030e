use axum::{Router, routing::get};

use crate::modules::teachers::controller::{
    create_teacher, delete_teacher, get_availability, get_teacher, get_teacher_courses,
    get_teachers, update_availability, update_teacher,
};
use crate::state::AppState;

pub fn init_teachers_router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_teachers).post(create_teacher))
        .route(
            "/{id}",
            get(get_teacher).put(update_teacher).delete(delete_teacher),
        )
        .route("/{id}/courses", get(get_teacher_courses))
        .route(
            "/{id}/availability",
            get(get_availability).put(update_availability),
        )
}

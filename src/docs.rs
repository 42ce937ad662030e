use campus_core::{PaginationMeta, PaginationParams, Role};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::modules::notifications::events::{ClientEvent, Notification, ServerEvent};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::auth::controller::login_user,
        crate::modules::auth::controller::register_user,
        crate::modules::auth::controller::get_me,
        crate::modules::auth::controller::update_password,
        crate::modules::auth::controller::forgot_password,
        crate::modules::auth::controller::reset_password,
        crate::modules::users::controller::get_users,
        crate::modules::users::controller::get_user,
        crate::modules::users::controller::update_user_status,
        crate::modules::students::controller::get_students,
        crate::modules::students::controller::create_student,
        crate::modules::students::controller::get_student,
        crate::modules::students::controller::update_student,
        crate::modules::students::controller::delete_student,
        crate::modules::students::controller::get_student_courses,
        crate::modules::students::controller::get_student_grades,
        crate::modules::students::controller::get_student_attendance,
        crate::modules::teachers::controller::get_teachers,
        crate::modules::teachers::controller::create_teacher,
        crate::modules::teachers::controller::get_teacher,
        crate::modules::teachers::controller::update_teacher,
        crate::modules::teachers::controller::delete_teacher,
        crate::modules::teachers::controller::get_teacher_courses,
        crate::modules::teachers::controller::get_availability,
        crate::modules::teachers::controller::update_availability,
        crate::modules::courses::controller::get_courses,
        crate::modules::courses::controller::create_course,
        crate::modules::courses::controller::get_course,
        crate::modules::courses::controller::update_course,
        crate::modules::courses::controller::delete_course,
        crate::modules::courses::controller::enroll,
        crate::modules::courses::controller::withdraw,
        crate::modules::courses::controller::get_course_students,
        crate::modules::courses::controller::add_material,
        crate::modules::courses::controller::delete_material,
        crate::modules::calendar::controller::get_events,
        crate::modules::calendar::controller::create_event,
        crate::modules::calendar::controller::get_event,
        crate::modules::calendar::controller::update_event,
        crate::modules::calendar::controller::delete_event,
        crate::modules::calendar::controller::get_course_events,
        crate::modules::conversations::controller::get_conversations,
        crate::modules::conversations::controller::create_conversation,
        crate::modules::conversations::controller::get_conversation,
        crate::modules::conversations::controller::add_participants,
        crate::modules::conversations::controller::remove_participant,
        crate::modules::conversations::controller::get_messages,
        crate::modules::conversations::controller::send_message,
        crate::modules::conversations::controller::toggle_archive,
        crate::modules::reports::controller::get_reports,
        crate::modules::reports::controller::create_report,
        crate::modules::reports::controller::get_report,
        crate::modules::reports::controller::update_report,
        crate::modules::reports::controller::delete_report,
        crate::modules::uploads::controller::upload_profile,
        crate::modules::uploads::controller::upload_materials,
        crate::modules::uploads::controller::upload_messages,
        crate::modules::uploads::controller::get_file,
        crate::modules::notifications::ws::ws_handler,
    ),
    components(
        schemas(
            Role,
            PaginationMeta,
            PaginationParams,
            Notification,
            ServerEvent,
            ClientEvent,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Login, registration and password management"),
        (name = "Users", description = "Identity administration"),
        (name = "Students", description = "Student profiles"),
        (name = "Teachers", description = "Teacher profiles and availability"),
        (name = "Courses", description = "Course catalog, enrollment and materials"),
        (name = "Calendar", description = "Calendar events"),
        (name = "Conversations", description = "Messaging"),
        (name = "Reports", description = "Generated reports"),
        (name = "Uploads", description = "File uploads"),
        (name = "Realtime", description = "WebSocket channel")
    ),
    info(
        title = "Campus API",
        version = "0.1.0",
        description = "Academic administration API built with Rust, Axum, and PostgreSQL.",
        license(
            name = "MIT"
        )
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_every_module() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/auth/login",
            "/api/courses/{id}/enroll",
            "/api/students/{id}/grades",
            "/api/students/{id}/attendance",
            "/api/conversations/{id}/messages",
            "/api/reports",
            "/api/uploads/{kind}/{file_name}",
            "/api/ws",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}

//! Declarative authorization.
//!
//! Route-level gates only check the caller's role. Anything that depends on
//! who owns a record is decided here, from an [`Actor`], an [`Action`] and a
//! [`Resource`] describing the ownership facts of the target record.
//!
//! ```ignore
//! let actor = auth_user.actor();
//! authorize(&actor, Action::Update, &Resource::CalendarEvent { creator })?;
//! ```

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }

    /// Admins and teachers.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Admin | Role::Teacher)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "teacher" => Ok(Role::Teacher),
            "student" => Ok(Role::Student),
            other => Err(AppError::bad_request(format!("Invalid role: {other}"))),
        }
    }
}

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
    Enroll,
    Withdraw,
    /// Roster views and course materials.
    ManageCourse,
    /// Adding or removing conversation participants.
    ManageParticipants,
    PostMessage,
}

/// Who a report is shared with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
    Role(Role),
    User(Uuid),
}

/// A target record reduced to the facts authorization depends on.
///
/// Owner fields are identity (user) ids, never profile ids.
#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    /// Another identity, as managed through the admin user endpoints.
    Identity { user_id: Uuid },
    Student { owner: Uuid },
    Teacher { owner: Uuid },
    Course { teacher: Option<Uuid> },
    /// A student's seat in a course.
    Enrollment { student: Uuid },
    CalendarEvent { creator: Uuid },
    Report { creator: Uuid, grants: &'a [Grant] },
    Conversation {
        participant: bool,
        conversation_admin: bool,
        read_only: bool,
    },
    /// Course material files.
    Materials,
}

pub fn is_allowed(actor: &Actor, action: Action, resource: &Resource<'_>) -> bool {
    use Action::*;

    let admin = actor.is_admin();
    let is_self = |id: Uuid| actor.user_id == id;

    match *resource {
        Resource::Identity { user_id } => match action {
            Read => admin || is_self(user_id),
            Update | Delete => admin && !is_self(user_id),
            _ => admin,
        },
        Resource::Student { owner } => match action {
            Read => actor.role.is_staff() || is_self(owner),
            _ => admin,
        },
        Resource::Teacher { owner } => match action {
            Read => admin || actor.role == Role::Student || is_self(owner),
            Update => admin || is_self(owner),
            _ => admin,
        },
        Resource::Course { teacher } => {
            let teaches = teacher.is_some_and(is_self);
            match action {
                Read => true,
                Update | ManageCourse => admin || teaches,
                _ => admin,
            }
        }
        Resource::Enrollment { student } => match action {
            Enroll | Withdraw | Read => {
                admin || (actor.role == Role::Student && is_self(student))
            }
            _ => admin,
        },
        Resource::CalendarEvent { creator } => match action {
            Read => true,
            Create => actor.role.is_staff(),
            _ => admin || is_self(creator),
        },
        Resource::Report { creator, grants } => {
            let granted = grants.iter().any(|grant| match grant {
                Grant::Role(role) => *role == actor.role,
                Grant::User(id) => is_self(*id),
            });
            match action {
                Read => admin || is_self(creator) || granted,
                Create => actor.role.is_staff(),
                _ => admin || is_self(creator),
            }
        }
        Resource::Conversation {
            participant,
            conversation_admin,
            read_only,
        } => match action {
            Read => participant || admin,
            PostMessage => participant && (!read_only || conversation_admin || admin),
            ManageParticipants => conversation_admin || admin,
            Update => participant,
            _ => admin,
        },
        Resource::Materials => actor.role.is_staff(),
    }
}

/// Checks `action` on `resource` for `actor`, as a service-layer guard.
///
/// Services load the target row first and build the [`Resource`] from it, so
/// a missing row surfaces as 404 before this check runs.
///
/// ```ignore
/// authorize(&actor, Action::Update, &Resource::Course { teacher })?;
/// ```
///
/// # Errors
///
/// Returns [`AppError`] with status 403 when [`is_allowed`] denies the pair.
pub fn authorize(actor: &Actor, action: Action, resource: &Resource<'_>) -> Result<(), AppError> {
    if is_allowed(actor, action, resource) {
        Ok(())
    } else {
        Err(AppError::forbidden(
            "You do not have permission to perform this action",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn actor(role: Role) -> Actor {
        Actor::new(Uuid::new_v4(), role)
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("teacher".parse::<Role>().unwrap(), Role::Teacher);
        assert!("root".parse::<Role>().is_err());
        assert!(Role::Teacher.is_staff());
        assert!(!Role::Student.is_staff());
    }

    #[test]
    fn test_student_profile_access() {
        let student = actor(Role::Student);
        let other = actor(Role::Student);
        let own = Resource::Student {
            owner: student.user_id,
        };

        assert!(is_allowed(&student, Action::Read, &own));
        assert!(!is_allowed(&other, Action::Read, &own));
        assert!(is_allowed(&actor(Role::Teacher), Action::Read, &own));
        assert!(!is_allowed(&student, Action::Update, &own));
        assert!(is_allowed(&actor(Role::Admin), Action::Delete, &own));
    }

    #[test]
    fn test_teacher_profile_access() {
        let teacher = actor(Role::Teacher);
        let own = Resource::Teacher {
            owner: teacher.user_id,
        };

        assert!(is_allowed(&teacher, Action::Update, &own));
        assert!(!is_allowed(&actor(Role::Teacher), Action::Read, &own));
        assert!(is_allowed(&actor(Role::Student), Action::Read, &own));
        assert!(!is_allowed(&teacher, Action::Delete, &own));
    }

    #[test]
    fn test_course_teacher_may_manage_own_course_only() {
        let teacher = actor(Role::Teacher);
        let own = Resource::Course {
            teacher: Some(teacher.user_id),
        };
        let foreign = Resource::Course {
            teacher: Some(Uuid::new_v4()),
        };

        assert!(is_allowed(&teacher, Action::Update, &own));
        assert!(is_allowed(&teacher, Action::ManageCourse, &own));
        assert!(!is_allowed(&teacher, Action::Update, &foreign));
        assert!(!is_allowed(&teacher, Action::Delete, &own));
        assert!(is_allowed(&actor(Role::Student), Action::Read, &foreign));
    }

    #[test]
    fn test_enrollment_self_service() {
        let student = actor(Role::Student);
        let own = Resource::Enrollment {
            student: student.user_id,
        };
        let other = Resource::Enrollment {
            student: Uuid::new_v4(),
        };

        assert!(is_allowed(&student, Action::Enroll, &own));
        assert!(is_allowed(&student, Action::Withdraw, &own));
        assert!(!is_allowed(&student, Action::Enroll, &other));
        assert!(is_allowed(&actor(Role::Admin), Action::Withdraw, &other));

        let teacher = actor(Role::Teacher);
        let teacher_as_student = Resource::Enrollment {
            student: teacher.user_id,
        };
        assert!(!is_allowed(&teacher, Action::Enroll, &teacher_as_student));
    }

    #[test]
    fn test_calendar_creator_rules() {
        let teacher = actor(Role::Teacher);
        let event = Resource::CalendarEvent {
            creator: teacher.user_id,
        };

        assert!(is_allowed(&teacher, Action::Update, &event));
        assert!(!is_allowed(&actor(Role::Teacher), Action::Delete, &event));
        assert!(is_allowed(&actor(Role::Admin), Action::Delete, &event));
        assert!(!is_allowed(&actor(Role::Student), Action::Create, &event));
    }

    #[test]
    fn test_report_grants() {
        let teacher = actor(Role::Teacher);
        let grants = [Grant::Role(Role::Teacher)];
        let report = Resource::Report {
            creator: Uuid::new_v4(),
            grants: &grants,
        };

        assert!(is_allowed(&teacher, Action::Read, &report));
        assert!(!is_allowed(&teacher, Action::Update, &report));

        let grants = [Grant::User(teacher.user_id)];
        let report = Resource::Report {
            creator: Uuid::new_v4(),
            grants: &grants,
        };
        assert!(is_allowed(&teacher, Action::Read, &report));
        assert!(!is_allowed(&actor(Role::Teacher), Action::Read, &report));
    }

    #[test]
    fn test_conversation_posting() {
        let member = actor(Role::Student);
        let read_only = Resource::Conversation {
            participant: true,
            conversation_admin: false,
            read_only: true,
        };
        let open = Resource::Conversation {
            participant: true,
            conversation_admin: false,
            read_only: false,
        };
        let outsider = Resource::Conversation {
            participant: false,
            conversation_admin: false,
            read_only: false,
        };

        assert!(!is_allowed(&member, Action::PostMessage, &read_only));
        assert!(is_allowed(&member, Action::PostMessage, &open));
        assert!(!is_allowed(&member, Action::Read, &outsider));
        assert!(is_allowed(&actor(Role::Admin), Action::Read, &outsider));
        assert!(!is_allowed(&member, Action::ManageParticipants, &open));
    }

    #[test]
    fn test_admin_cannot_deactivate_self() {
        let admin = actor(Role::Admin);
        let own = Resource::Identity {
            user_id: admin.user_id,
        };
        assert!(!is_allowed(&admin, Action::Update, &own));
        assert!(is_allowed(
            &admin,
            Action::Update,
            &Resource::Identity {
                user_id: Uuid::new_v4()
            }
        ));
    }

    #[test]
    fn test_authorize_returns_forbidden() {
        let err = authorize(&actor(Role::Student), Action::Create, &Resource::Materials)
            .unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }
}

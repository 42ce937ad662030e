//! Conversation and message models.
//!
//! A conversation keeps a denormalized snapshot of its latest message so
//! list views need not touch `messages`.

use campus_core::PaginationParams;
use campus_core::serde::deserialize_optional_bool;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use crate::ids::{ConversationId, CourseId, MessageId, UserId};

pub const DEFAULT_MESSAGE_PAGE: i64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "conversation_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    Direct,
    Group,
    Course,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "participant_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    Admin,
    Member,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "message_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Attachment,
    System,
}

impl MessageKind {
    pub fn as_label(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Attachment => "attachment",
            MessageKind::System => "system",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Conversation {
    pub id: ConversationId,
    pub kind: ConversationKind,
    pub title: Option<String>,
    pub course_id: Option<CourseId>,
    pub created_by: Option<UserId>,
    pub archived: bool,
    pub read_only: bool,
    pub last_message_content: Option<String>,
    pub last_message_sender: Option<UserId>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Participant {
    pub user_id: UserId,
    pub full_name: String,
    pub role: ParticipantRole,
    pub active: bool,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConversationDetail {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub participants: Vec<Participant>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
pub struct Attachment {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 500))]
    pub url: String,
    pub content_type: Option<String>,
    pub size: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: Option<UserId>,
    pub content: String,
    pub kind: MessageKind,
    #[schema(value_type = Vec<Attachment>)]
    pub attachments: Json<Vec<Attachment>>,
    pub reply_to: Option<MessageId>,
    pub edited: bool,
    pub sent_at: DateTime<Utc>,
}

fn validate_create_conversation(dto: &CreateConversationDto) -> Result<(), ValidationError> {
    match dto.kind {
        ConversationKind::Direct if dto.participant_ids.len() != 1 => {
            let mut err = ValidationError::new("participants");
            err.message =
                Some("A direct conversation needs exactly one other participant".into());
            Err(err)
        }
        ConversationKind::Course if dto.course_id.is_none() => {
            let mut err = ValidationError::new("course_id");
            err.message = Some("A course conversation needs a course_id".into());
            Err(err)
        }
        ConversationKind::Group if dto.participant_ids.is_empty() => {
            let mut err = ValidationError::new("participants");
            err.message = Some("A group conversation needs at least one participant".into());
            Err(err)
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_create_conversation"))]
pub struct CreateConversationDto {
    pub kind: ConversationKind,
    #[validate(length(max = 100))]
    pub title: Option<String>,
    pub course_id: Option<CourseId>,
    /// Other participants; the creator is added automatically
    #[serde(default)]
    pub participant_ids: Vec<UserId>,
    #[validate(length(min = 1, max = 5000))]
    pub initial_message: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AddParticipantsDto {
    #[validate(length(min = 1, message = "At least one participant is required"))]
    pub user_ids: Vec<UserId>,
}

fn validate_message_body(dto: &SendMessageDto) -> Result<(), ValidationError> {
    if dto.content.trim().is_empty() && dto.attachments.is_empty() {
        let mut err = ValidationError::new("content");
        err.message = Some("A message needs content or attachments".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[validate(schema(function = "validate_message_body"))]
pub struct SendMessageDto {
    #[serde(default)]
    #[validate(length(max = 5000, message = "Message cannot exceed 5000 characters"))]
    pub content: String,
    #[serde(default)]
    #[validate(nested)]
    pub attachments: Vec<Attachment>,
    pub reply_to: Option<MessageId>,
}

impl SendMessageDto {
    pub fn kind(&self) -> MessageKind {
        if self.attachments.is_empty() {
            MessageKind::Text
        } else {
            MessageKind::Attachment
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema, IntoParams)]
pub struct ConversationFilterParams {
    #[serde(default, deserialize_with = "deserialize_optional_bool")]
    pub archived: Option<bool>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

fn deserialize_optional_datetime<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    match opt.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema, IntoParams)]
pub struct MessageFilterParams {
    /// Only messages sent strictly before this instant
    #[serde(default, deserialize_with = "deserialize_optional_datetime")]
    pub before: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ArchiveState {
    pub id: ConversationId,
    pub archived: bool,
}

use campus_models::conversations::{Attachment, Message};
use campus_models::ids::{ConversationId, MessageId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

/// A transient notification. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Notification {
    pub id: Uuid,
    pub kind: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: Value,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(kind: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: kind.into(),
            title: title.into(),
            body: body.into(),
            data: Value::Null,
            created_at: Utc::now(),
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }
}

/// Events pushed to connected clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Connected {
        connection_id: Uuid,
        user_id: Uuid,
    },
    Joined {
        conversation_id: ConversationId,
    },
    Left {
        conversation_id: ConversationId,
    },
    NewMessage {
        message: Message,
    },
    UserTyping {
        conversation_id: ConversationId,
        user_id: Uuid,
        is_typing: bool,
    },
    MessagesRead {
        conversation_id: ConversationId,
        user_id: Uuid,
        read_at: DateTime<Utc>,
    },
    Notification {
        notification: Notification,
    },
    NotificationMarkedRead {
        notification_id: Uuid,
    },
    Error {
        message: String,
    },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }
}

/// Events accepted from connected clients.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinConversation {
        conversation_id: ConversationId,
    },
    LeaveConversation {
        conversation_id: ConversationId,
    },
    SendMessage {
        conversation_id: ConversationId,
        #[serde(default)]
        content: String,
        #[serde(default)]
        attachments: Vec<Attachment>,
        #[serde(default)]
        reply_to: Option<MessageId>,
    },
    Typing {
        conversation_id: ConversationId,
        #[serde(default = "default_typing")]
        is_typing: bool,
    },
    MarkRead {
        conversation_id: ConversationId,
    },
    MarkNotificationRead {
        notification_id: Uuid,
    },
}

fn default_typing() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_event_is_type_tagged() {
        let id = ConversationId::new();
        let json = serde_json::to_value(ServerEvent::Joined {
            conversation_id: id,
        })
        .unwrap();
        assert_eq!(json["type"], "joined");
        assert_eq!(json["conversation_id"], id.to_string());

        let json = serde_json::to_value(ServerEvent::error("nope")).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["message"], "nope");
    }

    #[test]
    fn test_client_event_parsing() {
        let id = ConversationId::new();
        let event: ClientEvent = serde_json::from_value(serde_json::json!({
            "type": "typing",
            "conversation_id": id,
        }))
        .unwrap();
        assert!(matches!(
            event,
            ClientEvent::Typing { is_typing: true, .. }
        ));

        let bad = serde_json::from_str::<ClientEvent>(r#"{"type":"shutdown"}"#);
        assert!(bad.is_err());
    }
}

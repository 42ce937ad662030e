use anyhow::Context;
use campus_core::{Action, Actor, AppError, PaginationMeta, Paginated, Resource, authorize};
use campus_models::ids::{ConversationId, MessageId, UserId};
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection, PgPool};
use tracing::{info, instrument};
use uuid::Uuid;

use super::model::{
    AddParticipantsDto, ArchiveState, Conversation, ConversationDetail, ConversationFilterParams,
    ConversationKind, CreateConversationDto, DEFAULT_MESSAGE_PAGE, Message, MessageFilterParams,
    MessageKind, Participant, ParticipantRole, SendMessageDto,
};
use crate::metrics::track_message_sent;
use crate::modules::notifications::events::{Notification, ServerEvent};
use crate::modules::notifications::hub::NotificationHub;

const CONVERSATION_COLUMNS: &str = "c.id, c.kind, c.title, c.course_id, c.created_by, c.archived, \
     c.read_only, c.last_message_content, c.last_message_sender, c.last_message_at, \
     c.created_at, c.updated_at";

const MESSAGE_COLUMNS: &str =
    "id, conversation_id, sender_id, content, kind, attachments, reply_to, edited, sent_at";

const SNAPSHOT_LEN: usize = 100;

#[derive(FromRow)]
struct Membership {
    role: ParticipantRole,
    active: bool,
}

/// A conversation plus the caller's standing in it.
pub struct ConversationAccess {
    pub conversation: Conversation,
    pub participant: bool,
    pub conversation_admin: bool,
}

impl ConversationAccess {
    pub fn resource(&self) -> Resource<'static> {
        Resource::Conversation {
            participant: self.participant,
            conversation_admin: self.conversation_admin,
            read_only: self.conversation.read_only,
        }
    }
}

fn snapshot(dto: &SendMessageDto) -> String {
    let content = dto.content.trim();
    if content.is_empty() {
        return "[attachment]".to_string();
    }
    content.chars().take(SNAPSHOT_LEN).collect()
}

pub struct ConversationService;

impl ConversationService {
    async fn fetch_conversation(
        conn: &mut PgConnection,
        id: ConversationId,
    ) -> Result<Conversation, AppError> {
        sqlx::query_as::<_, Conversation>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations c WHERE c.id = $1"
        ))
        .bind(id)
        .fetch_optional(conn)
        .await
        .context("Failed to fetch conversation")
        .map_err(AppError::database)?
        .ok_or_else(|| AppError::not_found("Conversation not found"))
    }

    pub async fn access(
        conn: &mut PgConnection,
        actor: &Actor,
        id: ConversationId,
    ) -> Result<ConversationAccess, AppError> {
        let conversation = Self::fetch_conversation(&mut *conn, id).await?;

        let membership = sqlx::query_as::<_, Membership>(
            "SELECT role, active FROM conversation_participants
             WHERE conversation_id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(actor.user_id)
        .fetch_optional(conn)
        .await
        .context("Failed to load membership")
        .map_err(AppError::database)?;

        let participant = membership.as_ref().is_some_and(|m| m.active);
        let conversation_admin =
            membership.is_some_and(|m| m.active && m.role == ParticipantRole::Admin);

        Ok(ConversationAccess {
            conversation,
            participant,
            conversation_admin,
        })
    }

    async fn participants(
        conn: &mut PgConnection,
        id: ConversationId,
    ) -> Result<Vec<Participant>, AppError> {
        sqlx::query_as::<_, Participant>(
            "SELECT p.user_id, u.full_name, p.role, p.active, p.added_at
             FROM conversation_participants p
             JOIN users u ON u.id = p.user_id
             WHERE p.conversation_id = $1
             ORDER BY p.added_at",
        )
        .bind(id)
        .fetch_all(conn)
        .await
        .context("Failed to fetch participants")
        .map_err(AppError::database)
    }

    async fn active_participant_ids(
        conn: &mut PgConnection,
        id: ConversationId,
    ) -> Result<Vec<Uuid>, AppError> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM conversation_participants WHERE conversation_id = $1 AND active",
        )
        .bind(id)
        .fetch_all(conn)
        .await
        .context("Failed to fetch participant ids")
        .map_err(AppError::database)
    }

    async fn detail(
        conn: &mut PgConnection,
        conversation: Conversation,
    ) -> Result<ConversationDetail, AppError> {
        let participants = Self::participants(conn, conversation.id).await?;
        Ok(ConversationDetail {
            conversation,
            participants,
        })
    }

    async fn ensure_users_exist(conn: &mut PgConnection, ids: &[UserId]) -> Result<(), AppError> {
        let missing = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM UNNEST($1::uuid[]) AS wanted(id)
             WHERE NOT EXISTS (SELECT 1 FROM users u WHERE u.id = wanted.id AND u.active)",
        )
        .bind(ids)
        .fetch_one(conn)
        .await
        .context("Failed to check participants")
        .map_err(AppError::database)?;

        if missing > 0 {
            return Err(AppError::bad_request("One or more participants do not exist"));
        }
        Ok(())
    }

    /// An existing direct conversation between two users, archived or not.
    async fn find_direct(
        conn: &mut PgConnection,
        a: Uuid,
        b: Uuid,
    ) -> Result<Option<ConversationId>, AppError> {
        sqlx::query_scalar::<_, ConversationId>(
            "SELECT c.id FROM conversations c
             JOIN conversation_participants pa
               ON pa.conversation_id = c.id AND pa.user_id = $1 AND pa.active
             JOIN conversation_participants pb
               ON pb.conversation_id = c.id AND pb.user_id = $2 AND pb.active
             WHERE c.kind = 'direct'
             ORDER BY c.created_at
             LIMIT 1",
        )
        .bind(a)
        .bind(b)
        .fetch_optional(conn)
        .await
        .context("Failed to look up direct conversation")
        .map_err(AppError::database)
    }

    async fn insert_message(
        conn: &mut PgConnection,
        id: ConversationId,
        sender: Uuid,
        dto: &SendMessageDto,
    ) -> Result<Message, AppError> {
        let message = sqlx::query_as::<_, Message>(&format!(
            "INSERT INTO messages (conversation_id, sender_id, content, kind, attachments, reply_to)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(id)
        .bind(sender)
        .bind(dto.content.trim())
        .bind(dto.kind())
        .bind(Json(&dto.attachments))
        .bind(dto.reply_to)
        .fetch_one(&mut *conn)
        .await
        .context("Failed to insert message")
        .map_err(AppError::database)?;

        sqlx::query(
            "INSERT INTO message_reads (message_id, user_id) VALUES ($1, $2)
             ON CONFLICT DO NOTHING",
        )
        .bind(message.id)
        .bind(sender)
        .execute(&mut *conn)
        .await
        .context("Failed to record sender read")
        .map_err(AppError::database)?;

        sqlx::query(
            "UPDATE conversations
             SET last_message_content = $2, last_message_sender = $3,
                 last_message_at = $4, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(snapshot(dto))
        .bind(sender)
        .bind(message.sent_at)
        .execute(conn)
        .await
        .context("Failed to update last message")
        .map_err(AppError::database)?;

        Ok(message)
    }

    #[instrument(skip(db, filters), fields(db.operation = "SELECT", db.table = "conversations"))]
    pub async fn get_conversations(
        db: &PgPool,
        actor: &Actor,
        filters: ConversationFilterParams,
    ) -> Result<Paginated<Conversation>, AppError> {
        const FROM: &str = "FROM conversations c
             JOIN conversation_participants p
               ON p.conversation_id = c.id AND p.user_id = $1 AND p.active
             WHERE ($2::bool IS NULL OR c.archived = $2)";

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) {FROM}"))
            .bind(actor.user_id)
            .bind(filters.archived)
            .fetch_one(db)
            .await
            .context("Failed to count conversations")
            .map_err(AppError::database)?;

        let conversations = sqlx::query_as::<_, Conversation>(&format!(
            "SELECT {CONVERSATION_COLUMNS} {FROM}
             ORDER BY c.last_message_at DESC NULLS LAST, c.created_at DESC
             LIMIT $3 OFFSET $4"
        ))
        .bind(actor.user_id)
        .bind(filters.archived)
        .bind(filters.pagination.limit())
        .bind(filters.pagination.offset())
        .fetch_all(db)
        .await
        .context("Failed to fetch conversations")
        .map_err(AppError::database)?;

        Ok(Paginated::new(
            conversations,
            PaginationMeta::new(total, &filters.pagination),
        ))
    }

    /// Creates a conversation. For a direct conversation that already
    /// exists, returns it with `false` instead of creating a new one.
    #[instrument(skip(db, dto), fields(db.operation = "INSERT", db.table = "conversations"))]
    pub async fn create_conversation(
        db: &PgPool,
        actor: &Actor,
        dto: CreateConversationDto,
    ) -> Result<(ConversationDetail, bool), AppError> {
        let mut others: Vec<UserId> = dto
            .participant_ids
            .iter()
            .copied()
            .filter(|id| id.into_inner() != actor.user_id)
            .collect();
        others.sort_by_key(|id| id.into_inner());
        others.dedup();

        if dto.kind == ConversationKind::Direct && others.len() != 1 {
            return Err(AppError::bad_request(
                "A direct conversation needs exactly one other participant",
            ));
        }

        let mut tx = db
            .begin()
            .await
            .context("Failed to begin transaction")
            .map_err(AppError::database)?;

        Self::ensure_users_exist(&mut tx, &others).await?;

        if dto.kind == ConversationKind::Direct {
            let other = others[0].into_inner();
            if let Some(existing) = Self::find_direct(&mut tx, actor.user_id, other).await? {
                let conversation = Self::fetch_conversation(&mut tx, existing).await?;
                let detail = Self::detail(&mut tx, conversation).await?;
                return Ok((detail, false));
            }
        }

        if let Some(course_id) = dto.course_id {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM courses WHERE id = $1)",
            )
            .bind(course_id)
            .fetch_one(&mut *tx)
            .await
            .context("Failed to check course")
            .map_err(AppError::database)?;
            if !exists {
                return Err(AppError::not_found("Course not found"));
            }
        }

        let id = sqlx::query_scalar::<_, ConversationId>(
            "INSERT INTO conversations (kind, title, course_id, created_by)
             VALUES ($1, $2, $3, $4)
             RETURNING id",
        )
        .bind(dto.kind)
        .bind(dto.title.as_deref().map(str::trim))
        .bind(dto.course_id)
        .bind(actor.user_id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to insert conversation")
        .map_err(AppError::database)?;

        sqlx::query(
            "INSERT INTO conversation_participants (conversation_id, user_id, role, added_by)
             VALUES ($1, $2, 'admin', $2)",
        )
        .bind(id)
        .bind(actor.user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to add creator")
        .map_err(AppError::database)?;

        sqlx::query(
            "INSERT INTO conversation_participants (conversation_id, user_id, role, added_by)
             SELECT $1, UNNEST($2::uuid[]), 'member', $3",
        )
        .bind(id)
        .bind(&others)
        .bind(actor.user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to add participants")
        .map_err(AppError::database)?;

        if let Some(content) = dto.initial_message.as_deref().map(str::trim)
            && !content.is_empty()
        {
            let first = SendMessageDto {
                content: content.to_string(),
                ..Default::default()
            };
            Self::insert_message(&mut tx, id, actor.user_id, &first).await?;
            track_message_sent(MessageKind::Text.as_label());
        }

        let conversation = Self::fetch_conversation(&mut tx, id).await?;
        let detail = Self::detail(&mut tx, conversation).await?;

        tx.commit()
            .await
            .context("Failed to commit transaction")
            .map_err(AppError::database)?;

        info!(conversation.id = %id, kind = ?dto.kind, "Conversation created");
        Ok((detail, true))
    }

    #[instrument(skip(db))]
    pub async fn get_conversation(
        db: &PgPool,
        actor: &Actor,
        id: ConversationId,
    ) -> Result<ConversationDetail, AppError> {
        let mut conn = db
            .acquire()
            .await
            .context("Failed to acquire connection")
            .map_err(AppError::database)?;

        let access = Self::access(&mut conn, actor, id).await?;
        authorize(actor, Action::Read, &access.resource())?;
        Self::detail(&mut conn, access.conversation).await
    }

    #[instrument(skip(db, dto))]
    pub async fn add_participants(
        db: &PgPool,
        actor: &Actor,
        id: ConversationId,
        dto: AddParticipantsDto,
    ) -> Result<ConversationDetail, AppError> {
        let mut tx = db
            .begin()
            .await
            .context("Failed to begin transaction")
            .map_err(AppError::database)?;

        let access = Self::access(&mut tx, actor, id).await?;
        authorize(actor, Action::ManageParticipants, &access.resource())?;

        if access.conversation.kind == ConversationKind::Direct {
            return Err(AppError::bad_request(
                "Participants of a direct conversation cannot change",
            ));
        }

        Self::ensure_users_exist(&mut tx, &dto.user_ids).await?;

        sqlx::query(
            "INSERT INTO conversation_participants (conversation_id, user_id, role, added_by)
             SELECT $1, UNNEST($2::uuid[]), 'member', $3
             ON CONFLICT (conversation_id, user_id)
             DO UPDATE SET active = TRUE, added_at = NOW(), added_by = EXCLUDED.added_by
             WHERE NOT conversation_participants.active",
        )
        .bind(id)
        .bind(&dto.user_ids)
        .bind(actor.user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to add participants")
        .map_err(AppError::database)?;

        let detail = Self::detail(&mut tx, access.conversation).await?;

        tx.commit()
            .await
            .context("Failed to commit transaction")
            .map_err(AppError::database)?;

        info!(conversation.id = %id, added = dto.user_ids.len(), "Participants added");
        Ok(detail)
    }

    /// Leaving is always allowed; removing someone else needs conversation
    /// admin or global admin.
    #[instrument(skip(db))]
    pub async fn remove_participant(
        db: &PgPool,
        actor: &Actor,
        id: ConversationId,
        user_id: UserId,
    ) -> Result<(), AppError> {
        let mut conn = db
            .acquire()
            .await
            .context("Failed to acquire connection")
            .map_err(AppError::database)?;

        let access = Self::access(&mut conn, actor, id).await?;
        let leaving = user_id.into_inner() == actor.user_id;
        if !leaving {
            authorize(actor, Action::ManageParticipants, &access.resource())?;
        }

        if access.conversation.kind == ConversationKind::Direct {
            return Err(AppError::bad_request(
                "Participants of a direct conversation cannot change",
            ));
        }

        let result = sqlx::query(
            "UPDATE conversation_participants SET active = FALSE
             WHERE conversation_id = $1 AND user_id = $2 AND active",
        )
        .bind(id)
        .bind(user_id)
        .execute(&mut *conn)
        .await
        .context("Failed to remove participant")
        .map_err(AppError::database)?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Participant not found"));
        }

        info!(conversation.id = %id, user.id = %user_id, "Participant removed");
        Ok(())
    }

    /// A page of messages in chronological order. Everything returned is
    /// marked read for the caller.
    #[instrument(skip(db, filters))]
    pub async fn get_messages(
        db: &PgPool,
        actor: &Actor,
        id: ConversationId,
        filters: MessageFilterParams,
    ) -> Result<Paginated<Message>, AppError> {
        let mut conn = db
            .acquire()
            .await
            .context("Failed to acquire connection")
            .map_err(AppError::database)?;

        let access = Self::access(&mut conn, actor, id).await?;
        if !access.participant {
            return Err(AppError::forbidden("You are not a participant of this conversation"));
        }

        let limit = filters.pagination.limit_or(DEFAULT_MESSAGE_PAGE);
        let offset = filters.pagination.offset_or(DEFAULT_MESSAGE_PAGE);

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM messages
             WHERE conversation_id = $1 AND NOT deleted
               AND ($2::timestamptz IS NULL OR sent_at < $2)",
        )
        .bind(id)
        .bind(filters.before)
        .fetch_one(&mut *conn)
        .await
        .context("Failed to count messages")
        .map_err(AppError::database)?;

        let mut messages = sqlx::query_as::<_, Message>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE conversation_id = $1 AND NOT deleted
               AND ($2::timestamptz IS NULL OR sent_at < $2)
             ORDER BY sent_at DESC
             LIMIT $3 OFFSET $4"
        ))
        .bind(id)
        .bind(filters.before)
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *conn)
        .await
        .context("Failed to fetch messages")
        .map_err(AppError::database)?;
        messages.reverse();

        let ids: Vec<MessageId> = messages.iter().map(|m| m.id).collect();
        sqlx::query(
            "INSERT INTO message_reads (message_id, user_id)
             SELECT UNNEST($1::uuid[]), $2
             ON CONFLICT DO NOTHING",
        )
        .bind(&ids)
        .bind(actor.user_id)
        .execute(&mut *conn)
        .await
        .context("Failed to mark messages read")
        .map_err(AppError::database)?;

        Ok(Paginated::new(
            messages,
            PaginationMeta::with_default_limit(total, &filters.pagination, DEFAULT_MESSAGE_PAGE),
        ))
    }

    /// Stores a message, updates the snapshot, and publishes it.
    #[instrument(skip(db, hub, dto))]
    pub async fn send_message(
        db: &PgPool,
        hub: &NotificationHub,
        actor: &Actor,
        id: ConversationId,
        dto: SendMessageDto,
    ) -> Result<Message, AppError> {
        let mut tx = db
            .begin()
            .await
            .context("Failed to begin transaction")
            .map_err(AppError::database)?;

        let access = Self::access(&mut tx, actor, id).await?;
        if !access.participant {
            return Err(AppError::forbidden("You are not a participant of this conversation"));
        }
        authorize(actor, Action::PostMessage, &access.resource())
            .map_err(|_| AppError::forbidden("This conversation is read-only"))?;

        if let Some(reply_to) = dto.reply_to {
            let same_conversation = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM messages WHERE id = $1 AND conversation_id = $2)",
            )
            .bind(reply_to)
            .bind(id)
            .fetch_one(&mut *tx)
            .await
            .context("Failed to check reply target")
            .map_err(AppError::database)?;
            if !same_conversation {
                return Err(AppError::bad_request(
                    "reply_to must reference a message in this conversation",
                ));
            }
        }

        let message = Self::insert_message(&mut tx, id, actor.user_id, &dto).await?;
        let recipients: Vec<Uuid> = Self::active_participant_ids(&mut tx, id)
            .await?
            .into_iter()
            .filter(|user_id| *user_id != actor.user_id)
            .collect();

        tx.commit()
            .await
            .context("Failed to commit transaction")
            .map_err(AppError::database)?;

        track_message_sent(message.kind.as_label());

        hub.send_to_conversation(
            id,
            ServerEvent::NewMessage {
                message: message.clone(),
            },
            None,
        )
        .await;

        let title = access
            .conversation
            .title
            .clone()
            .unwrap_or_else(|| "New message".to_string());
        let notification = Notification::new("message", title, snapshot(&dto)).with_data(json!({
            "conversation_id": id,
            "message_id": message.id,
        }));
        hub.notify_users(&recipients, notification).await;

        Ok(message)
    }

    /// Marks everything in the conversation read for the caller.
    #[instrument(skip(db))]
    pub async fn mark_read(
        db: &PgPool,
        actor: &Actor,
        id: ConversationId,
    ) -> Result<DateTime<Utc>, AppError> {
        let mut conn = db
            .acquire()
            .await
            .context("Failed to acquire connection")
            .map_err(AppError::database)?;

        let access = Self::access(&mut conn, actor, id).await?;
        if !access.participant {
            return Err(AppError::forbidden("You are not a participant of this conversation"));
        }

        let read_at = Utc::now();
        sqlx::query(
            "INSERT INTO message_reads (message_id, user_id, read_at)
             SELECT id, $2, $3 FROM messages
             WHERE conversation_id = $1 AND NOT deleted
             ON CONFLICT DO NOTHING",
        )
        .bind(id)
        .bind(actor.user_id)
        .bind(read_at)
        .execute(&mut *conn)
        .await
        .context("Failed to mark conversation read")
        .map_err(AppError::database)?;

        Ok(read_at)
    }

    /// Whether `user_id` is an active participant.
    pub async fn is_participant(
        db: &PgPool,
        id: ConversationId,
        user_id: Uuid,
    ) -> Result<bool, AppError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM conversation_participants
             WHERE conversation_id = $1 AND user_id = $2 AND active)",
        )
        .bind(id)
        .bind(user_id)
        .fetch_one(db)
        .await
        .context("Failed to check participation")
        .map_err(AppError::database)
    }

    #[instrument(skip(db))]
    pub async fn toggle_archive(
        db: &PgPool,
        actor: &Actor,
        id: ConversationId,
    ) -> Result<ArchiveState, AppError> {
        let mut conn = db
            .acquire()
            .await
            .context("Failed to acquire connection")
            .map_err(AppError::database)?;

        let access = Self::access(&mut conn, actor, id).await?;
        authorize(actor, Action::Update, &access.resource())?;

        let archived = sqlx::query_scalar::<_, bool>(
            "UPDATE conversations SET archived = NOT archived, updated_at = NOW()
             WHERE id = $1
             RETURNING archived",
        )
        .bind(id)
        .fetch_one(&mut *conn)
        .await
        .context("Failed to toggle archive")
        .map_err(AppError::database)?;

        info!(conversation.id = %id, archived, "Conversation archive toggled");
        Ok(ArchiveState { id, archived })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_models::conversations::Attachment;

    #[test]
    fn test_snapshot_truncates_and_labels_attachments() {
        let long = SendMessageDto {
            content: "a".repeat(300),
            ..Default::default()
        };
        assert_eq!(snapshot(&long).chars().count(), SNAPSHOT_LEN);

        let attachment_only = SendMessageDto {
            content: "   ".to_string(),
            attachments: vec![Attachment {
                name: "notes.pdf".to_string(),
                url: "http://localhost/notes.pdf".to_string(),
                content_type: None,
                size: None,
            }],
            reply_to: None,
        };
        assert_eq!(snapshot(&attachment_only), "[attachment]");
    }

    #[test]
    fn test_access_maps_to_policy_resource() {
        let access = ConversationAccess {
            conversation: Conversation {
                id: ConversationId::new(),
                kind: ConversationKind::Group,
                title: None,
                course_id: None,
                created_by: None,
                archived: false,
                read_only: true,
                last_message_content: None,
                last_message_sender: None,
                last_message_at: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            participant: true,
            conversation_admin: false,
        };
        let member = Actor::new(Uuid::new_v4(), campus_core::Role::Student);
        assert!(campus_core::is_allowed(&member, Action::Read, &access.resource()));
        assert!(!campus_core::is_allowed(
            &member,
            Action::PostMessage,
            &access.resource()
        ));
    }
}

//! Connection registry and room fan-out.
//!
//! Every socket registers on connect and gets an unbounded receiver. Rooms
//! are per user, per role, and per conversation. Sends never block and a
//! closed receiver is skipped; there is no outbox or replay.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use campus_core::Role;
use campus_models::ids::ConversationId;
use tokio::sync::RwLock;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::debug;
use uuid::Uuid;

use super::events::{Notification, ServerEvent};
use crate::metrics::set_realtime_connections;

pub type ConnectionId = Uuid;

struct Connection {
    user_id: Uuid,
    role: Role,
    sender: UnboundedSender<ServerEvent>,
    conversations: HashSet<ConversationId>,
}

#[derive(Default)]
struct Registry {
    connections: HashMap<ConnectionId, Connection>,
    users: HashMap<Uuid, HashSet<ConnectionId>>,
    roles: HashMap<Role, HashSet<ConnectionId>>,
    conversations: HashMap<ConversationId, HashSet<ConnectionId>>,
}

impl Registry {
    fn deliver<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a ConnectionId>,
        event: &ServerEvent,
    ) -> usize {
        let mut delivered = 0;
        for id in ids {
            if let Some(conn) = self.connections.get(id)
                && conn.sender.send(event.clone()).is_ok()
            {
                delivered += 1;
            }
        }
        delivered
    }
}

fn remove_member<K: std::hash::Hash + Eq>(
    rooms: &mut HashMap<K, HashSet<ConnectionId>>,
    key: K,
    id: &ConnectionId,
) {
    if let Some(members) = rooms.get_mut(&key) {
        members.remove(id);
        if members.is_empty() {
            rooms.remove(&key);
        }
    }
}

/// In-process registry of live websocket connections.
///
/// Each connection sits in three kinds of room: its user, its role and any
/// conversations it joined. Senders are unbounded channels, so fan-out never
/// waits on a slow client; a closed receiver just drops the event. Cloning
/// the hub shares the same registry.
///
/// Delivery is best effort and local to this process. Nothing is persisted
/// for users who are offline.
#[derive(Clone, Default)]
pub struct NotificationHub {
    inner: Arc<RwLock<Registry>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection to its user and role rooms.
    pub async fn register(
        &self,
        user_id: Uuid,
        role: Role,
    ) -> (ConnectionId, UnboundedReceiver<ServerEvent>) {
        let (sender, receiver) = unbounded_channel();
        let id = Uuid::new_v4();

        let mut registry = self.inner.write().await;
        registry.connections.insert(
            id,
            Connection {
                user_id,
                role,
                sender,
                conversations: HashSet::new(),
            },
        );
        registry.users.entry(user_id).or_default().insert(id);
        registry.roles.entry(role).or_default().insert(id);
        set_realtime_connections(registry.connections.len());

        debug!(connection.id = %id, user.id = %user_id, "Realtime connection registered");
        (id, receiver)
    }

    /// Drops a connection from every room it belongs to.
    pub async fn unregister(&self, id: ConnectionId) {
        let mut registry = self.inner.write().await;
        let Some(conn) = registry.connections.remove(&id) else {
            return;
        };

        remove_member(&mut registry.users, conn.user_id, &id);
        remove_member(&mut registry.roles, conn.role, &id);
        for conversation in conn.conversations {
            remove_member(&mut registry.conversations, conversation, &id);
        }
        set_realtime_connections(registry.connections.len());

        debug!(connection.id = %id, user.id = %conn.user_id, "Realtime connection closed");
    }

    pub async fn join_conversation(&self, id: ConnectionId, conversation: ConversationId) -> bool {
        let mut registry = self.inner.write().await;
        let Some(conn) = registry.connections.get_mut(&id) else {
            return false;
        };
        conn.conversations.insert(conversation);
        registry
            .conversations
            .entry(conversation)
            .or_default()
            .insert(id);
        true
    }

    pub async fn leave_conversation(&self, id: ConnectionId, conversation: ConversationId) {
        let mut registry = self.inner.write().await;
        if let Some(conn) = registry.connections.get_mut(&id) {
            conn.conversations.remove(&conversation);
        }
        remove_member(&mut registry.conversations, conversation, &id);
    }

    /// Sends to a single connection.
    pub async fn send_to_connection(&self, id: ConnectionId, event: ServerEvent) -> bool {
        let registry = self.inner.read().await;
        registry.deliver([&id], &event) == 1
    }

    pub async fn send_to_user(&self, user_id: Uuid, event: ServerEvent) -> usize {
        let registry = self.inner.read().await;
        match registry.users.get(&user_id) {
            Some(ids) => registry.deliver(ids, &event),
            None => 0,
        }
    }

    pub async fn send_to_role(&self, role: Role, event: ServerEvent) -> usize {
        let registry = self.inner.read().await;
        match registry.roles.get(&role) {
            Some(ids) => registry.deliver(ids, &event),
            None => 0,
        }
    }

    /// Sends to every connection in a conversation room, optionally
    /// skipping one (the sender of a typing indicator).
    pub async fn send_to_conversation(
        &self,
        conversation: ConversationId,
        event: ServerEvent,
        except: Option<ConnectionId>,
    ) -> usize {
        let registry = self.inner.read().await;
        match registry.conversations.get(&conversation) {
            Some(ids) => registry.deliver(
                ids.iter().filter(|id| Some(**id) != except),
                &event,
            ),
            None => 0,
        }
    }

    pub async fn notify_user(&self, user_id: Uuid, notification: Notification) -> usize {
        self.send_to_user(user_id, ServerEvent::Notification { notification })
            .await
    }

    pub async fn notify_users(&self, user_ids: &[Uuid], notification: Notification) -> usize {
        let registry = self.inner.read().await;
        let event = ServerEvent::Notification { notification };
        user_ids
            .iter()
            .filter_map(|user_id| registry.users.get(user_id))
            .map(|ids| registry.deliver(ids, &event))
            .sum()
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }

    pub async fn is_online(&self, user_id: Uuid) -> bool {
        self.inner.read().await.users.contains_key(&user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note() -> Notification {
        Notification::new("test", "Title", "Body")
    }

    #[tokio::test]
    async fn test_user_room_reaches_every_connection_of_user() {
        let hub = NotificationHub::new();
        let user = Uuid::new_v4();
        let (_a, mut rx_a) = hub.register(user, Role::Student).await;
        let (_b, mut rx_b) = hub.register(user, Role::Student).await;
        let (_c, mut rx_other) = hub.register(Uuid::new_v4(), Role::Student).await;

        assert_eq!(hub.notify_user(user, note()).await, 2);
        assert!(matches!(rx_a.try_recv(), Ok(ServerEvent::Notification { .. })));
        assert!(matches!(rx_b.try_recv(), Ok(ServerEvent::Notification { .. })));
        assert!(rx_other.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_role_room() {
        let hub = NotificationHub::new();
        let (_t, mut rx_teacher) = hub.register(Uuid::new_v4(), Role::Teacher).await;
        let (_s, mut rx_student) = hub.register(Uuid::new_v4(), Role::Student).await;

        let sent = hub
            .send_to_role(Role::Teacher, ServerEvent::error("staff only"))
            .await;
        assert_eq!(sent, 1);
        assert!(rx_teacher.try_recv().is_ok());
        assert!(rx_student.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_conversation_room_skips_excluded_connection() {
        let hub = NotificationHub::new();
        let conversation = ConversationId::new();
        let (a, mut rx_a) = hub.register(Uuid::new_v4(), Role::Student).await;
        let (b, mut rx_b) = hub.register(Uuid::new_v4(), Role::Teacher).await;
        assert!(hub.join_conversation(a, conversation).await);
        assert!(hub.join_conversation(b, conversation).await);

        let event = ServerEvent::UserTyping {
            conversation_id: conversation,
            user_id: Uuid::new_v4(),
            is_typing: true,
        };
        assert_eq!(hub.send_to_conversation(conversation, event, Some(a)).await, 1);
        assert!(rx_a.try_recv().is_err());
        assert!(rx_b.try_recv().is_ok());

        hub.leave_conversation(b, conversation).await;
        assert_eq!(
            hub.send_to_conversation(conversation, ServerEvent::error("x"), None)
                .await,
            1
        );
    }

    #[tokio::test]
    async fn test_unregister_purges_rooms() {
        let hub = NotificationHub::new();
        let user = Uuid::new_v4();
        let conversation = ConversationId::new();
        let (id, _rx) = hub.register(user, Role::Admin).await;
        hub.join_conversation(id, conversation).await;
        assert!(hub.is_online(user).await);

        hub.unregister(id).await;
        assert!(!hub.is_online(user).await);
        assert_eq!(hub.connection_count().await, 0);
        assert_eq!(hub.send_to_role(Role::Admin, ServerEvent::error("x")).await, 0);
        assert_eq!(
            hub.send_to_conversation(conversation, ServerEvent::error("x"), None)
                .await,
            0
        );
        assert!(!hub.join_conversation(id, conversation).await);
    }

    #[tokio::test]
    async fn test_closed_receiver_is_skipped() {
        let hub = NotificationHub::new();
        let user = Uuid::new_v4();
        let (_id, rx) = hub.register(user, Role::Student).await;
        drop(rx);
        assert_eq!(hub.notify_user(user, note()).await, 0);
    }
}

//! WebSocket endpoint.
//!
//! Authentication happens before the upgrade. After that, one task per
//! socket multiplexes client frames and hub events with `tokio::select!`.

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade, rejection::WebSocketUpgradeRejection},
    },
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
};
use campus_core::{Actor, AppError};
use campus_models::conversations::SendMessageDto;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use utoipa::IntoParams;
use validator::Validate;

use super::events::{ClientEvent, ServerEvent};
use super::hub::ConnectionId;
use crate::middleware::auth::{AuthUser, authenticate};
use crate::modules::conversations::service::ConversationService;
use crate::state::AppState;
use crate::validator::validation_error;

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct WsParams {
    /// Access token, for clients that cannot set headers on the upgrade
    pub token: Option<String>,
}

fn token_from(params: &WsParams, headers: &HeaderMap) -> Option<String> {
    params
        .token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
        })
}

/// Message safe to show a client; server failures stay generic.
fn client_message(err: &AppError) -> String {
    if err.status.is_server_error() {
        "Something went wrong".to_string()
    } else {
        err.error.to_string()
    }
}

/// Open the real-time channel
#[utoipa::path(
    get,
    path = "/api/ws",
    params(WsParams),
    responses(
        (status = 101, description = "Switching protocols"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "User no longer exists"),
    ),
    security(("bearer_auth" = [])),
    tag = "Realtime"
)]
#[instrument(skip_all)]
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, AppError> {
    let token = token_from(&params, &headers)
        .ok_or_else(|| AppError::unauthorized("Missing access token"))?;
    let user = authenticate(&state, &token).await?;

    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => return Ok(rejection.into_response()),
    };

    Ok(upgrade.on_upgrade(move |socket| run_connection(socket, state, user)))
}

async fn send_event(socket: &mut WebSocket, event: &ServerEvent) -> Result<(), axum::Error> {
    match serde_json::to_string(event) {
        Ok(json) => socket.send(Message::Text(json.into())).await,
        Err(e) => {
            warn!(error = %e, "Failed to serialise server event");
            Ok(())
        }
    }
}

async fn run_connection(mut socket: WebSocket, state: AppState, user: AuthUser) {
    let actor = user.actor();
    let (connection_id, mut events) = state.hub.register(user.user_id, user.role).await;
    info!(connection.id = %connection_id, user.id = %user.user_id, "Realtime client connected");

    let connected = ServerEvent::Connected {
        connection_id,
        user_id: user.user_id,
    };

    if send_event(&mut socket, &connected).await.is_ok() {
        loop {
            tokio::select! {
                incoming = socket.recv() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) =
                            handle_client_text(&state, &actor, connection_id, text.as_str()).await
                            && send_event(&mut socket, &reply).await.is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
                outgoing = events.recv() => match outgoing {
                    Some(event) => {
                        if send_event(&mut socket, &event).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
    }

    state.hub.unregister(connection_id).await;
    info!(connection.id = %connection_id, "Realtime client disconnected");
}

/// Handles one client frame. The returned event, if any, goes back to the
/// sender only.
async fn handle_client_text(
    state: &AppState,
    actor: &Actor,
    connection_id: ConnectionId,
    text: &str,
) -> Option<ServerEvent> {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(e) => return Some(ServerEvent::error(format!("Invalid event: {e}"))),
    };
    debug!(connection.id = %connection_id, event = ?event, "Client event");

    match handle_client_event(state, actor, connection_id, event).await {
        Ok(reply) => reply,
        Err(err) => Some(ServerEvent::error(client_message(&err))),
    }
}

async fn handle_client_event(
    state: &AppState,
    actor: &Actor,
    connection_id: ConnectionId,
    event: ClientEvent,
) -> Result<Option<ServerEvent>, AppError> {
    match event {
        ClientEvent::JoinConversation { conversation_id } => {
            if !ConversationService::is_participant(&state.db, conversation_id, actor.user_id)
                .await?
            {
                return Err(AppError::forbidden(
                    "You are not a participant of this conversation",
                ));
            }
            state
                .hub
                .join_conversation(connection_id, conversation_id)
                .await;
            Ok(Some(ServerEvent::Joined { conversation_id }))
        }
        ClientEvent::LeaveConversation { conversation_id } => {
            state
                .hub
                .leave_conversation(connection_id, conversation_id)
                .await;
            Ok(Some(ServerEvent::Left { conversation_id }))
        }
        ClientEvent::SendMessage {
            conversation_id,
            content,
            attachments,
            reply_to,
        } => {
            let dto = SendMessageDto {
                content,
                attachments,
                reply_to,
            };
            dto.validate().map_err(|e| validation_error(&e))?;
            ConversationService::send_message(&state.db, &state.hub, actor, conversation_id, dto)
                .await?;
            Ok(None)
        }
        ClientEvent::Typing {
            conversation_id,
            is_typing,
        } => {
            if !ConversationService::is_participant(&state.db, conversation_id, actor.user_id)
                .await?
            {
                return Err(AppError::forbidden(
                    "You are not a participant of this conversation",
                ));
            }
            state
                .hub
                .send_to_conversation(
                    conversation_id,
                    ServerEvent::UserTyping {
                        conversation_id,
                        user_id: actor.user_id,
                        is_typing,
                    },
                    Some(connection_id),
                )
                .await;
            Ok(None)
        }
        ClientEvent::MarkRead { conversation_id } => {
            let read_at = ConversationService::mark_read(&state.db, actor, conversation_id).await?;
            state
                .hub
                .send_to_conversation(
                    conversation_id,
                    ServerEvent::MessagesRead {
                        conversation_id,
                        user_id: actor.user_id,
                        read_at,
                    },
                    None,
                )
                .await;
            Ok(None)
        }
        ClientEvent::MarkNotificationRead { notification_id } => {
            Ok(Some(ServerEvent::NotificationMarkedRead { notification_id }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_token_prefers_query_then_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer from-header"),
        );

        let query = WsParams {
            token: Some("from-query".to_string()),
        };
        assert_eq!(token_from(&query, &headers).as_deref(), Some("from-query"));

        let blank = WsParams {
            token: Some("  ".to_string()),
        };
        assert_eq!(token_from(&blank, &headers).as_deref(), Some("from-header"));

        assert_eq!(token_from(&WsParams::default(), &HeaderMap::new()), None);
    }

    #[test]
    fn test_client_message_hides_server_errors() {
        assert_eq!(
            client_message(&AppError::internal_error("db exploded")),
            "Something went wrong"
        );
        assert_eq!(
            client_message(&AppError::forbidden("Not yours")),
            "Not yours"
        );
    }
}

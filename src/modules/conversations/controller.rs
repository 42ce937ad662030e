use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use campus_core::{ApiResponse, AppError, Paginated};
use campus_models::ids::{ConversationId, UserId};
use tracing::instrument;

use super::model::{
    AddParticipantsDto, ArchiveState, Conversation, ConversationDetail, ConversationFilterParams,
    CreateConversationDto, Message, MessageFilterParams, SendMessageDto,
};
use super::service::ConversationService;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;
use crate::validator::ValidatedJson;

/// List the caller's conversations
#[utoipa::path(
    get,
    path = "/api/conversations",
    params(ConversationFilterParams),
    responses(
        (status = 200, description = "Conversations, latest activity first", body = ApiResponse<Paginated<Conversation>>),
        (status = 401, description = "Missing or invalid token"),
    ),
    security(("bearer_auth" = [])),
    tag = "Conversations"
)]
#[instrument(skip(state, auth_user))]
pub async fn get_conversations(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(filters): Query<ConversationFilterParams>,
) -> Result<Json<ApiResponse<Paginated<Conversation>>>, AppError> {
    let conversations =
        ConversationService::get_conversations(&state.db, &auth_user.actor(), filters).await?;
    Ok(Json(ApiResponse::success(conversations)))
}

/// Start a conversation
///
/// A direct conversation that already exists between the two users is
/// returned with 200 instead of being created again.
#[utoipa::path(
    post,
    path = "/api/conversations",
    request_body = CreateConversationDto,
    responses(
        (status = 201, description = "Conversation created", body = ApiResponse<ConversationDetail>),
        (status = 200, description = "Existing direct conversation", body = ApiResponse<ConversationDetail>),
        (status = 400, description = "Validation error or unknown participant"),
        (status = 404, description = "Course not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Conversations"
)]
#[instrument(skip(state, auth_user, dto))]
pub async fn create_conversation(
    State(state): State<AppState>,
    auth_user: AuthUser,
    ValidatedJson(dto): ValidatedJson<CreateConversationDto>,
) -> Result<(StatusCode, Json<ApiResponse<ConversationDetail>>), AppError> {
    let (detail, created) =
        ConversationService::create_conversation(&state.db, &auth_user.actor(), dto).await?;

    if created {
        Ok((
            StatusCode::CREATED,
            Json(ApiResponse::with_message(detail, "Conversation created")),
        ))
    } else {
        Ok((
            StatusCode::OK,
            Json(ApiResponse::with_message(detail, "Conversation already exists")),
        ))
    }
}

/// Get a conversation with its participants
#[utoipa::path(
    get,
    path = "/api/conversations/{id}",
    params(("id" = ConversationId, Path, description = "Conversation ID")),
    responses(
        (status = 200, description = "Conversation", body = ApiResponse<ConversationDetail>),
        (status = 403, description = "Not a participant"),
        (status = 404, description = "Conversation not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Conversations"
)]
#[instrument(skip(state, auth_user))]
pub async fn get_conversation(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<ConversationId>,
) -> Result<Json<ApiResponse<ConversationDetail>>, AppError> {
    let detail = ConversationService::get_conversation(&state.db, &auth_user.actor(), id).await?;
    Ok(Json(ApiResponse::success(detail)))
}

/// Add participants
#[utoipa::path(
    post,
    path = "/api/conversations/{id}/participants",
    params(("id" = ConversationId, Path, description = "Conversation ID")),
    request_body = AddParticipantsDto,
    responses(
        (status = 200, description = "Participants added", body = ApiResponse<ConversationDetail>),
        (status = 400, description = "Direct conversation or unknown user"),
        (status = 403, description = "Not a conversation admin"),
    ),
    security(("bearer_auth" = [])),
    tag = "Conversations"
)]
#[instrument(skip(state, auth_user, dto))]
pub async fn add_participants(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<ConversationId>,
    ValidatedJson(dto): ValidatedJson<AddParticipantsDto>,
) -> Result<Json<ApiResponse<ConversationDetail>>, AppError> {
    let detail =
        ConversationService::add_participants(&state.db, &auth_user.actor(), id, dto).await?;
    Ok(Json(ApiResponse::with_message(detail, "Participants added")))
}

/// Remove a participant, or leave
#[utoipa::path(
    delete,
    path = "/api/conversations/{id}/participants/{user_id}",
    params(
        ("id" = ConversationId, Path, description = "Conversation ID"),
        ("user_id" = UserId, Path, description = "User ID")
    ),
    responses(
        (status = 204, description = "Participant removed"),
        (status = 400, description = "Direct conversation"),
        (status = 403, description = "Not a conversation admin"),
        (status = 404, description = "Participant not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Conversations"
)]
#[instrument(skip(state, auth_user))]
pub async fn remove_participant(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path((id, user_id)): Path<(ConversationId, UserId)>,
) -> Result<StatusCode, AppError> {
    ConversationService::remove_participant(&state.db, &auth_user.actor(), id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Message history
#[utoipa::path(
    get,
    path = "/api/conversations/{id}/messages",
    params(("id" = ConversationId, Path, description = "Conversation ID"), MessageFilterParams),
    responses(
        (status = 200, description = "Messages in chronological order", body = ApiResponse<Paginated<Message>>),
        (status = 403, description = "Not a participant"),
        (status = 404, description = "Conversation not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Conversations"
)]
#[instrument(skip(state, auth_user))]
pub async fn get_messages(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<ConversationId>,
    Query(filters): Query<MessageFilterParams>,
) -> Result<Json<ApiResponse<Paginated<Message>>>, AppError> {
    let messages =
        ConversationService::get_messages(&state.db, &auth_user.actor(), id, filters).await?;
    Ok(Json(ApiResponse::success(messages)))
}

/// Send a message
#[utoipa::path(
    post,
    path = "/api/conversations/{id}/messages",
    params(("id" = ConversationId, Path, description = "Conversation ID")),
    request_body = SendMessageDto,
    responses(
        (status = 201, description = "Message sent", body = ApiResponse<Message>),
        (status = 400, description = "Empty message or bad reply target"),
        (status = 403, description = "Not a participant or read-only"),
        (status = 404, description = "Conversation not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Conversations"
)]
#[instrument(skip(state, auth_user, dto), fields(user.id = %auth_user.user_id))]
pub async fn send_message(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<ConversationId>,
    ValidatedJson(dto): ValidatedJson<SendMessageDto>,
) -> Result<(StatusCode, Json<ApiResponse<Message>>), AppError> {
    let message =
        ConversationService::send_message(&state.db, &state.hub, &auth_user.actor(), id, dto)
            .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(message, "Message sent")),
    ))
}

/// Toggle the archived flag
#[utoipa::path(
    patch,
    path = "/api/conversations/{id}/archive",
    params(("id" = ConversationId, Path, description = "Conversation ID")),
    responses(
        (status = 200, description = "Archive state", body = ApiResponse<ArchiveState>),
        (status = 403, description = "Not a participant"),
        (status = 404, description = "Conversation not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Conversations"
)]
#[instrument(skip(state, auth_user))]
pub async fn toggle_archive(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<ConversationId>,
) -> Result<Json<ApiResponse<ArchiveState>>, AppError> {
    let archive = ConversationService::toggle_archive(&state.db, &auth_user.actor(), id).await?;
    Ok(Json(ApiResponse::success(archive)))
}

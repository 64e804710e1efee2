use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::bridge::room_for_session;
use crate::chat::service::DeleteOutcome;
use crate::db::PageQuery;
use crate::errors::AppError;
use crate::models::account::{AccountKind, Party};
use crate::models::chat::{ChatMessageRow, ChatSessionRow, SessionSummary};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct OpenSessionRequest {
    pub kind: AccountKind,
    pub id: Uuid,
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub body: String,
    /// Defaults to the other participant.
    pub receiver: Option<Party>,
}

#[derive(Deserialize, Default)]
pub struct MarkReadRequest {
    pub message_ids: Option<Vec<Uuid>>,
}

#[derive(Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    pub for_everyone: bool,
}

#[derive(Deserialize)]
pub struct RecentQuery {
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct TokenRequest {
    pub session_id: Uuid,
}

#[derive(Serialize)]
pub struct CountResponse {
    pub count: u64,
}

#[derive(Serialize)]
pub struct UnreadResponse {
    pub unread: i64,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub room: String,
}

/// POST /api/v1/chat/sessions
pub async fn handle_open_session(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<OpenSessionRequest>,
) -> Result<Json<ChatSessionRow>, AppError> {
    let me = user.party()?;
    if req.kind == AccountKind::Admin {
        return Err(AppError::Validation("Admins cannot be messaged".to_string()));
    }
    let session = state
        .chat
        .get_or_create_session(me, Party::new(req.kind, req.id))
        .await?;
    Ok(Json(session))
}

/// GET /api/v1/chat/sessions
pub async fn handle_list_sessions(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<SessionSummary>>, AppError> {
    Ok(Json(state.chat.list_sessions(user.party()?).await?))
}

/// POST /api/v1/chat/sessions/:id/archive
pub async fn handle_archive_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.chat.archive_session(id, user.party()?).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/chat/sessions/:id/messages
pub async fn handle_list_messages(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> Result<Json<Vec<ChatMessageRow>>, AppError> {
    Ok(Json(
        state
            .chat
            .list_messages(id, user.party()?, page.page, page.per_page)
            .await?,
    ))
}

/// POST /api/v1/chat/sessions/:id/messages
pub async fn handle_send_message(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<ChatMessageRow>), AppError> {
    let message = state
        .chat
        .send_message(id, user.party()?, req.receiver, &req.body)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// POST /api/v1/chat/sessions/:id/read
///
/// Without `message_ids`, marks everything addressed to the caller in the session.
pub async fn handle_mark_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    body: Option<Json<MarkReadRequest>>,
) -> Result<Json<CountResponse>, AppError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let count = state
        .chat
        .mark_read(id, user.party()?, req.message_ids.as_deref())
        .await?;
    Ok(Json(CountResponse { count }))
}

/// DELETE /api/v1/chat/messages/:id?for_everyone=true
pub async fn handle_delete_message(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<DeleteOutcome>, AppError> {
    Ok(Json(
        state
            .chat
            .delete_message(id, user.party()?, query.for_everyone)
            .await?,
    ))
}

/// GET /api/v1/chat/unread
pub async fn handle_unread_count(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<UnreadResponse>, AppError> {
    Ok(Json(UnreadResponse {
        unread: state.chat.unread_count(user.party()?).await?,
    }))
}

/// GET /api/v1/chat/unread/recent
pub async fn handle_recent_unread(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<ChatMessageRow>>, AppError> {
    Ok(Json(
        state.chat.recent_unread(user.party()?, query.limit).await?,
    ))
}

/// POST /api/v1/chat/token
///
/// Voice / video grant for the session's room.
pub async fn handle_access_token(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let bridge = state
        .bridge
        .as_ref()
        .ok_or_else(|| AppError::Unavailable("Voice and video are not configured".to_string()))?;
    let party = user.party()?;
    let session = state.chat.authorize_room(req.session_id, party).await?;
    let room = room_for_session(session.id);
    let token = bridge
        .access_token(party, &room)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Access token not issued: {e}")))?;
    Ok(Json(TokenResponse { token, room }))
}

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use parley_db::CoreError;
use parley_types::api::{Claims, MarkReadResponse, MessageResponse, SendMessageRequest, group_reactions};
use parley_types::events::GatewayEvent;
use parley_types::models::{AdviceSession, Message, SessionStatus};

use crate::error::ApiError;
use crate::notify::Notification;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Cursor-based pagination — pass the `created_at` timestamp of the
    /// oldest message from the previous page to fetch older messages.
    pub before: Option<String>,
}

fn default_limit() -> u32 {
    50
}

fn to_response(message: Message) -> MessageResponse {
    MessageResponse {
        id: message.id,
        session_id: message.session_id,
        sender_id: message.sender_id,
        content: message.content,
        media_kind: message.media_kind,
        media_ref: message.media_ref,
        is_read: message.is_read,
        created_at: message.created_at,
        reactions: group_reactions(&message.reactions),
    }
}

/// Load the session and check the caller may act in it. Messaging requires
/// an active conversation; reading history is allowed once resolved too.
fn active_session_for(
    db: &parley_db::Database,
    session_id: Uuid,
    participant_id: Uuid,
) -> Result<AdviceSession, CoreError> {
    let session = db.get_session(session_id)?;
    if !session.is_participant(participant_id) {
        return Err(CoreError::NotParticipant);
    }
    if session.status != SessionStatus::Active {
        return Err(CoreError::NotActive);
    }
    Ok(session)
}

/// Persist a message and broadcast it. The response body is the
/// authoritative copy the sender's timeline reconciles its optimistic entry
/// against; the gateway echo covers the other participant (and this one,
/// idempotently).
pub async fn send_message(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let sender_id = claims.sub;
    let (session, message) = tokio::task::spawn_blocking(move || {
        let session = active_session_for(&db.db, session_id, sender_id)?;
        let message = db.db.insert_message(
            session_id,
            sender_id,
            req.content.as_deref(),
            req.media_kind,
            req.media_ref.as_deref(),
        )?;
        Ok::<_, CoreError>((session, message))
    })
    .await??;

    state.dispatcher.broadcast(GatewayEvent::MessageCreate {
        message: message.clone(),
    });
    if let Some(other) = session.other_participant(sender_id) {
        state
            .notifier
            .notify(other, Notification::MessageReceived { session_id });
    }

    Ok((StatusCode::CREATED, Json(to_response(message))))
}

pub async fn get_messages(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Query(query): Query<MessageQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let participant_id = claims.sub;
    let limit = query.limit.min(200);
    let before = query.before;

    let messages = tokio::task::spawn_blocking(move || {
        let session = db.db.get_session(session_id)?;
        if !session.is_participant(participant_id) {
            return Err(CoreError::NotParticipant);
        }
        db.db.get_messages(session_id, limit, before.as_deref())
    })
    .await??;

    let messages: Vec<MessageResponse> = messages.into_iter().map(to_response).collect();
    Ok(Json(messages))
}

/// Batch read-state flip: every unread message from the other participant
/// becomes read in one call, issued when the session view becomes visible.
pub async fn mark_read(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let reader_id = claims.sub;
    let message_ids = tokio::task::spawn_blocking(move || {
        let session = db.db.get_session(session_id)?;
        if !session.is_participant(reader_id) {
            return Err(CoreError::NotParticipant);
        }
        db.db.mark_messages_read(session_id, reader_id)
    })
    .await??;

    if !message_ids.is_empty() {
        state.dispatcher.broadcast(GatewayEvent::MessagesRead {
            session_id,
            reader_id: claims.sub,
            message_ids: message_ids.clone(),
        });
    }

    Ok(Json(MarkReadResponse { message_ids }))
}

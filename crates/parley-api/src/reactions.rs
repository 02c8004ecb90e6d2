use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use parley_db::CoreError;
use parley_types::api::{Claims, ToggleReactionRequest};
use parley_types::events::GatewayEvent;

use crate::error::ApiError;
use crate::state::AppState;

/// Toggle a (responder, emoji) reaction on a message. The store performs
/// this as an atomic per-row insert-or-delete against a uniqueness
/// constraint — two responders racing on the same message can never erase
/// each other's reactions.
pub async fn toggle_reaction(
    State(state): State<AppState>,
    Path((session_id, message_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ToggleReactionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let responder_id = claims.sub;
    let emoji = req.emoji.clone();
    let (added, created_at) = tokio::task::spawn_blocking(move || {
        let session = db.db.get_session(session_id)?;
        if !session.is_participant(responder_id) {
            return Err(CoreError::NotParticipant);
        }
        // The message must belong to the session in the path.
        if db.db.message_session(message_id)? != session_id {
            return Err(CoreError::NotFound);
        }
        db.db.toggle_reaction(message_id, responder_id, &emoji)
    })
    .await??;

    match created_at {
        Some(created_at) if added => {
            state.dispatcher.broadcast(GatewayEvent::ReactionAdd {
                session_id,
                message_id,
                responder_id: claims.sub,
                emoji: req.emoji,
                created_at,
            });
        }
        _ => {
            state.dispatcher.broadcast(GatewayEvent::ReactionRemove {
                session_id,
                message_id,
                responder_id: claims.sub,
                emoji: req.emoji,
            });
        }
    }

    Ok(Json(serde_json::json!({ "added": added })))
}

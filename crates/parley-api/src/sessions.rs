use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use parley_types::api::{Claims, CreateSessionRequest, RateSessionRequest, SessionSummary};
use parley_types::events::GatewayEvent;
use parley_types::models::SessionStatus;

use crate::error::ApiError;
use crate::notify::Notification;
use crate::state::AppState;

/// Post a question: a session record in `pending`, optionally targeted at
/// a specific helper.
pub async fn create_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let session = tokio::task::spawn_blocking(move || {
        db.db
            .create_session(req.question_id, claims.sub, req.target_helper_id)
    })
    .await??;

    Ok((StatusCode::CREATED, Json(session)))
}

/// Claim a pending question. Exactly one helper wins; the rest receive
/// `already_claimed` so their UI can drop the candidate without an error
/// dialog.
pub async fn claim_question(
    State(state): State<AppState>,
    Path(question_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let helper_id = claims.sub;
    let session =
        tokio::task::spawn_blocking(move || db.db.claim_question(question_id, helper_id)).await??;

    state.dispatcher.broadcast(GatewayEvent::SessionUpdate {
        session: session.clone(),
    });
    state.notifier.notify(
        session.seeker_id,
        Notification::SessionClaimed {
            session_id: session.id,
        },
    );

    Ok(Json(session))
}

/// Resolve an active session. Idempotent for retried calls. Stats for the
/// helper are recomputed synchronously so a profile view is never more than
/// one recomputation stale.
pub async fn resolve_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let actor_id = claims.sub;
    let session = tokio::task::spawn_blocking(move || {
        let session = db.db.resolve_session(session_id, actor_id)?;
        if let Some(helper_id) = session.helper_id {
            db.db.recompute_stats(helper_id)?;
        }
        Ok::<_, parley_db::CoreError>(session)
    })
    .await??;

    state.dispatcher.broadcast(GatewayEvent::SessionUpdate {
        session: session.clone(),
    });
    if let Some(other) = session.other_participant(claims.sub) {
        state.notifier.notify(
            other,
            Notification::SessionResolved {
                session_id: session.id,
            },
        );
    }

    Ok(Json(session))
}

/// Record the seeker's rating, then recompute the helper's stats.
pub async fn rate_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<RateSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let rater_id = claims.sub;
    let session = tokio::task::spawn_blocking(move || {
        let session =
            db.db
                .rate_session(session_id, rater_id, req.rating, req.feedback.as_deref())?;
        if let Some(helper_id) = session.helper_id {
            db.db.recompute_stats(helper_id)?;
        }
        Ok::<_, parley_db::CoreError>(session)
    })
    .await??;

    state.dispatcher.broadcast(GatewayEvent::SessionUpdate {
        session: session.clone(),
    });

    Ok(Json(session))
}

/// The caller's sessions with per-session unread counts, derived from the
/// message table on every request.
pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let participant_id = claims.sub;
    let sessions =
        tokio::task::spawn_blocking(move || db.db.list_sessions_for(participant_id)).await??;

    let summaries: Vec<SessionSummary> = sessions
        .into_iter()
        .map(|(session, unread_count)| SessionSummary {
            session,
            unread_count,
        })
        .collect();

    Ok(Json(summaries))
}

/// Single-session fetch for screen re-entry: subscriptions are torn down
/// when a view goes inactive, so returning clients re-fetch current state
/// instead of trusting cached deltas.
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let session = tokio::task::spawn_blocking(move || db.db.get_session(session_id)).await??;

    // Pending open questions are visible to any helper browsing them;
    // claimed conversations only to their two participants.
    if session.status != SessionStatus::Pending && !session.is_participant(claims.sub) {
        return Err(parley_db::CoreError::NotParticipant.into());
    }

    Ok(Json(session))
}

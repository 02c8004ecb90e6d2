use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use uuid::Uuid;

use parley_db::CoreError;
use parley_types::api::Claims;

use crate::error::ApiError;
use crate::state::AppState;

/// Helper reputation for a profile view. Reads the row written by the last
/// recomputation; on a cold miss it recomputes on the spot, which is safe
/// because recomputation is pure and idempotent.
pub async fn get_helper_stats(
    State(state): State<AppState>,
    Path(helper_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let stats = tokio::task::spawn_blocking(move || match db.db.get_stats(helper_id)? {
        Some(stats) => Ok(stats),
        None => db.db.recompute_stats(helper_id),
    })
    .await??;

    Ok(Json(stats))
}

/// Record a helpful vote on a resolved session, then re-derive the
/// helper's stats. Votes are unique per voter per session, so replays are
/// harmless; votes before resolution come back as a conflict.
pub async fn helpful_vote(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let voter_id = claims.sub;
    let stats = tokio::task::spawn_blocking(move || {
        let session = db.db.get_session(session_id)?;
        let helper_id = session.helper_id.ok_or(CoreError::NotResolved)?;
        if helper_id == voter_id {
            return Err(CoreError::NotParticipant);
        }
        db.db.record_helpful_vote(session_id, voter_id)?;
        db.db.recompute_stats(helper_id)
    })
    .await??;

    Ok(Json(stats))
}

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use parley_db::CoreError;
use serde_json::json;
use tracing::error;

/// HTTP rendering of the core error taxonomy. Claim and rating conflicts
/// come back as actionable codes the client can branch on (e.g. remove the
/// question from its candidate list on `already_claimed`); storage failures
/// are logged and collapse to 500.
pub struct ApiError(CoreError);

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        Self(e)
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        error!("spawn_blocking join error: {}", e);
        Self(CoreError::Lock)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            CoreError::AlreadyClaimed => (StatusCode::CONFLICT, "already_claimed"),
            CoreError::SelfClaim => (StatusCode::UNPROCESSABLE_ENTITY, "self_claim"),
            CoreError::RatingConflict => (StatusCode::CONFLICT, "rating_conflict"),
            CoreError::InvalidRating => (StatusCode::BAD_REQUEST, "invalid_rating"),
            CoreError::NotActive => (StatusCode::CONFLICT, "not_active"),
            CoreError::NotResolved => (StatusCode::CONFLICT, "not_resolved"),
            CoreError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            CoreError::NotParticipant => (StatusCode::FORBIDDEN, "not_participant"),
            CoreError::InvalidMessage => (StatusCode::BAD_REQUEST, "invalid_message"),
            CoreError::Corrupt(_) | CoreError::Lock | CoreError::Storage(_) => {
                error!("internal error: {}", self.0);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };

        let body = Json(json!({
            "error": code,
            "message": self.0.to_string(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(e: CoreError) -> StatusCode {
        ApiError(e).into_response().status()
    }

    #[test]
    fn recoverable_errors_map_to_client_statuses() {
        assert_eq!(status_of(CoreError::AlreadyClaimed), StatusCode::CONFLICT);
        assert_eq!(
            status_of(CoreError::SelfClaim),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status_of(CoreError::RatingConflict), StatusCode::CONFLICT);
        assert_eq!(status_of(CoreError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_of(CoreError::NotParticipant), StatusCode::FORBIDDEN);
    }

    #[test]
    fn storage_errors_are_opaque() {
        assert_eq!(
            status_of(CoreError::Corrupt("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}

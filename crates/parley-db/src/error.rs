use thiserror::Error;

/// Failure taxonomy for the session core. Everything here is recoverable:
/// claim and rating conflicts surface to the caller as actionable responses,
/// storage errors degrade to "stale view, retry on next interaction".
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("question already claimed by another helper")]
    AlreadyClaimed,

    #[error("a participant cannot serve their own question")]
    SelfClaim,

    #[error("session is not resolved or was already rated")]
    RatingConflict,

    #[error("rating must be between 1 and 5")]
    InvalidRating,

    #[error("session is not active")]
    NotActive,

    #[error("session is not resolved yet")]
    NotResolved,

    #[error("not found")]
    NotFound,

    #[error("caller is not a participant in this session")]
    NotParticipant,

    #[error("message must carry text or a media reference")]
    InvalidMessage,

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("db lock poisoned")]
    Lock,

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// True for SQLite uniqueness-constraint failures. The claim coordinator
    /// relies on this: a racing claim loses by tripping the partial unique
    /// index, not by any in-process check.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            CoreError::Storage(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

//! Database row types — these map directly to SQLite rows.
//! Distinct from the parley-types API models to keep the DB layer
//! independent; conversion surfaces corrupt rows instead of defaulting.

use chrono::{DateTime, NaiveDateTime, Utc};
use parley_types::models::{AdviceSession, MediaKind, Message, Reaction, SessionStatus};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};

pub struct SessionRow {
    pub id: String,
    pub question_id: String,
    pub seeker_id: String,
    pub helper_id: Option<String>,
    pub status: String,
    pub rating: Option<i64>,
    pub feedback: Option<String>,
    pub created_at: String,
    pub resolved_at: Option<String>,
}

pub struct MessageRow {
    pub id: String,
    pub session_id: String,
    pub sender_id: String,
    pub content: Option<String>,
    pub media_kind: Option<String>,
    pub media_ref: Option<String>,
    pub is_read: bool,
    pub created_at: String,
}

pub struct ReactionRow {
    pub message_id: String,
    pub responder_id: String,
    pub emoji: String,
    pub created_at: String,
}

impl SessionRow {
    pub fn into_model(self) -> CoreResult<AdviceSession> {
        Ok(AdviceSession {
            id: parse_uuid(&self.id)?,
            question_id: parse_uuid(&self.question_id)?,
            seeker_id: parse_uuid(&self.seeker_id)?,
            helper_id: self.helper_id.as_deref().map(parse_uuid).transpose()?,
            status: SessionStatus::parse(&self.status)
                .ok_or_else(|| CoreError::Corrupt(format!("status '{}'", self.status)))?,
            rating: self.rating.map(|r| r as u8),
            feedback: self.feedback,
            created_at: parse_ts(&self.created_at)?,
            resolved_at: self.resolved_at.as_deref().map(parse_ts).transpose()?,
        })
    }
}

impl MessageRow {
    /// Convert with an already-fetched reaction set.
    pub fn into_model(self, reactions: Vec<Reaction>) -> CoreResult<Message> {
        Ok(Message {
            id: parse_uuid(&self.id)?,
            session_id: parse_uuid(&self.session_id)?,
            sender_id: parse_uuid(&self.sender_id)?,
            content: self.content,
            media_kind: self
                .media_kind
                .as_deref()
                .map(|k| {
                    MediaKind::parse(k)
                        .ok_or_else(|| CoreError::Corrupt(format!("media_kind '{k}'")))
                })
                .transpose()?,
            media_ref: self.media_ref,
            is_read: self.is_read,
            created_at: parse_ts(&self.created_at)?,
            reactions,
        })
    }
}

impl ReactionRow {
    pub fn into_model(self) -> CoreResult<Reaction> {
        Ok(Reaction {
            emoji: self.emoji,
            responder_id: parse_uuid(&self.responder_id)?,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

pub fn parse_uuid(s: &str) -> CoreResult<Uuid> {
    s.parse()
        .map_err(|_| CoreError::Corrupt(format!("uuid '{s}'")))
}

/// Timestamps are written as RFC 3339; older rows from SQLite defaults use
/// "YYYY-MM-DD HH:MM:SS" without timezone, parsed as naive UTC.
pub fn parse_ts(s: &str) -> CoreResult<DateTime<Utc>> {
    s.parse::<DateTime<Utc>>()
        .or_else(|_| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .map_err(|_| CoreError::Corrupt(format!("timestamp '{s}'")))
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> CoreResult<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> CoreResult<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of an advice session. Transitions only move forward:
/// `pending -> active` (claim), `active -> resolved` (resolve). Resolved is
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Active,
    Resolved,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Resolved => "resolved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            "resolved" => Some(Self::Resolved),
            _ => None,
        }
    }
}

/// An exclusive two-party conversation between a seeker and a helper about
/// one question. At most one session per question ever leaves `pending`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdviceSession {
    pub id: Uuid,
    pub question_id: Uuid,
    pub seeker_id: Uuid,
    /// Set when a helper claims the question; `None` while pending, unless
    /// the question was targeted at a specific helper at creation time.
    pub helper_id: Option<Uuid>,
    pub status: SessionStatus,
    /// 1..=5, settable once, only after resolution.
    pub rating: Option<u8>,
    pub feedback: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl AdviceSession {
    pub fn is_participant(&self, participant_id: Uuid) -> bool {
        self.seeker_id == participant_id || self.helper_id == Some(participant_id)
    }

    /// The other side of the conversation, if there is one yet.
    pub fn other_participant(&self, participant_id: Uuid) -> Option<Uuid> {
        if participant_id == self.seeker_id {
            self.helper_id
        } else if self.helper_id == Some(participant_id) {
            Some(self.seeker_id)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Audio,
    Image,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Image => "image",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "audio" => Some(Self::Audio),
            "image" => Some(Self::Image),
            _ => None,
        }
    }
}

/// A single reaction row. The (responder_id, emoji) pair is unique per
/// message; toggling the same pair removes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    pub emoji: String,
    pub responder_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A message within a session. Immutable after creation except for
/// `is_read` (flipped by the non-sender) and the reaction set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub session_id: Uuid,
    pub sender_id: Uuid,
    pub content: Option<String>,
    pub media_kind: Option<MediaKind>,
    /// Opaque blob-store reference; the core never touches media bytes.
    pub media_ref: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub reactions: Vec<Reaction>,
}

/// Derived helper reputation. Always recomputed from resolved sessions,
/// never incremented in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelperStats {
    pub helper_id: Uuid,
    pub questions_answered: u64,
    pub average_rating: Option<f64>,
    pub helpful_vote_count: u64,
}

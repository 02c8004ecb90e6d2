use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{AdviceSession, MediaKind, Reaction};

// -- JWT Claims --

/// Claims read from bearer tokens issued by the external identity provider.
/// Canonical definition lives here so parley-api (REST middleware) and
/// parley-gateway (WebSocket Identify) share one shape. The core only ever
/// reads `sub` and `name`; it never issues tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub name: String,
    pub exp: usize,
}

// -- Sessions --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateSessionRequest {
    pub question_id: Uuid,
    /// Ask a specific helper instead of posting to the open pool.
    pub target_helper_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateSessionRequest {
    pub rating: u8,
    pub feedback: Option<String>,
}

/// One row of the caller's session list. `unread_count` is derived per
/// request from the message table, never maintained as a counter.
#[derive(Debug, Serialize)]
pub struct SessionSummary {
    #[serde(flatten)]
    pub session: AdviceSession,
    pub unread_count: u64,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub content: Option<String>,
    pub media_kind: Option<MediaKind>,
    pub media_ref: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub session_id: Uuid,
    pub sender_id: Uuid,
    pub content: Option<String>,
    pub media_kind: Option<MediaKind>,
    pub media_ref: Option<String>,
    pub is_read: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub reactions: Vec<ReactionGroup>,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    /// Ids of the messages this call flipped to read.
    pub message_ids: Vec<Uuid>,
}

// -- Reactions --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToggleReactionRequest {
    pub emoji: String,
}

/// Display grouping: one entry per emoji with the responders behind it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionGroup {
    pub emoji: String,
    pub count: usize,
    pub responder_ids: Vec<Uuid>,
}

/// Group a flat reaction list by emoji, preserving first-seen emoji order.
pub fn group_reactions(reactions: &[Reaction]) -> Vec<ReactionGroup> {
    let mut groups: Vec<ReactionGroup> = Vec::new();
    for r in reactions {
        match groups.iter_mut().find(|g| g.emoji == r.emoji) {
            Some(g) => {
                g.count += 1;
                g.responder_ids.push(r.responder_id);
            }
            None => groups.push(ReactionGroup {
                emoji: r.emoji.clone(),
                count: 1,
                responder_ids: vec![r.responder_id],
            }),
        }
    }
    groups
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{AdviceSession, Message};

/// Events sent over the WebSocket gateway. Delivery is at-least-once and
/// may be reordered relative to other clients; consumers must merge by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { participant_id: Uuid, name: String },

    /// A session changed state (claimed, resolved, or rated)
    SessionUpdate { session: AdviceSession },

    /// A new message was posted to a session
    MessageCreate { message: Message },

    /// A participant marked the other side's messages read in one batch
    MessagesRead {
        session_id: Uuid,
        reader_id: Uuid,
        message_ids: Vec<Uuid>,
    },

    /// A participant started composing
    TypingStart {
        session_id: Uuid,
        participant_id: Uuid,
    },

    /// A participant stopped composing (sent, or went idle)
    TypingStop {
        session_id: Uuid,
        participant_id: Uuid,
    },

    /// A participant came online or went offline
    PresenceUpdate {
        participant_id: Uuid,
        name: String,
        online: bool,
    },

    /// A reaction was added to a message
    ReactionAdd {
        session_id: Uuid,
        message_id: Uuid,
        responder_id: Uuid,
        emoji: String,
        created_at: DateTime<Utc>,
    },

    /// A reaction was removed from a message
    ReactionRemove {
        session_id: Uuid,
        message_id: Uuid,
        responder_id: Uuid,
        emoji: String,
    },
}

impl GatewayEvent {
    /// Returns the session_id if this event is scoped to a specific session.
    /// Events that return `None` are global and delivered to all clients.
    pub fn session_id(&self) -> Option<Uuid> {
        match self {
            Self::SessionUpdate { session } => Some(session.id),
            Self::MessageCreate { message } => Some(message.session_id),
            Self::MessagesRead { session_id, .. } => Some(*session_id),
            Self::TypingStart { session_id, .. } => Some(*session_id),
            Self::TypingStop { session_id, .. } => Some(*session_id),
            Self::ReactionAdd { session_id, .. } => Some(*session_id),
            Self::ReactionRemove { session_id, .. } => Some(*session_id),
            // Ready and PresenceUpdate are global
            _ => None,
        }
    }
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Subscribe to events for specific sessions. The server only forwards
    /// session-scoped events for sessions the client has subscribed to.
    Subscribe { session_ids: Vec<Uuid> },

    /// Indicate composing in a session
    StartTyping { session_id: Uuid },

    /// Indicate composing stopped (explicit idle, e.g. on send)
    StopTyping { session_id: Uuid },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_tagged_by_type() {
        let event = GatewayEvent::TypingStart {
            session_id: Uuid::new_v4(),
            participant_id: Uuid::new_v4(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "TypingStart");
        assert!(json["data"]["session_id"].is_string());
    }

    #[test]
    fn session_scoping() {
        let sid = Uuid::new_v4();
        let scoped = GatewayEvent::MessagesRead {
            session_id: sid,
            reader_id: Uuid::new_v4(),
            message_ids: vec![],
        };
        assert_eq!(scoped.session_id(), Some(sid));

        let global = GatewayEvent::PresenceUpdate {
            participant_id: Uuid::new_v4(),
            name: "ada".into(),
            online: true,
        };
        assert_eq!(global.session_id(), None);
    }
}

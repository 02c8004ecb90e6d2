//! Per-session message timeline.
//!
//! Two write paths feed one list: the local optimistic path (a sent message
//! appears immediately, before any server round trip) and the inbound
//! gateway feed (server-assigned messages, at-least-once, unordered).
//! Reconciliation rules:
//!
//! - an outbound send gets a temporary local id and a `Pending` state;
//! - the server ack replaces the pending entry, matched by send intent
//!   (same session, sender, payload, short time window) — never by position;
//! - feed messages merge by id: known id updates in place, unknown id
//!   inserts, and the list re-sorts by `created_at` (id tiebreak);
//! - unread count is always derived from the entries, never cached.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;
use uuid::Uuid;

use parley_types::events::GatewayEvent;
use parley_types::models::{MediaKind, Message};

use crate::SyncError;

/// How long a server ack (or the sender's own feed echo) may trail the
/// optimistic insert and still be matched to it by intent.
const SEND_MATCH_WINDOW_SECS: i64 = 30;

/// Delivery state of a timeline entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    /// Optimistic local insert, id is a client-side placeholder.
    Pending,
    /// Server-assigned, id is authoritative.
    Committed,
}

#[derive(Debug, Clone)]
pub struct TimelineEntry {
    pub message: Message,
    pub state: DeliveryState,
}

pub struct MessageTimeline {
    session_id: Uuid,
    self_id: Uuid,
    entries: Vec<TimelineEntry>,
}

impl MessageTimeline {
    pub fn new(session_id: Uuid, self_id: Uuid) -> Self {
        Self {
            session_id,
            self_id,
            entries: Vec::new(),
        }
    }

    /// Replace the committed snapshot with a fresh server fetch (screen
    /// re-entry must re-fetch rather than trust cached deltas). Pending
    /// optimistic entries are kept — their acks are still in flight.
    pub fn hydrate(&mut self, messages: Vec<Message>) {
        self.entries.retain(|e| e.state == DeliveryState::Pending);
        for message in messages {
            if message.session_id == self.session_id {
                self.merge_committed(message);
            }
        }
    }

    /// Optimistic insert: the sender's view shows the message immediately.
    /// Returns the temporary local id used to reconcile or roll back.
    pub fn send(
        &mut self,
        content: Option<String>,
        media_kind: Option<MediaKind>,
        media_ref: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Uuid, SyncError> {
        if content.is_none() && media_ref.is_none() {
            return Err(SyncError::EmptyMessage);
        }

        let local_id = Uuid::new_v4();
        self.entries.push(TimelineEntry {
            message: Message {
                id: local_id,
                session_id: self.session_id,
                sender_id: self.self_id,
                content,
                media_kind,
                media_ref,
                is_read: false,
                created_at: now,
                reactions: vec![],
            },
            state: DeliveryState::Pending,
        });
        self.resort();
        Ok(local_id)
    }

    /// The server acknowledged a send: swap the pending entry for the
    /// authoritative message. If the feed echo already delivered the server
    /// copy, the pending entry is simply dropped — either way the list ends
    /// up with exactly one copy.
    pub fn reconcile_ack(&mut self, local_id: Uuid, server: Message) {
        let matched = self
            .entries
            .iter()
            .position(|e| e.state == DeliveryState::Pending && e.message.id == local_id)
            .or_else(|| self.position_by_intent(&server));

        if let Some(idx) = matched {
            self.entries.remove(idx);
        } else {
            debug!("ack for {} had no pending entry to replace", server.id);
        }
        self.merge_committed(server);
    }

    /// A send failed before any ack: drop the optimistic entry and hand the
    /// original text back so the composer can be restored. The only retry
    /// path is the user sending again.
    pub fn rollback_send(&mut self, local_id: Uuid) -> Option<String> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.state == DeliveryState::Pending && e.message.id == local_id)?;
        self.entries.remove(idx).message.content
    }

    /// Apply one inbound gateway event. Idempotent under replay and
    /// commutative under reordering. Returns true if the view changed.
    pub fn apply_event(&mut self, event: &GatewayEvent) -> bool {
        match event {
            GatewayEvent::MessageCreate { message } if message.session_id == self.session_id => {
                self.merge_committed(message.clone())
            }

            GatewayEvent::MessagesRead {
                session_id,
                message_ids,
                ..
            } if *session_id == self.session_id => {
                let mut changed = false;
                for entry in &mut self.entries {
                    if !entry.message.is_read && message_ids.contains(&entry.message.id) {
                        entry.message.is_read = true;
                        changed = true;
                    }
                }
                changed
            }

            GatewayEvent::ReactionAdd {
                session_id,
                message_id,
                responder_id,
                emoji,
                created_at,
            } if *session_id == self.session_id => {
                let Some(entry) = self.entry_mut(*message_id) else {
                    return false;
                };
                let exists = entry
                    .message
                    .reactions
                    .iter()
                    .any(|r| r.responder_id == *responder_id && r.emoji == *emoji);
                if exists {
                    return false;
                }
                entry.message.reactions.push(parley_types::models::Reaction {
                    emoji: emoji.clone(),
                    responder_id: *responder_id,
                    created_at: *created_at,
                });
                true
            }

            GatewayEvent::ReactionRemove {
                session_id,
                message_id,
                responder_id,
                emoji,
            } if *session_id == self.session_id => {
                let Some(entry) = self.entry_mut(*message_id) else {
                    return false;
                };
                let before = entry.message.reactions.len();
                entry
                    .message
                    .reactions
                    .retain(|r| !(r.responder_id == *responder_id && r.emoji == *emoji));
                entry.message.reactions.len() != before
            }

            _ => false,
        }
    }

    /// Derived unread count: other-sender messages not yet read. There is no
    /// stored counter to drift out of sync.
    pub fn unread_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.message.sender_id != self.self_id && !e.message.is_read)
            .count()
    }

    /// Local mirror of the batch mark-read call: flips every other-sender
    /// unread message and returns their ids (the set the server call covers).
    pub fn mark_all_read(&mut self) -> Vec<Uuid> {
        let mut flipped = Vec::new();
        for entry in &mut self.entries {
            if entry.message.sender_id != self.self_id && !entry.message.is_read {
                entry.message.is_read = true;
                flipped.push(entry.message.id);
            }
        }
        flipped
    }

    /// Messages in display order (oldest first).
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().map(|e| &e.message)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    /// Merge a server-assigned message by id. Known id: update in place
    /// (read-state is monotonic, a true never reverts to false). Unknown id:
    /// absorb a matching pending entry if the sender's own echo beat the
    /// ack, otherwise insert.
    fn merge_committed(&mut self, server: Message) -> bool {
        if let Some(entry) = self.entry_mut(server.id) {
            let changed = server.is_read && !entry.message.is_read;
            entry.message.is_read |= server.is_read;
            return changed;
        }

        if server.sender_id == self.self_id {
            if let Some(idx) = self.position_by_intent(&server) {
                self.entries.remove(idx);
            }
        }

        self.entries.push(TimelineEntry {
            message: server,
            state: DeliveryState::Committed,
        });
        self.resort();
        true
    }

    /// Match a pending entry by send intent: same session and sender, same
    /// payload, created within the send window. Never by list position.
    fn position_by_intent(&self, server: &Message) -> Option<usize> {
        let window = Duration::seconds(SEND_MATCH_WINDOW_SECS);
        self.entries.iter().position(|e| {
            e.state == DeliveryState::Pending
                && e.message.sender_id == server.sender_id
                && e.message.content == server.content
                && e.message.media_ref == server.media_ref
                && (server.created_at - e.message.created_at).abs() <= window
        })
    }

    fn entry_mut(&mut self, message_id: Uuid) -> Option<&mut TimelineEntry> {
        self.entries.iter_mut().find(|e| e.message.id == message_id)
    }

    fn resort(&mut self) {
        self.entries
            .sort_by(|a, b| {
                a.message
                    .created_at
                    .cmp(&b.message.created_at)
                    .then(a.message.id.cmp(&b.message.id))
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn server_msg(session: Uuid, sender: Uuid, content: &str, at: DateTime<Utc>) -> Message {
        Message {
            id: Uuid::new_v4(),
            session_id: session,
            sender_id: sender,
            content: Some(content.to_string()),
            media_kind: None,
            media_ref: None,
            is_read: false,
            created_at: at,
            reactions: vec![],
        }
    }

    #[test]
    fn optimistic_send_is_visible_immediately() {
        let session = Uuid::new_v4();
        let me = Uuid::new_v4();
        let mut tl = MessageTimeline::new(session, me);

        let local = tl.send(Some("hi".into()), None, None, ts(0)).unwrap();
        assert_eq!(tl.len(), 1);
        assert_eq!(tl.entries()[0].state, DeliveryState::Pending);
        assert_eq!(tl.entries()[0].message.id, local);
    }

    #[test]
    fn ack_replaces_pending_leaving_one_copy() {
        let session = Uuid::new_v4();
        let me = Uuid::new_v4();
        let mut tl = MessageTimeline::new(session, me);

        let local = tl.send(Some("hi".into()), None, None, ts(0)).unwrap();
        let server = server_msg(session, me, "hi", ts(1));
        let server_id = server.id;

        tl.reconcile_ack(local, server);
        assert_eq!(tl.len(), 1);
        assert_eq!(tl.entries()[0].state, DeliveryState::Committed);
        assert_eq!(tl.entries()[0].message.id, server_id);
    }

    #[test]
    fn feed_echo_before_ack_still_one_copy() {
        let session = Uuid::new_v4();
        let me = Uuid::new_v4();
        let mut tl = MessageTimeline::new(session, me);

        let local = tl.send(Some("hi".into()), None, None, ts(0)).unwrap();
        let server = server_msg(session, me, "hi", ts(1));

        // The gateway echoes our own message before the HTTP ack returns.
        tl.apply_event(&GatewayEvent::MessageCreate {
            message: server.clone(),
        });
        assert_eq!(tl.len(), 1);

        // The late ack is then a no-op merge, not a second copy.
        tl.reconcile_ack(local, server);
        assert_eq!(tl.len(), 1);
    }

    #[test]
    fn duplicate_feed_delivery_merges_by_id() {
        let session = Uuid::new_v4();
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut tl = MessageTimeline::new(session, me);

        let msg = server_msg(session, other, "take a look", ts(0));
        let event = GatewayEvent::MessageCreate { message: msg };

        assert!(tl.apply_event(&event));
        assert!(!tl.apply_event(&event));
        assert_eq!(tl.len(), 1);
    }

    #[test]
    fn out_of_order_events_converge_to_created_at_order() {
        let session = Uuid::new_v4();
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();

        let a = server_msg(session, other, "first", ts(0));
        let b = server_msg(session, me, "second", ts(5));
        let c = server_msg(session, other, "third", ts(10));

        // Apply in two different orders; both timelines must agree.
        let mut forward = MessageTimeline::new(session, me);
        for m in [&a, &b, &c] {
            forward.apply_event(&GatewayEvent::MessageCreate { message: m.clone() });
        }

        let mut shuffled = MessageTimeline::new(session, me);
        for m in [&c, &a, &b, &a, &c] {
            shuffled.apply_event(&GatewayEvent::MessageCreate { message: m.clone() });
        }

        let order: Vec<_> = forward.messages().map(|m| m.id).collect();
        let order2: Vec<_> = shuffled.messages().map(|m| m.id).collect();
        assert_eq!(order, order2);
        assert_eq!(order, vec![a.id, b.id, c.id]);
    }

    #[test]
    fn rollback_restores_composer_text() {
        let session = Uuid::new_v4();
        let me = Uuid::new_v4();
        let mut tl = MessageTimeline::new(session, me);

        let local = tl.send(Some("long careful answer".into()), None, None, ts(0)).unwrap();
        let restored = tl.rollback_send(local);
        assert_eq!(restored.as_deref(), Some("long careful answer"));
        assert!(tl.is_empty());

        // Rolling back twice finds nothing.
        assert_eq!(tl.rollback_send(local), None);
    }

    #[test]
    fn unread_is_derived_and_read_events_are_monotonic() {
        let session = Uuid::new_v4();
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut tl = MessageTimeline::new(session, me);

        let m1 = server_msg(session, other, "one", ts(0));
        let m2 = server_msg(session, other, "two", ts(1));
        let mine = server_msg(session, me, "mine", ts(2));
        for m in [&m1, &m2, &mine] {
            tl.apply_event(&GatewayEvent::MessageCreate { message: m.clone() });
        }
        assert_eq!(tl.unread_count(), 2);

        let flipped = tl.mark_all_read();
        assert_eq!(flipped.len(), 2);
        assert_eq!(tl.unread_count(), 0);

        // Replay of the read event changes nothing.
        let read_event = GatewayEvent::MessagesRead {
            session_id: session,
            reader_id: me,
            message_ids: flipped,
        };
        assert!(!tl.apply_event(&read_event));
        assert_eq!(tl.unread_count(), 0);
    }

    #[test]
    fn reaction_events_toggle_idempotently() {
        let session = Uuid::new_v4();
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut tl = MessageTimeline::new(session, me);

        let msg = server_msg(session, other, "helpful", ts(0));
        let mid = msg.id;
        tl.apply_event(&GatewayEvent::MessageCreate { message: msg });

        let add = GatewayEvent::ReactionAdd {
            session_id: session,
            message_id: mid,
            responder_id: me,
            emoji: "👍".into(),
            created_at: ts(1),
        };
        assert!(tl.apply_event(&add));
        // At-least-once delivery: the duplicate is absorbed.
        assert!(!tl.apply_event(&add));
        assert_eq!(tl.messages().next().unwrap().reactions.len(), 1);

        let remove = GatewayEvent::ReactionRemove {
            session_id: session,
            message_id: mid,
            responder_id: me,
            emoji: "👍".into(),
        };
        assert!(tl.apply_event(&remove));
        assert!(!tl.apply_event(&remove));
        assert!(tl.messages().next().unwrap().reactions.is_empty());
    }

    #[test]
    fn events_for_other_sessions_are_ignored() {
        let session = Uuid::new_v4();
        let me = Uuid::new_v4();
        let mut tl = MessageTimeline::new(session, me);

        let foreign = server_msg(Uuid::new_v4(), Uuid::new_v4(), "elsewhere", ts(0));
        assert!(!tl.apply_event(&GatewayEvent::MessageCreate { message: foreign }));
        assert!(tl.is_empty());
    }

    #[test]
    fn hydrate_refreshes_committed_but_keeps_pending() {
        let session = Uuid::new_v4();
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut tl = MessageTimeline::new(session, me);

        let stale = server_msg(session, other, "stale", ts(0));
        tl.apply_event(&GatewayEvent::MessageCreate { message: stale });
        let local = tl.send(Some("in flight".into()), None, None, ts(5)).unwrap();

        // Re-entry fetch returns the authoritative list.
        let fresh = vec![
            server_msg(session, other, "fresh one", ts(1)),
            server_msg(session, other, "fresh two", ts(2)),
        ];
        tl.hydrate(fresh);

        assert_eq!(tl.len(), 3);
        assert!(tl
            .entries()
            .iter()
            .any(|e| e.state == DeliveryState::Pending && e.message.id == local));
        assert!(tl.messages().all(|m| m.content.as_deref() != Some("stale")));
    }

    #[test]
    fn empty_send_is_rejected() {
        let mut tl = MessageTimeline::new(Uuid::new_v4(), Uuid::new_v4());
        let err = tl.send(None, None, None, ts(0)).unwrap_err();
        assert!(matches!(err, SyncError::EmptyMessage));
    }
}

//! Message and reaction queries.
//!
//! Reactions are one row per (message, responder, emoji) with a uniqueness
//! constraint, so toggling is an atomic insert-or-delete on the server —
//! never a read-whole-list/write-whole-list cycle that could drop a
//! concurrent responder's reaction.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use parley_types::models::{MediaKind, Message, Reaction};

use crate::error::{CoreError, CoreResult};
use crate::models::{MessageRow, OptionalExt, ReactionRow};
use crate::Database;

impl Database {
    /// Insert a server-assigned message. The returned value is the
    /// authoritative copy the sender reconciles its optimistic entry against.
    pub fn insert_message(
        &self,
        session_id: Uuid,
        sender_id: Uuid,
        content: Option<&str>,
        media_kind: Option<MediaKind>,
        media_ref: Option<&str>,
    ) -> CoreResult<Message> {
        if content.is_none() && media_ref.is_none() {
            return Err(CoreError::InvalidMessage);
        }
        if media_kind.is_some() != media_ref.is_some() {
            return Err(CoreError::InvalidMessage);
        }

        let id = Uuid::new_v4();
        let now = Utc::now();

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, session_id, sender_id, content, media_kind, media_ref, is_read, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
                rusqlite::params![
                    id.to_string(),
                    session_id.to_string(),
                    sender_id.to_string(),
                    content,
                    media_kind.map(|k| k.as_str()),
                    media_ref,
                    now.to_rfc3339(),
                ],
            )?;
            Ok(())
        })?;

        Ok(Message {
            id,
            session_id,
            sender_id,
            content: content.map(str::to_string),
            media_kind,
            media_ref: media_ref.map(str::to_string),
            is_read: false,
            created_at: now,
            reactions: vec![],
        })
    }

    /// Fetch messages newest-first with cursor pagination — pass the
    /// `created_at` of the oldest message from the previous page as `before`.
    /// Reactions are batch-fetched in a second query, never N+1.
    pub fn get_messages(
        &self,
        session_id: Uuid,
        limit: u32,
        before: Option<&str>,
    ) -> CoreResult<Vec<Message>> {
        self.with_conn(|conn| {
            let rows = query_messages(conn, session_id, limit, before)?;

            let message_ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
            let reaction_rows = query_reactions_for_messages(conn, &message_ids)?;

            let mut by_message: HashMap<String, Vec<Reaction>> = HashMap::new();
            for r in reaction_rows {
                let message_id = r.message_id.clone();
                by_message.entry(message_id).or_default().push(r.into_model()?);
            }

            rows.into_iter()
                .map(|row| {
                    let reactions = by_message.remove(&row.id).unwrap_or_default();
                    row.into_model(reactions)
                })
                .collect()
        })
    }

    /// Batch read-state update: flips every unread message in the session
    /// authored by someone other than `reader_id`. Returns the flipped ids so
    /// the gateway can tell the sender which messages were seen.
    pub fn mark_messages_read(&self, session_id: Uuid, reader_id: Uuid) -> CoreResult<Vec<Uuid>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let sid = session_id.to_string();
            let rid = reader_id.to_string();

            let ids: Vec<String> = {
                let mut stmt = tx.prepare(
                    "SELECT id FROM messages
                     WHERE session_id = ?1 AND sender_id != ?2 AND is_read = 0
                     ORDER BY created_at",
                )?;
                stmt.query_map([&sid, &rid], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            };

            if !ids.is_empty() {
                tx.execute(
                    "UPDATE messages SET is_read = 1
                     WHERE session_id = ?1 AND sender_id != ?2 AND is_read = 0",
                    [&sid, &rid],
                )?;
            }
            tx.commit()?;

            ids.iter().map(|id| crate::models::parse_uuid(id)).collect()
        })
    }

    /// Unread count for one session, derived from current rows.
    pub fn unread_count(&self, session_id: Uuid, participant_id: Uuid) -> CoreResult<u64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM messages
                 WHERE session_id = ?1 AND sender_id != ?2 AND is_read = 0",
                [session_id.to_string(), participant_id.to_string()],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    /// Toggle a reaction: removes if the (responder, emoji) pair exists on
    /// the message, inserts if not. Returns (added, created_at of the
    /// inserted row when added).
    pub fn toggle_reaction(
        &self,
        message_id: Uuid,
        responder_id: Uuid,
        emoji: &str,
    ) -> CoreResult<(bool, Option<DateTime<Utc>>)> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mid = message_id.to_string();
            let rid = responder_id.to_string();

            let existing: Option<String> = tx
                .query_row(
                    "SELECT id FROM reactions
                     WHERE message_id = ?1 AND responder_id = ?2 AND emoji = ?3",
                    rusqlite::params![mid, rid, emoji],
                    |row| row.get(0),
                )
                .optional()?;

            let result = if let Some(existing_id) = existing {
                tx.execute("DELETE FROM reactions WHERE id = ?1", [&existing_id])?;
                (false, None)
            } else {
                let now = Utc::now();
                tx.execute(
                    "INSERT INTO reactions (id, message_id, responder_id, emoji, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    rusqlite::params![
                        Uuid::new_v4().to_string(),
                        mid,
                        rid,
                        emoji,
                        now.to_rfc3339()
                    ],
                )?;
                (true, Some(now))
            };

            tx.commit()?;
            Ok(result)
        })
    }

    /// The session a message belongs to, for scoping reaction events.
    pub fn message_session(&self, message_id: Uuid) -> CoreResult<Uuid> {
        self.with_conn(|conn| {
            let sid: Option<String> = conn
                .query_row(
                    "SELECT session_id FROM messages WHERE id = ?1",
                    [message_id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            crate::models::parse_uuid(&sid.ok_or(CoreError::NotFound)?)
        })
    }
}

fn query_messages(
    conn: &Connection,
    session_id: Uuid,
    limit: u32,
    before: Option<&str>,
) -> CoreResult<Vec<MessageRow>> {
    let sid = session_id.to_string();
    let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<MessageRow> {
        Ok(MessageRow {
            id: row.get(0)?,
            session_id: row.get(1)?,
            sender_id: row.get(2)?,
            content: row.get(3)?,
            media_kind: row.get(4)?,
            media_ref: row.get(5)?,
            is_read: row.get(6)?,
            created_at: row.get(7)?,
        })
    };

    let rows = match before {
        Some(before) => {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, sender_id, content, media_kind, media_ref, is_read, created_at
                 FROM messages
                 WHERE session_id = ?1 AND created_at < ?2
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?3",
            )?;
            stmt.query_map(rusqlite::params![sid, before, limit], map_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
        None => {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, sender_id, content, media_kind, media_ref, is_read, created_at
                 FROM messages
                 WHERE session_id = ?1
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?2",
            )?;
            stmt.query_map(rusqlite::params![sid, limit], map_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    Ok(rows)
}

fn query_reactions_for_messages(
    conn: &Connection,
    message_ids: &[String],
) -> CoreResult<Vec<ReactionRow>> {
    if message_ids.is_empty() {
        return Ok(vec![]);
    }

    let placeholders: Vec<String> = (1..=message_ids.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "SELECT message_id, responder_id, emoji, created_at
         FROM reactions WHERE message_id IN ({})
         ORDER BY created_at",
        placeholders.join(", ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let params: Vec<&dyn rusqlite::types::ToSql> = message_ids
        .iter()
        .map(|id| id as &dyn rusqlite::types::ToSql)
        .collect();

    let rows = stmt
        .query_map(params.as_slice(), |row| {
            Ok(ReactionRow {
                message_id: row.get(0)?,
                responder_id: row.get(1)?,
                emoji: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

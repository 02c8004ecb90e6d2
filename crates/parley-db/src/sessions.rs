//! Session Store and Claim Coordinator queries.
//!
//! The claim path is the one place that needs a strict atomic
//! compare-and-set: it is a single conditional UPDATE inside a transaction,
//! backed by the partial unique index on (question_id) for non-pending rows.
//! Concurrent claimants observe either "you won" or `AlreadyClaimed`,
//! never a partial state.

use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use parley_types::models::{AdviceSession, SessionStatus};

use crate::error::{CoreError, CoreResult};
use crate::models::{OptionalExt, SessionRow, parse_uuid};
use crate::Database;

impl Database {
    /// Create a session in `pending` for a posted question, optionally
    /// targeted at a specific helper.
    pub fn create_session(
        &self,
        question_id: Uuid,
        seeker_id: Uuid,
        target_helper_id: Option<Uuid>,
    ) -> CoreResult<AdviceSession> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO advice_sessions (id, question_id, seeker_id, helper_id, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, 'pending', ?5)",
                rusqlite::params![
                    id.to_string(),
                    question_id.to_string(),
                    seeker_id.to_string(),
                    target_helper_id.map(|h| h.to_string()),
                    now.to_rfc3339(),
                ],
            )?;
            Ok(())
        })?;

        Ok(AdviceSession {
            id,
            question_id,
            seeker_id,
            helper_id: target_helper_id,
            status: SessionStatus::Pending,
            rating: None,
            feedback: None,
            created_at: now,
            resolved_at: None,
        })
    }

    pub fn get_session(&self, session_id: Uuid) -> CoreResult<AdviceSession> {
        self.with_conn(|conn| {
            query_session(conn, session_id)?
                .ok_or(CoreError::NotFound)?
                .into_model()
        })
    }

    /// Claim a question for a helper: flips exactly one pending session to
    /// `active` with a single conditional write. Errors:
    /// - `SelfClaim` if the helper posted the question (checked before the
    ///   atomic step so the exclusivity slot is not wasted);
    /// - `AlreadyClaimed` if another helper won, whether we observe that as
    ///   zero updated rows or as a partial-unique-index violation;
    /// - `NotFound` if no session exists for the question.
    pub fn claim_question(&self, question_id: Uuid, helper_id: Uuid) -> CoreResult<AdviceSession> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let seeker: Option<String> = tx
                .query_row(
                    "SELECT seeker_id FROM advice_sessions WHERE question_id = ?1 LIMIT 1",
                    [question_id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            let seeker = seeker.ok_or(CoreError::NotFound)?;
            if parse_uuid(&seeker)? == helper_id {
                return Err(CoreError::SelfClaim);
            }

            let updated = tx
                .execute(
                    "UPDATE advice_sessions
                     SET status = 'active', helper_id = ?2
                     WHERE id = (SELECT id FROM advice_sessions
                                 WHERE question_id = ?1 AND status = 'pending'
                                 ORDER BY created_at LIMIT 1)",
                    rusqlite::params![question_id.to_string(), helper_id.to_string()],
                )
                .map_err(|e| {
                    let e = CoreError::from(e);
                    if e.is_constraint_violation() {
                        CoreError::AlreadyClaimed
                    } else {
                        e
                    }
                })?;

            if updated == 0 {
                // Sessions exist for this question but none is pending.
                return Err(CoreError::AlreadyClaimed);
            }

            let session = query_claimed_session(&tx, question_id)?;
            tx.commit()?;
            Ok(session)
        })
    }

    /// Resolve an active session. Either participant may resolve; calling it
    /// on an already-resolved session is a no-op returning the session, so
    /// retried network calls are harmless.
    pub fn resolve_session(&self, session_id: Uuid, actor_id: Uuid) -> CoreResult<AdviceSession> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let session = query_session(&tx, session_id)?
                .ok_or(CoreError::NotFound)?
                .into_model()?;
            if !session.is_participant(actor_id) {
                return Err(CoreError::NotParticipant);
            }

            match session.status {
                SessionStatus::Resolved => Ok(session),
                SessionStatus::Pending => Err(CoreError::NotActive),
                SessionStatus::Active => {
                    let resolved_at = Utc::now();
                    tx.execute(
                        "UPDATE advice_sessions
                         SET status = 'resolved', resolved_at = ?2
                         WHERE id = ?1 AND status = 'active'",
                        rusqlite::params![session_id.to_string(), resolved_at.to_rfc3339()],
                    )?;
                    let session = query_session(&tx, session_id)?
                        .ok_or(CoreError::NotFound)?
                        .into_model()?;
                    tx.commit()?;
                    Ok(session)
                }
            }
        })
    }

    /// Record the seeker's rating. One authoritative write path: a single
    /// conditional UPDATE guarded on `status = 'resolved' AND rating IS
    /// NULL`; anything else is a `RatingConflict`.
    pub fn rate_session(
        &self,
        session_id: Uuid,
        rater_id: Uuid,
        rating: u8,
        feedback: Option<&str>,
    ) -> CoreResult<AdviceSession> {
        if !(1..=5).contains(&rating) {
            return Err(CoreError::InvalidRating);
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let session = query_session(&tx, session_id)?
                .ok_or(CoreError::NotFound)?
                .into_model()?;
            if session.seeker_id != rater_id {
                return Err(CoreError::NotParticipant);
            }

            let updated = tx.execute(
                "UPDATE advice_sessions
                 SET rating = ?2, feedback = ?3
                 WHERE id = ?1 AND status = 'resolved' AND rating IS NULL",
                rusqlite::params![session_id.to_string(), rating, feedback],
            )?;
            if updated == 0 {
                return Err(CoreError::RatingConflict);
            }

            let session = query_session(&tx, session_id)?
                .ok_or(CoreError::NotFound)?
                .into_model()?;
            tx.commit()?;
            Ok(session)
        })
    }

    /// All sessions the participant is part of, newest first, each with its
    /// unread count derived from the message table on the spot.
    pub fn list_sessions_for(&self, participant_id: Uuid) -> CoreResult<Vec<(AdviceSession, u64)>> {
        self.with_conn(|conn| {
            let pid = participant_id.to_string();
            let mut stmt = conn.prepare(
                "SELECT s.id, s.question_id, s.seeker_id, s.helper_id, s.status,
                        s.rating, s.feedback, s.created_at, s.resolved_at,
                        (SELECT COUNT(*) FROM messages m
                         WHERE m.session_id = s.id
                           AND m.sender_id != ?1
                           AND m.is_read = 0) AS unread
                 FROM advice_sessions s
                 WHERE s.seeker_id = ?1 OR s.helper_id = ?1
                 ORDER BY s.created_at DESC",
            )?;

            let rows = stmt
                .query_map([&pid], |row| {
                    Ok((session_row(row)?, row.get::<_, u64>(9)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(row, unread)| Ok((row.into_model()?, unread)))
                .collect()
        })
    }
}

fn session_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRow> {
    Ok(SessionRow {
        id: row.get(0)?,
        question_id: row.get(1)?,
        seeker_id: row.get(2)?,
        helper_id: row.get(3)?,
        status: row.get(4)?,
        rating: row.get(5)?,
        feedback: row.get(6)?,
        created_at: row.get(7)?,
        resolved_at: row.get(8)?,
    })
}

const SESSION_COLUMNS: &str =
    "id, question_id, seeker_id, helper_id, status, rating, feedback, created_at, resolved_at";

fn query_session(conn: &Connection, session_id: Uuid) -> CoreResult<Option<SessionRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SESSION_COLUMNS} FROM advice_sessions WHERE id = ?1"
    ))?;
    stmt.query_row([session_id.to_string()], session_row).optional()
}

/// The one session for this question that has left `pending`. The partial
/// unique index guarantees at most one such row.
fn query_claimed_session(conn: &Connection, question_id: Uuid) -> CoreResult<AdviceSession> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SESSION_COLUMNS} FROM advice_sessions
         WHERE question_id = ?1 AND status != 'pending'"
    ))?;
    stmt.query_row([question_id.to_string()], session_row)
        .optional()?
        .ok_or(CoreError::NotFound)?
        .into_model()
}

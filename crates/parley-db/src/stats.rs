//! Helper reputation recomputation.
//!
//! `recompute_stats` is a pure function of the resolved-session rows: it
//! re-counts, re-averages and re-sums every time, then replaces the stored
//! row wholesale. Running it twice with unchanged input yields the same
//! output, which is what lets it double as a repair pass after a lost write.

use chrono::Utc;
use uuid::Uuid;

use parley_types::models::HelperStats;

use crate::error::{CoreError, CoreResult};
use crate::models::OptionalExt;
use crate::Database;

impl Database {
    /// Derive and persist a helper's stats from their resolved sessions.
    pub fn recompute_stats(&self, helper_id: Uuid) -> CoreResult<HelperStats> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let hid = helper_id.to_string();

            let (questions_answered, average_rating): (u64, Option<f64>) = tx.query_row(
                "SELECT COUNT(*), AVG(rating)
                 FROM advice_sessions
                 WHERE helper_id = ?1 AND status = 'resolved'",
                [&hid],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            // Helpful votes are re-summed through the helper's resolved
            // sessions, not incremented alongside them.
            let helpful_vote_count: u64 = tx.query_row(
                "SELECT COUNT(*)
                 FROM helpful_votes v
                 JOIN advice_sessions s ON s.id = v.session_id
                 WHERE s.helper_id = ?1 AND s.status = 'resolved'",
                [&hid],
                |row| row.get(0),
            )?;

            tx.execute(
                "INSERT OR REPLACE INTO helper_stats
                 (helper_id, questions_answered, average_rating, helpful_vote_count, recomputed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    hid,
                    questions_answered,
                    average_rating,
                    helpful_vote_count,
                    Utc::now().to_rfc3339(),
                ],
            )?;
            tx.commit()?;

            Ok(HelperStats {
                helper_id,
                questions_answered,
                average_rating,
                helpful_vote_count,
            })
        })
    }

    /// Stored stats row from the last recomputation, if any.
    pub fn get_stats(&self, helper_id: Uuid) -> CoreResult<Option<HelperStats>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT questions_answered, average_rating, helpful_vote_count
                 FROM helper_stats WHERE helper_id = ?1",
                [helper_id.to_string()],
                |row| {
                    Ok(HelperStats {
                        helper_id,
                        questions_answered: row.get(0)?,
                        average_rating: row.get(1)?,
                        helpful_vote_count: row.get(2)?,
                    })
                },
            )
            .optional()
        })
    }

    /// Record a helpful vote on a resolved session. Idempotent per voter per
    /// session; votes on sessions that have not resolved are rejected so the
    /// count never carries invisible entries waiting on resolution.
    pub fn record_helpful_vote(&self, session_id: Uuid, voter_id: Uuid) -> CoreResult<()> {
        self.with_conn(|conn| {
            let status: Option<String> = conn
                .query_row(
                    "SELECT status FROM advice_sessions WHERE id = ?1",
                    [session_id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            match status.as_deref() {
                None => return Err(CoreError::NotFound),
                Some("resolved") => {}
                Some(_) => return Err(CoreError::NotResolved),
            }
            conn.execute(
                "INSERT OR IGNORE INTO helpful_votes (session_id, voter_id, created_at)
                 VALUES (?1, ?2, ?3)",
                rusqlite::params![
                    session_id.to_string(),
                    voter_id.to_string(),
                    Utc::now().to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }
}

use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS advice_sessions (
            id          TEXT PRIMARY KEY,
            question_id TEXT NOT NULL,
            seeker_id   TEXT NOT NULL,
            helper_id   TEXT,
            status      TEXT NOT NULL DEFAULT 'pending'
                        CHECK (status IN ('pending', 'active', 'resolved')),
            rating      INTEGER CHECK (rating BETWEEN 1 AND 5),
            feedback    TEXT,
            created_at  TEXT NOT NULL,
            resolved_at TEXT
        );

        -- Exclusivity of claim: at most one session per question ever leaves
        -- 'pending'. Racing claims lose against this index inside the store's
        -- transaction, never against an in-process check.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_claimed_question
            ON advice_sessions(question_id) WHERE status != 'pending';

        CREATE INDEX IF NOT EXISTS idx_sessions_seeker
            ON advice_sessions(seeker_id);
        CREATE INDEX IF NOT EXISTS idx_sessions_helper
            ON advice_sessions(helper_id, status);

        CREATE TABLE IF NOT EXISTS messages (
            id          TEXT PRIMARY KEY,
            session_id  TEXT NOT NULL REFERENCES advice_sessions(id),
            sender_id   TEXT NOT NULL,
            content     TEXT,
            media_kind  TEXT CHECK (media_kind IN ('audio', 'image')),
            media_ref   TEXT,
            is_read     INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL,
            CHECK ((media_kind IS NULL) = (media_ref IS NULL)),
            CHECK (content IS NOT NULL OR media_ref IS NOT NULL)
        );

        CREATE INDEX IF NOT EXISTS idx_messages_session
            ON messages(session_id, created_at);

        CREATE TABLE IF NOT EXISTS reactions (
            id           TEXT PRIMARY KEY,
            message_id   TEXT NOT NULL REFERENCES messages(id),
            responder_id TEXT NOT NULL,
            emoji        TEXT NOT NULL,
            created_at   TEXT NOT NULL,
            UNIQUE(message_id, responder_id, emoji)
        );

        CREATE INDEX IF NOT EXISTS idx_reactions_message
            ON reactions(message_id);

        CREATE TABLE IF NOT EXISTS helpful_votes (
            session_id  TEXT NOT NULL REFERENCES advice_sessions(id),
            voter_id    TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            UNIQUE(session_id, voter_id)
        );

        CREATE TABLE IF NOT EXISTS helper_stats (
            helper_id           TEXT PRIMARY KEY,
            questions_answered  INTEGER NOT NULL,
            average_rating      REAL,
            helpful_vote_count  INTEGER NOT NULL,
            recomputed_at       TEXT NOT NULL
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}

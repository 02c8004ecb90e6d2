//! Store-level tests for the session lifecycle, claim exclusivity,
//! read-state, reactions and stats recomputation.

use std::sync::{Arc, Barrier};

use parley_db::{CoreError, Database};
use parley_types::models::{MediaKind, SessionStatus};
use uuid::Uuid;

fn db() -> Database {
    Database::open_in_memory().unwrap()
}

#[test]
fn create_starts_pending() {
    let db = db();
    let seeker = Uuid::new_v4();
    let question = Uuid::new_v4();

    let session = db.create_session(question, seeker, None).unwrap();
    assert_eq!(session.status, SessionStatus::Pending);
    assert_eq!(session.helper_id, None);
    assert_eq!(session.seeker_id, seeker);

    let fetched = db.get_session(session.id).unwrap();
    assert_eq!(fetched.id, session.id);
    assert_eq!(fetched.status, SessionStatus::Pending);
}

#[test]
fn claim_activates_exactly_one_session() {
    let db = db();
    let seeker = Uuid::new_v4();
    let helper = Uuid::new_v4();
    let question = Uuid::new_v4();
    db.create_session(question, seeker, None).unwrap();

    let session = db.claim_question(question, helper).unwrap();
    assert_eq!(session.status, SessionStatus::Active);
    assert_eq!(session.helper_id, Some(helper));

    // A second helper arriving late gets a clean AlreadyClaimed.
    let other = Uuid::new_v4();
    let err = db.claim_question(question, other).unwrap_err();
    assert!(matches!(err, CoreError::AlreadyClaimed));
}

#[test]
fn concurrent_claims_have_one_winner() {
    let db = Arc::new(db());
    let seeker = Uuid::new_v4();
    let question = Uuid::new_v4();
    db.create_session(question, seeker, None).unwrap();

    let helpers = 8;
    let barrier = Arc::new(Barrier::new(helpers));
    let handles: Vec<_> = (0..helpers)
        .map(|_| {
            let db = db.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                barrier.wait();
                db.claim_question(question, Uuid::new_v4())
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners = results.iter().filter(|r| r.is_ok()).count();
    let losers = results
        .iter()
        .filter(|r| matches!(r, Err(CoreError::AlreadyClaimed)))
        .count();

    assert_eq!(winners, 1);
    assert_eq!(losers, helpers - 1);
}

#[test]
fn self_claim_is_rejected() {
    let db = db();
    let seeker = Uuid::new_v4();
    let question = Uuid::new_v4();
    db.create_session(question, seeker, None).unwrap();

    let err = db.claim_question(question, seeker).unwrap_err();
    assert!(matches!(err, CoreError::SelfClaim));

    // The exclusivity slot was not burned: a real helper can still claim.
    let helper = Uuid::new_v4();
    assert!(db.claim_question(question, helper).is_ok());
}

#[test]
fn claim_of_unknown_question_is_not_found() {
    let db = db();
    let err = db.claim_question(Uuid::new_v4(), Uuid::new_v4()).unwrap_err();
    assert!(matches!(err, CoreError::NotFound));
}

#[test]
fn resolve_is_idempotent() {
    let db = db();
    let seeker = Uuid::new_v4();
    let helper = Uuid::new_v4();
    let question = Uuid::new_v4();
    db.create_session(question, seeker, None).unwrap();
    let session = db.claim_question(question, helper).unwrap();

    let first = db.resolve_session(session.id, helper).unwrap();
    assert_eq!(first.status, SessionStatus::Resolved);
    let resolved_at = first.resolved_at.unwrap();

    // Retried network call: no-op, same session back, resolved_at untouched.
    let second = db.resolve_session(session.id, seeker).unwrap();
    assert_eq!(second.status, SessionStatus::Resolved);
    assert_eq!(second.resolved_at.unwrap(), resolved_at);
}

#[test]
fn resolve_guards() {
    let db = db();
    let seeker = Uuid::new_v4();
    let question = Uuid::new_v4();
    let session = db.create_session(question, seeker, None).unwrap();

    // Pending sessions cannot be resolved.
    let err = db.resolve_session(session.id, seeker).unwrap_err();
    assert!(matches!(err, CoreError::NotActive));

    let helper = Uuid::new_v4();
    let session = db.claim_question(question, helper).unwrap();

    // Outsiders cannot resolve.
    let err = db.resolve_session(session.id, Uuid::new_v4()).unwrap_err();
    assert!(matches!(err, CoreError::NotParticipant));
}

#[test]
fn rating_is_write_once_after_resolution() {
    let db = db();
    let seeker = Uuid::new_v4();
    let helper = Uuid::new_v4();
    let question = Uuid::new_v4();
    db.create_session(question, seeker, None).unwrap();
    let session = db.claim_question(question, helper).unwrap();

    // Not resolved yet.
    let err = db.rate_session(session.id, seeker, 5, None).unwrap_err();
    assert!(matches!(err, CoreError::RatingConflict));

    db.resolve_session(session.id, helper).unwrap();

    // Only the seeker rates.
    let err = db.rate_session(session.id, helper, 5, None).unwrap_err();
    assert!(matches!(err, CoreError::NotParticipant));

    let rated = db
        .rate_session(session.id, seeker, 4, Some("clear and kind"))
        .unwrap();
    assert_eq!(rated.rating, Some(4));
    assert_eq!(rated.feedback.as_deref(), Some("clear and kind"));

    // Second rating attempt is a conflict, not an overwrite.
    let err = db.rate_session(session.id, seeker, 1, None).unwrap_err();
    assert!(matches!(err, CoreError::RatingConflict));
    assert_eq!(db.get_session(session.id).unwrap().rating, Some(4));

    let err = db.rate_session(session.id, seeker, 9, None).unwrap_err();
    assert!(matches!(err, CoreError::InvalidRating));
}

fn active_session(db: &Database) -> (parley_types::models::AdviceSession, Uuid, Uuid) {
    let seeker = Uuid::new_v4();
    let helper = Uuid::new_v4();
    let question = Uuid::new_v4();
    db.create_session(question, seeker, None).unwrap();
    let session = db.claim_question(question, helper).unwrap();
    (session, seeker, helper)
}

#[test]
fn message_payload_validation() {
    let db = db();
    let (session, seeker, _) = active_session(&db);

    let err = db
        .insert_message(session.id, seeker, None, None, None)
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidMessage));

    // media_kind and media_ref must come together.
    let err = db
        .insert_message(session.id, seeker, None, Some(MediaKind::Audio), None)
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidMessage));

    let msg = db
        .insert_message(session.id, seeker, None, Some(MediaKind::Image), Some("blob://abc"))
        .unwrap();
    assert_eq!(msg.media_kind, Some(MediaKind::Image));
    assert!(!msg.is_read);
}

#[test]
fn unread_count_is_derived_and_batch_read_clears_it() {
    let db = db();
    let (session, seeker, helper) = active_session(&db);

    db.insert_message(session.id, seeker, Some("hi"), None, None).unwrap();
    db.insert_message(session.id, seeker, Some("you there?"), None, None).unwrap();
    db.insert_message(session.id, helper, Some("yes"), None, None).unwrap();

    // Each side only counts the other side's unread messages.
    assert_eq!(db.unread_count(session.id, helper).unwrap(), 2);
    assert_eq!(db.unread_count(session.id, seeker).unwrap(), 1);

    let read = db.mark_messages_read(session.id, helper).unwrap();
    assert_eq!(read.len(), 2);
    assert_eq!(db.unread_count(session.id, helper).unwrap(), 0);
    // The helper's own message to the seeker is untouched.
    assert_eq!(db.unread_count(session.id, seeker).unwrap(), 1);

    // Second batch call finds nothing to flip.
    assert!(db.mark_messages_read(session.id, helper).unwrap().is_empty());
}

#[test]
fn list_sessions_carries_derived_unread() {
    let db = db();
    let (session, seeker, helper) = active_session(&db);
    db.insert_message(session.id, seeker, Some("hi"), None, None).unwrap();

    let listed = db.list_sessions_for(helper).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].0.id, session.id);
    assert_eq!(listed[0].1, 1);

    db.mark_messages_read(session.id, helper).unwrap();
    let listed = db.list_sessions_for(helper).unwrap();
    assert_eq!(listed[0].1, 0);
}

#[test]
fn reaction_toggle_roundtrip() {
    let db = db();
    let (session, seeker, helper) = active_session(&db);
    let msg = db
        .insert_message(session.id, seeker, Some("hope this helps"), None, None)
        .unwrap();

    let (added, at) = db.toggle_reaction(msg.id, helper, "👍").unwrap();
    assert!(added);
    assert!(at.is_some());

    // Second responder on the same emoji is its own row — not lost.
    let (added, _) = db.toggle_reaction(msg.id, seeker, "👍").unwrap();
    assert!(added);

    let messages = db.get_messages(session.id, 50, None).unwrap();
    assert_eq!(messages[0].reactions.len(), 2);

    // Toggling the same pair again returns the set to its prior state.
    let (added, at) = db.toggle_reaction(msg.id, helper, "👍").unwrap();
    assert!(!added);
    assert!(at.is_none());

    let messages = db.get_messages(session.id, 50, None).unwrap();
    assert_eq!(messages[0].reactions.len(), 1);
    assert_eq!(messages[0].reactions[0].responder_id, seeker);
}

#[test]
fn helpful_votes_only_land_on_resolved_sessions() {
    let db = db();
    let voter = Uuid::new_v4();

    // Unknown session.
    let err = db.record_helpful_vote(Uuid::new_v4(), voter).unwrap_err();
    assert!(matches!(err, CoreError::NotFound));

    let seeker = Uuid::new_v4();
    let question = Uuid::new_v4();
    let session = db.create_session(question, seeker, None).unwrap();

    // Pending, then active: both rejected, nothing recorded.
    let err = db.record_helpful_vote(session.id, voter).unwrap_err();
    assert!(matches!(err, CoreError::NotResolved));

    let helper = Uuid::new_v4();
    db.claim_question(question, helper).unwrap();
    let err = db.record_helpful_vote(session.id, voter).unwrap_err();
    assert!(matches!(err, CoreError::NotResolved));

    db.resolve_session(session.id, helper).unwrap();
    db.record_helpful_vote(session.id, voter).unwrap();

    let stats = db.recompute_stats(helper).unwrap();
    assert_eq!(stats.helpful_vote_count, 1);
}

#[test]
fn recompute_is_pure_and_idempotent() {
    let db = db();
    let helper = Uuid::new_v4();

    // Two resolved sessions, one rated 5, one rated 3, one still active.
    for rating in [Some(5), Some(3), None] {
        let seeker = Uuid::new_v4();
        let question = Uuid::new_v4();
        db.create_session(question, seeker, None).unwrap();
        let session = db.claim_question(question, helper).unwrap();
        if let Some(r) = rating {
            db.resolve_session(session.id, helper).unwrap();
            db.rate_session(session.id, seeker, r, None).unwrap();
            db.record_helpful_vote(session.id, seeker).unwrap();
        }
    }

    let first = db.recompute_stats(helper).unwrap();
    assert_eq!(first.questions_answered, 2);
    assert_eq!(first.average_rating, Some(4.0));
    assert_eq!(first.helpful_vote_count, 2);

    // Unchanged input, identical output.
    let second = db.recompute_stats(helper).unwrap();
    assert_eq!(first, second);

    // Duplicate votes don't inflate the sum.
    let stored = db.get_stats(helper).unwrap().unwrap();
    assert_eq!(stored, first);
}

#[test]
fn resolution_scenario_updates_stats_by_one() {
    let db = db();
    let helper = Uuid::new_v4();

    // Existing history: one resolved session rated 3.
    let seeker0 = Uuid::new_v4();
    let q0 = Uuid::new_v4();
    db.create_session(q0, seeker0, None).unwrap();
    let s0 = db.claim_question(q0, helper).unwrap();
    db.resolve_session(s0.id, helper).unwrap();
    db.rate_session(s0.id, seeker0, 3, None).unwrap();
    let before = db.recompute_stats(helper).unwrap();

    // New question, racing claims, one winner.
    let seeker = Uuid::new_v4();
    let question = Uuid::new_v4();
    db.create_session(question, seeker, None).unwrap();
    let rival = Uuid::new_v4();
    let (win, lose) = match db.claim_question(question, helper) {
        Ok(s) => (s, db.claim_question(question, rival)),
        Err(_) => unreachable!(),
    };
    assert!(matches!(lose, Err(CoreError::AlreadyClaimed)));

    db.insert_message(win.id, helper, Some("hi"), None, None).unwrap();
    db.resolve_session(win.id, seeker).unwrap();
    db.rate_session(win.id, seeker, 5, None).unwrap();

    let after = db.recompute_stats(helper).unwrap();
    assert_eq!(after.questions_answered, before.questions_answered + 1);
    assert_eq!(after.average_rating, Some(4.0));
}

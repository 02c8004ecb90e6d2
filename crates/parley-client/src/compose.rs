//! Composing/typing state machines.
//!
//! Presence is best-effort and lossy: signals carry no delivery guarantee
//! and no state survives a reconnect. Both trackers here are pure state
//! machines driven by an injected `Instant`, so the host app decides when
//! to poll and tests never sleep.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use uuid::Uuid;

/// Inactivity window after which composing lapses back to idle.
pub const COMPOSE_IDLE_TIMEOUT: Duration = Duration::from_secs(2);

/// Safety net for the peer's indicator when a stop signal is lost.
const PEER_COMPOSE_TTL: Duration = Duration::from_secs(6);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeState {
    Idle,
    Composing,
}

/// Signal the host should broadcast to the other participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeSignal {
    Start,
    Stop,
}

/// Local composing tracker for one session: `idle -> composing` on the
/// first keystroke after an idle period, back to idle on send or after
/// [`COMPOSE_IDLE_TIMEOUT`] with no further keystrokes. Emits a signal only
/// on transitions, so a burst of keystrokes broadcasts one Start.
#[derive(Debug)]
pub struct ComposeTracker {
    state: ComposeState,
    last_keystroke: Option<Instant>,
}

impl ComposeTracker {
    pub fn new() -> Self {
        Self {
            state: ComposeState::Idle,
            last_keystroke: None,
        }
    }

    pub fn state(&self) -> ComposeState {
        self.state
    }

    pub fn keystroke(&mut self, now: Instant) -> Option<ComposeSignal> {
        self.last_keystroke = Some(now);
        match self.state {
            ComposeState::Idle => {
                self.state = ComposeState::Composing;
                Some(ComposeSignal::Start)
            }
            ComposeState::Composing => None,
        }
    }

    /// Sending the message ends the composing burst explicitly.
    pub fn message_sent(&mut self) -> Option<ComposeSignal> {
        self.last_keystroke = None;
        match self.state {
            ComposeState::Composing => {
                self.state = ComposeState::Idle;
                Some(ComposeSignal::Stop)
            }
            ComposeState::Idle => None,
        }
    }

    /// Poll for expiry. Emits Stop once when the inactivity window lapses.
    pub fn tick(&mut self, now: Instant) -> Option<ComposeSignal> {
        if self.state != ComposeState::Composing {
            return None;
        }
        let lapsed = self
            .last_keystroke
            .is_none_or(|at| now.duration_since(at) >= COMPOSE_IDLE_TIMEOUT);
        if lapsed {
            self.state = ComposeState::Idle;
            self.last_keystroke = None;
            Some(ComposeSignal::Stop)
        } else {
            None
        }
    }
}

impl Default for ComposeTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// View of who else is composing, fed by TypingStart/TypingStop events.
/// Entries expire on their own because a lost stop signal must only mean
/// "shows not-typing slightly late", never "typing forever". Cleared
/// wholesale on reconnect — nothing here is restored.
#[derive(Debug, Default)]
pub struct PeerComposeView {
    composing: HashMap<Uuid, Instant>,
}

impl PeerComposeView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn typing_started(&mut self, participant_id: Uuid, now: Instant) {
        self.composing.insert(participant_id, now);
    }

    pub fn typing_stopped(&mut self, participant_id: Uuid) {
        self.composing.remove(&participant_id);
    }

    /// A message from a participant implies they stopped composing it.
    pub fn message_received(&mut self, sender_id: Uuid) {
        self.composing.remove(&sender_id);
    }

    pub fn is_composing(&self, participant_id: Uuid, now: Instant) -> bool {
        self.composing
            .get(&participant_id)
            .is_some_and(|at| now.duration_since(*at) < PEER_COMPOSE_TTL)
    }

    /// Reconnect: the channel starts clean.
    pub fn reset(&mut self) {
        self.composing.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_keystroke_starts_composing_once() {
        let mut tracker = ComposeTracker::new();
        let t0 = Instant::now();

        assert_eq!(tracker.keystroke(t0), Some(ComposeSignal::Start));
        // Further keystrokes within the burst stay silent.
        assert_eq!(tracker.keystroke(t0 + Duration::from_millis(300)), None);
        assert_eq!(tracker.keystroke(t0 + Duration::from_millis(600)), None);
        assert_eq!(tracker.state(), ComposeState::Composing);
    }

    #[test]
    fn composing_expires_after_two_seconds_idle() {
        let mut tracker = ComposeTracker::new();
        let t0 = Instant::now();
        tracker.keystroke(t0);

        // Still within the window.
        assert_eq!(tracker.tick(t0 + Duration::from_millis(1999)), None);

        assert_eq!(
            tracker.tick(t0 + Duration::from_secs(2)),
            Some(ComposeSignal::Stop)
        );
        assert_eq!(tracker.state(), ComposeState::Idle);
        // Expiry fires once.
        assert_eq!(tracker.tick(t0 + Duration::from_secs(3)), None);
    }

    #[test]
    fn keystrokes_extend_the_window() {
        let mut tracker = ComposeTracker::new();
        let t0 = Instant::now();
        tracker.keystroke(t0);
        tracker.keystroke(t0 + Duration::from_millis(1500));

        // 2s after the first keystroke but only 0.5s after the second.
        assert_eq!(tracker.tick(t0 + Duration::from_secs(2)), None);
        assert_eq!(
            tracker.tick(t0 + Duration::from_millis(3500)),
            Some(ComposeSignal::Stop)
        );
    }

    #[test]
    fn send_stops_composing_explicitly() {
        let mut tracker = ComposeTracker::new();
        let t0 = Instant::now();
        tracker.keystroke(t0);

        assert_eq!(tracker.message_sent(), Some(ComposeSignal::Stop));
        assert_eq!(tracker.state(), ComposeState::Idle);
        // Sending while idle emits nothing.
        assert_eq!(tracker.message_sent(), None);

        // A new burst after send starts fresh.
        assert_eq!(
            tracker.keystroke(t0 + Duration::from_secs(1)),
            Some(ComposeSignal::Start)
        );
    }

    #[test]
    fn peer_view_expires_and_resets() {
        let mut view = PeerComposeView::new();
        let peer = Uuid::new_v4();
        let t0 = Instant::now();

        view.typing_started(peer, t0);
        assert!(view.is_composing(peer, t0 + Duration::from_secs(1)));

        // Lost stop signal: indicator goes stale on its own.
        assert!(!view.is_composing(peer, t0 + PEER_COMPOSE_TTL));

        view.typing_started(peer, t0);
        view.message_received(peer);
        assert!(!view.is_composing(peer, t0 + Duration::from_millis(10)));

        view.typing_started(peer, t0);
        view.reset();
        assert!(!view.is_composing(peer, t0 + Duration::from_millis(10)));
    }
}

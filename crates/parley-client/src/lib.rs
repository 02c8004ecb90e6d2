//! Client-side synchronization core for advice sessions.
//!
//! A client runs single-threaded, event-driven control flow: user actions
//! and inbound gateway events interleave on one logical queue. This crate
//! holds the state machines that keep that view consistent — the message
//! timeline (optimistic sends reconciled against an at-least-once,
//! unordered event feed) and the composing/typing tracker. It owns no I/O;
//! the host app drives it and injects the clock.

pub mod compose;
pub mod timeline;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// The transport failed to deliver a send. This crate owns no I/O, so
    /// the host application is the sole producer of this variant: it maps
    /// its transport error into `SendFailed`, rolls back the optimistic
    /// entry with [`timeline::MessageTimeline::rollback_send`] and restores
    /// the composer. Retry is manual, never automatic.
    #[error("message send failed")]
    SendFailed,

    #[error("message must carry text or a media reference")]
    EmptyMessage,
}

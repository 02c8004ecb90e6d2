use uuid::Uuid;

/// What a recipient should be nudged about while not actively viewing the
/// session.
#[derive(Debug, Clone, Copy)]
pub enum Notification {
    MessageReceived { session_id: Uuid },
    SessionClaimed { session_id: Uuid },
    SessionResolved { session_id: Uuid },
}

/// Fire-and-forget notification seam. The scheduler behind it (push, email,
/// whatever) is an external collaborator; the core never tracks delivery or
/// receipts, so the trait has no return value.
pub trait Notifier: Send + Sync {
    fn notify(&self, recipient: Uuid, notification: Notification);
}

/// Default implementation: log and move on. The server wires in a real
/// scheduler where one exists.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, recipient: Uuid, notification: Notification) {
        tracing::debug!("notify {}: {:?}", recipient, notification);
    }
}

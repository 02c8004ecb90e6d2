use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast, mpsc};
use uuid::Uuid;

use parley_types::events::GatewayEvent;

/// Manages all connected clients and broadcasts events.
///
/// Delivery is fan-out over a tokio broadcast channel; per-connection
/// session filtering happens in the connection loop. A lagged receiver
/// simply drops events — clients are built to re-fetch on focus, so the
/// feed only ever needs to be at-least-once.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Broadcast channel for gateway events — all connected clients receive
    /// all events and filter by their session subscriptions
    broadcast_tx: broadcast::Sender<GatewayEvent>,

    /// Track online participants: participant_id -> display name
    online: RwLock<HashMap<Uuid, String>>,

    /// Per-participant targeted send channels: participant_id -> (conn_id, sender)
    channels: RwLock<HashMap<Uuid, (Uuid, mpsc::UnboundedSender<GatewayEvent>)>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                online: RwLock::new(HashMap::new()),
                channels: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe to gateway events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Broadcast an event to all connected clients.
    pub fn broadcast(&self, event: GatewayEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }

    /// Register a per-participant targeted channel. Returns (conn_id, receiver).
    pub async fn register_channel(
        &self,
        participant_id: Uuid,
    ) -> (Uuid, mpsc::UnboundedReceiver<GatewayEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .channels
            .write()
            .await
            .insert(participant_id, (conn_id, tx));
        (conn_id, rx)
    }

    /// Unregister a targeted channel, but only if conn_id matches.
    pub async fn unregister_channel(&self, participant_id: Uuid, conn_id: Uuid) {
        let mut channels = self.inner.channels.write().await;
        if let Some((stored_conn_id, _)) = channels.get(&participant_id) {
            if *stored_conn_id == conn_id {
                channels.remove(&participant_id);
            }
        }
    }

    /// Send a targeted event to a specific participant.
    pub async fn send_to_participant(&self, participant_id: Uuid, event: GatewayEvent) {
        let channels = self.inner.channels.read().await;
        if let Some((_, tx)) = channels.get(&participant_id) {
            let _ = tx.send(event);
        }
    }

    /// Register a participant as online.
    pub async fn participant_online(&self, participant_id: Uuid, name: String) {
        self.inner
            .online
            .write()
            .await
            .insert(participant_id, name.clone());

        self.broadcast(GatewayEvent::PresenceUpdate {
            participant_id,
            name,
            online: true,
        });
    }

    /// Register a participant as offline. Only cleans up if conn_id matches,
    /// so a reconnect that raced ahead of the old connection's teardown is
    /// left untouched.
    pub async fn participant_offline(&self, participant_id: Uuid, conn_id: Uuid) {
        let is_current = {
            let channels = self.inner.channels.read().await;
            channels
                .get(&participant_id)
                .is_some_and(|(cid, _)| *cid == conn_id)
        };

        if !is_current {
            // A newer connection has taken over — don't touch anything
            return;
        }

        let name = self
            .inner
            .online
            .write()
            .await
            .remove(&participant_id)
            .unwrap_or_default();

        self.unregister_channel(participant_id, conn_id).await;

        self.broadcast(GatewayEvent::PresenceUpdate {
            participant_id,
            name,
            online: false,
        });
    }

    /// Get list of online participants.
    pub async fn online_participants(&self) -> Vec<(Uuid, String)> {
        self.inner
            .online
            .read()
            .await
            .iter()
            .map(|(id, name)| (*id, name.clone()))
            .collect()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

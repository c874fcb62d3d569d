use tokio::sync::broadcast;

const BROADCAST_CAPACITY: usize = 256;

/// Fan-out for server-pushed events (heartbeat ticks today; state-change
/// pushes once the control plane grows one). A connection with no
/// subscribers just drops the send — nothing is buffered for late joiners.
pub struct EventBroadcaster {
    tx: broadcast::Sender<String>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(BROADCAST_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    pub fn send(&self, payload: String) {
        let _ = self.tx.send(payload);
    }

    /// Number of live connections currently subscribed, authenticated or not.
    pub fn connection_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

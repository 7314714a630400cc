use std::sync::Arc;

use tokio::sync::broadcast;

use tabula_types::events::HostEvent;

const CHANNEL_CAPACITY: usize = 256;

/// Fans host lifecycle events out to every subscriber.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    broadcast_tx: broadcast::Sender<HostEvent>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(DispatcherInner { broadcast_tx }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Returns the number of subscribers that will see the event.
    pub fn emit(&self, event: HostEvent) -> usize {
        self.inner.broadcast_tx.send(event).unwrap_or(0)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

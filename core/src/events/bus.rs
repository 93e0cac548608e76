use tokio::sync::broadcast;

use super::types::SwarmEvent;

/// Broadcast fan-out for [`SwarmEvent`]s. Cloning shares the channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SwarmEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SwarmEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Lagging or absent subscribers are not an error.
    pub fn emit(&self, event: SwarmEvent) {
        tracing::trace!(kind = event.kind(), "swarm event");
        let _ = self.tx.send(event);
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn emit_without_subscribers_is_noop() {
        let bus = EventBus::new(4);
        bus.emit(SwarmEvent::CircuitClosed {
            worker_id: "w".into(),
            timestamp: Utc::now(),
        });
        assert_eq!(bus.receiver_count(), 0);
    }

    #[tokio::test]
    async fn subscribers_receive_emitted_events() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();
        bus.clone().emit(SwarmEvent::CircuitOpened {
            worker_id: "w".into(),
            consecutive_failures: 3,
            timestamp: Utc::now(),
        });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind(), "circuit_opened");
    }
}

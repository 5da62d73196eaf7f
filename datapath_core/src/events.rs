//! Notifications published by the runtime.

use crate::path::SubPathId;
use datapath_env::PathId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// Interaction mode of the exhibit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameState {
    /// Free roam
    #[default]
    WalkAround,
    /// A SubPath's medium is being presented
    ViewMedia,
    Menu,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathEvent {
    /// Anchor heights changed; distances must be refreshed
    GeometryChanged { path: PathId },

    /// A SubPath was interacted with
    SubPathSelected {
        path: PathId,
        sub_path: SubPathId,
        /// Relative time presentation should seek to
        start_secs: f64,
    },

    /// The video of the active SubPath is ready to play
    VideoPrepared { sub_path: SubPathId },

    GameStateChanged { from: GameState, to: GameState },
}

/// Fan-out of `PathEvent`s.
///
/// Publishing never blocks. Subscribers that fall more than `capacity`
/// events behind skip the oldest ones.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PathEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PathEvent> {
        self.tx.subscribe()
    }

    /// Publishes to current subscribers. Returns how many received it.
    pub fn publish(&self, event: PathEvent) -> usize {
        match self.tx.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                trace!("No subscribers for {:?}", event);
                0
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let bus = EventBus::default();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        let event = PathEvent::VideoPrepared { sub_path: SubPathId(2) };
        assert_eq!(bus.publish(event.clone()), 2);

        assert_eq!(a.recv().await.unwrap(), event);
        assert_eq!(b.recv().await.unwrap(), event);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(4);
        assert_eq!(bus.publish(PathEvent::GeometryChanged { path: PathId::from_seed(1) }), 0);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for i in 0..4 {
            bus.publish(PathEvent::VideoPrepared { sub_path: SubPathId(i) });
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(2))
        ));
        assert_eq!(
            rx.recv().await.unwrap(),
            PathEvent::VideoPrepared { sub_path: SubPathId(2) }
        );
    }
}

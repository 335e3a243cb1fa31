//! Alert feed: newest-first in-memory alert list with broadcast to subscribers.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info};

use super::model::{Alert, AlertOrigin, FeedEvent};

/// Default broadcast channel capacity.
const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Default number of alerts kept.
pub const DEFAULT_RETENTION: usize = 200;

/// In-memory alert list backed by a broadcast channel for fan-out.
///
/// Prepends are the only way alerts enter the feed, so concurrent writers
/// never reorder each other: whatever arrives later sits closer to the front.
pub struct AlertFeed {
    alerts: RwLock<VecDeque<Alert>>,
    tx: broadcast::Sender<FeedEvent>,
    retention: usize,
}

impl AlertFeed {
    /// Create a new feed that keeps at most `retention` alerts.
    pub fn new(retention: usize) -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        Arc::new(Self {
            alerts: RwLock::new(VecDeque::new()),
            tx,
            retention: retention.max(1),
        })
    }

    /// Subscribe to real-time feed events.
    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.tx.subscribe()
    }

    /// Prepend an alert and broadcast it.
    pub async fn prepend(&self, alert: Alert) {
        info!(
            alert_id = %alert.id,
            kind = %alert.kind,
            title = %alert.title,
            "Alert raised"
        );

        let msg = FeedEvent::NewAlert {
            alert: alert.clone(),
        };
        {
            let mut alerts = self.alerts.write().await;
            alerts.push_front(alert);
            self.evict(&mut alerts);
        }

        // Ok if nobody is listening
        let _ = self.tx.send(msg);
    }

    /// Swap the previously derived alerts for a freshly generated set.
    ///
    /// Disruption alerts are kept. `derived` is expected in emission order and
    /// ends up at the front of the feed in that same order.
    pub async fn replace_derived(&self, derived: Vec<Alert>) {
        let snapshot = {
            let mut alerts = self.alerts.write().await;
            alerts.retain(|a| a.origin != AlertOrigin::Derived);
            for alert in derived.into_iter().rev() {
                alerts.push_front(alert);
            }
            self.evict(&mut alerts);
            alerts.iter().cloned().collect::<Vec<_>>()
        };

        debug!(count = snapshot.len(), "Derived alerts replaced");
        let _ = self.tx.send(FeedEvent::AlertsSync { alerts: snapshot });
    }

    /// All alerts, newest first.
    pub async fn snapshot(&self) -> Vec<Alert> {
        self.alerts.read().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.alerts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.alerts.read().await.is_empty()
    }

    fn evict(&self, alerts: &mut VecDeque<Alert>) {
        while alerts.len() > self.retention {
            alerts.pop_back();
        }
    }
}

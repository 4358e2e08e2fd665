use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::scanner::AlertDecision;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MonitorEvent {
    AlertRaised(AlertDecision),
    BaselineRecorded {
        keyword: String,
        listings: usize,
        timestamp: DateTime<Utc>,
    },
    AllKeywordsBaselined {
        timestamp: DateTime<Utc>,
    },
    FirstRunReset {
        keyword: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

/// Fan-out of monitor events to the notifier and any other listeners.
pub struct EventBus {
    sender: broadcast::Sender<MonitorEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: MonitorEvent) {
        match self.sender.send(event) {
            Ok(receivers) => {
                tracing::debug!("📡 Event published to {} receivers", receivers);
            }
            Err(e) => {
                tracing::warn!("No subscribers for event: {:?}", e.0);
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.sender.subscribe()
    }
}

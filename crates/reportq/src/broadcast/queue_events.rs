//! Queue event broadcaster.
//!
//! Every state change the queue or the worker pool makes is published on a
//! tokio broadcast channel. Sending never blocks and never fails when nobody
//! is listening.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::model::ReportId;

/// Something that happened to the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueEvent {
    Enqueued {
        id: ReportId,
        project_key: String,
    },
    Booked {
        id: ReportId,
        project_key: String,
        worker_id: Option<usize>,
    },
    Completed {
        id: ReportId,
        project_key: String,
        duration_ms: u64,
    },
    Failed {
        id: ReportId,
        project_key: String,
        error: String,
    },
    Deleted {
        id: ReportId,
    },
    Purged {
        count: usize,
    },
    Recovered {
        count: usize,
    },
}

#[derive(Clone)]
pub struct QueueEventBroadcaster {
    sender: broadcast::Sender<QueueEvent>,
}

impl QueueEventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn send(&self, event: QueueEvent) {
        // No active receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for QueueEventBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

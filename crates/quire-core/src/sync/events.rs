//! Typed sync notifications.
//!
//! Notifications are fire-and-forget: sending with no subscribers is not an
//! error, and a lagging subscriber loses the oldest events rather than
//! blocking the sync core.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::RecordId;

const EVENT_CAPACITY: usize = 256;

/// Sync state changes published to UI subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SyncEvent {
    /// A remote write started.
    Syncing {
        #[serde(rename = "recordId")]
        record_id: RecordId,
    },
    /// A remote write or reconciliation succeeded, or a stale entry was dropped.
    Synced {
        #[serde(rename = "recordId")]
        record_id: Option<RecordId>,
    },
    /// A remote write failed and was queued for retry.
    SyncError {
        #[serde(rename = "recordId")]
        record_id: RecordId,
        error: String,
    },
    /// A temporary ID was replaced by a durable one.
    Promoted {
        temporary: RecordId,
        durable: RecordId,
    },
}

/// Multi-subscriber channel owned by the sync core.
#[derive(Clone)]
pub struct SyncEvents {
    sender: broadcast::Sender<SyncEvent>,
}

impl Default for SyncEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncEvents {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: SyncEvent) {
        tracing::trace!(?event, "sync event");
        // No receivers is fine; nobody is listening yet.
        let _ = self.sender.send(event);
    }

    pub fn syncing(&self, record_id: &RecordId) {
        self.emit(SyncEvent::Syncing {
            record_id: record_id.clone(),
        });
    }

    pub fn synced(&self, record_id: Option<&RecordId>) {
        self.emit(SyncEvent::Synced {
            record_id: record_id.cloned(),
        });
    }

    pub fn sync_error(&self, record_id: &RecordId, error: impl ToString) {
        self.emit(SyncEvent::SyncError {
            record_id: record_id.clone(),
            error: error.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_without_subscribers_is_silent() {
        let events = SyncEvents::new();
        events.synced(None);
    }

    #[test]
    fn every_subscriber_receives_events() {
        let events = SyncEvents::new();
        let mut first = events.subscribe();
        let mut second = events.subscribe();
        let id = RecordId::durable("n-1");

        events.sync_error(&id, "offline");

        let expected = SyncEvent::SyncError {
            record_id: id,
            error: "offline".to_string(),
        };
        assert_eq!(first.try_recv().unwrap(), expected);
        assert_eq!(second.try_recv().unwrap(), expected);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(SyncEvent::Synced { record_id: None }).unwrap();
        assert_eq!(json["type"], "synced");
    }
}

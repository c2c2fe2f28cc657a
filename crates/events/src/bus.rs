//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish side of the engine's notification path. The
//! dispatch engine and sweeper publish [`DispatchEvent`]s here without
//! awaiting delivery; the [`NotificationDispatcher`](crate::dispatcher)
//! consumes them on its own task. Lifecycle writes never block on this bus
//! and never fail because of it.

use chrono::{DateTime, Utc};
use plowline_core::types::DbId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// DispatchEvent
// ---------------------------------------------------------------------------

/// A domain event emitted by the dispatch engine.
///
/// Constructed via [`DispatchEvent::new`] and enriched with the builder
/// methods [`with_job`](DispatchEvent::with_job),
/// [`with_worker`](DispatchEvent::with_worker),
/// [`with_recipient`](DispatchEvent::with_recipient), and
/// [`with_payload`](DispatchEvent::with_payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchEvent {
    /// Dot-separated event name, e.g. `"job.expired"`.
    pub event_type: String,

    /// The job this event concerns, when there is one.
    pub job_id: Option<DbId>,

    /// The worker this event concerns, when there is one.
    pub worker_id: Option<DbId>,

    /// The user who should be notified. Events without a recipient are
    /// consumed for logging only.
    pub recipient_user_id: Option<DbId>,

    /// Free-form JSON payload carrying event-specific data.
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl DispatchEvent {
    /// Create a new event with only the required `event_type`.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            job_id: None,
            worker_id: None,
            recipient_user_id: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// Attach the job the event concerns.
    pub fn with_job(mut self, job_id: DbId) -> Self {
        self.job_id = Some(job_id);
        self
    }

    /// Attach the worker the event concerns.
    pub fn with_worker(mut self, worker_id: DbId) -> Self {
        self.worker_id = Some(worker_id);
        self
    }

    /// Set the user to notify.
    pub fn with_recipient(mut self, user_id: DbId) -> Self {
        self.recipient_user_id = Some(user_id);
        self
    }

    /// Set the JSON payload for the event.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so any number of subscribers independently
/// receive every published [`DispatchEvent`]. Shared as `Arc<EventBus>`
/// across the application.
pub struct EventBus {
    sender: broadcast::Sender<DispatchEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest un-consumed messages are dropped
    /// and slow receivers observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped;
    /// notification loss is an accepted failure mode, lifecycle state never
    /// depends on it.
    pub fn publish(&self, event: DispatchEvent) {
        // Ignore the SendError, it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        let event = DispatchEvent::new("job.expired")
            .with_job(42)
            .with_worker(7)
            .with_recipient(100)
            .with_payload(serde_json::json!({"refund_cents": 45000}));

        bus.publish(event);

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.event_type, "job.expired");
        assert_eq!(received.job_id, Some(42));
        assert_eq!(received.worker_id, Some(7));
        assert_eq!(received.recipient_user_id, Some(100));
        assert_eq!(received.payload["refund_cents"], 45000);
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(DispatchEvent::new("job.assigned"));

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");

        assert_eq!(e1.event_type, "job.assigned");
        assert_eq!(e2.event_type, "job.assigned");
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(DispatchEvent::new("orphan.event"));
    }

    #[test]
    fn default_event_has_empty_optional_fields() {
        let event = DispatchEvent::new("bare.event");
        assert_eq!(event.event_type, "bare.event");
        assert!(event.job_id.is_none());
        assert!(event.worker_id.is_none());
        assert!(event.recipient_user_id.is_none());
        assert!(event.payload.is_object());
    }
}

//! Background notification dispatcher.
//!
//! [`NotificationDispatcher`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! broadcast channel, persists a notification row for every event that names
//! a recipient, and attempts best-effort push delivery. It runs as a
//! long-lived background task and shuts down when the bus sender is dropped.
//!
//! Failures here are logged and swallowed: a missed notification is an
//! accepted failure mode, lifecycle state never depends on delivery.

use plowline_db::models::notification::NewNotification;
use plowline_db::repositories::NotificationRepo;
use plowline_db::DbPool;
use tokio::sync::broadcast;

use crate::bus::DispatchEvent;
use crate::delivery::push::PushDelivery;

/// Background service that turns dispatch events into notifications.
pub struct NotificationDispatcher;

impl NotificationDispatcher {
    /// Run the dispatch loop.
    ///
    /// Subscribes via the provided `receiver` and processes every event it
    /// receives. When `push` is `None` (no gateway configured) notifications
    /// are persisted but left undelivered. The loop exits when the channel
    /// is closed, i.e. when the [`EventBus`](crate::bus::EventBus) is dropped.
    pub async fn run(
        pool: DbPool,
        mut receiver: broadcast::Receiver<DispatchEvent>,
        push: Option<PushDelivery>,
    ) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    Self::handle(&pool, push.as_ref(), &event).await;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        skipped = n,
                        "Notification dispatcher lagged, some events were dropped"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, notification dispatcher shutting down");
                    break;
                }
            }
        }
    }

    /// Process a single event: persist, then push.
    async fn handle(pool: &DbPool, push: Option<&PushDelivery>, event: &DispatchEvent) {
        let Some(recipient) = event.recipient_user_id else {
            // Events without a recipient are informational.
            tracing::info!(
                event_type = %event.event_type,
                job_id = event.job_id,
                worker_id = event.worker_id,
                "Dispatch event"
            );
            return;
        };

        let (title, body) = render(event);
        let row = match NotificationRepo::enqueue(
            pool,
            &NewNotification {
                recipient_user_id: recipient,
                kind: event.event_type.clone(),
                title: title.clone(),
                body: body.clone(),
                payload: event.payload.clone(),
            },
        )
        .await
        {
            Ok(row) => row,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    event_type = %event.event_type,
                    "Failed to persist notification"
                );
                return;
            }
        };

        let Some(push) = push else {
            return;
        };
        match push
            .deliver(recipient, &event.event_type, &title, &body, &event.payload)
            .await
        {
            Ok(()) => {
                if let Err(e) = NotificationRepo::mark_delivered(pool, row.id).await {
                    tracing::error!(
                        error = %e,
                        notification_id = row.id,
                        "Failed to mark notification delivered"
                    );
                }
            }
            Err(e) => {
                // The row stays undelivered; clients can still fetch it.
                tracing::warn!(
                    error = %e,
                    notification_id = row.id,
                    event_type = %event.event_type,
                    "Push delivery failed"
                );
            }
        }
    }
}

/// Render the user-facing title and body for an event.
fn render(event: &DispatchEvent) -> (String, String) {
    let payload = &event.payload;
    match event.event_type.as_str() {
        "job.assigned" => (
            "Worker on the way".into(),
            "A worker has accepted your job and will arrive before the deadline.".into(),
        ),
        "job.dispatch_assigned" => (
            "New job assigned".into(),
            "You have been assigned a job. Check the app for the site and deadline.".into(),
        ),
        "job.deadline_approaching" => {
            let minutes = payload["minutes_remaining"].as_i64().unwrap_or(0);
            (
                "Deadline approaching".into(),
                format!("An assigned job is due in {minutes} minutes."),
            )
        }
        "job.expired" => {
            // `refund_cents` is null when the job was never charged.
            let body = if payload["refunded"].as_bool().unwrap_or(false) {
                "Your job was not completed in time. It has been cancelled and your \
                 payment refunded."
                    .into()
            } else if !payload["refund_cents"].is_null() {
                "Your job was not completed in time and has been cancelled. Your refund \
                 is being processed."
                    .into()
            } else {
                "Your job was not completed in time and has been cancelled.".into()
            };
            ("Job cancelled".into(), body)
        }
        "job.expired_penalty" => {
            let warnings = payload["warning_count"].as_i64().unwrap_or(0);
            (
                "Missed deadline".into(),
                format!(
                    "An assigned job expired before completion. \
                     This is warning {warnings} on your record."
                ),
            )
        }
        "worker.suspended" => (
            "Account suspended".into(),
            "Your account has been suspended after repeated missed deadlines. \
             Contact support to be reinstated."
                .into(),
        ),
        other => (other.to_string(), String::new()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_reminder_includes_minutes() {
        let event = DispatchEvent::new("job.deadline_approaching")
            .with_payload(serde_json::json!({"minutes_remaining": 12}));
        let (title, body) = render(&event);
        assert_eq!(title, "Deadline approaching");
        assert!(body.contains("12 minutes"));
    }

    #[test]
    fn render_expiration_mentions_refund_state() {
        let pending = DispatchEvent::new("job.expired")
            .with_payload(serde_json::json!({"refunded": false, "refund_cents": 45_000}));
        let (_, body) = render(&pending);
        assert!(body.contains("being processed"));

        let settled = DispatchEvent::new("job.expired")
            .with_payload(serde_json::json!({"refunded": true, "refund_cents": 45_000}));
        let (_, body) = render(&settled);
        assert!(body.contains("refunded"));
    }

    #[test]
    fn render_expiration_of_an_uncharged_job_promises_no_refund() {
        let event = DispatchEvent::new("job.expired")
            .with_payload(serde_json::json!({"refunded": false, "refund_cents": null}));
        let (_, body) = render(&event);
        assert!(!body.contains("refund"), "got: {body}");
        assert!(body.contains("cancelled"));
    }

    #[test]
    fn render_penalty_names_the_warning_count() {
        let event = DispatchEvent::new("job.expired_penalty")
            .with_payload(serde_json::json!({"warning_count": 2}));
        let (_, body) = render(&event);
        assert!(body.contains("warning 2"));
    }

    #[test]
    fn render_unknown_kind_falls_back_to_the_kind() {
        let event = DispatchEvent::new("something.else");
        let (title, body) = render(&event);
        assert_eq!(title, "something.else");
        assert!(body.is_empty());
    }
}

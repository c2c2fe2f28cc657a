//! Background tasks.
//!
//! The API process runs the deadline sweeper and the notification
//! dispatcher alongside the HTTP server. Both are also available as the
//! standalone `plowline-sweeper` binary for deployments that separate the
//! serving and enforcement roles.

use std::sync::Arc;
use std::time::Duration;

use plowline_db::DbPool;
use plowline_dispatch::DeadlineSweeper;
use plowline_events::{EventBus, NotificationDispatcher, PushDelivery};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Handles for the spawned background services.
pub struct BackgroundServices {
    cancel: CancellationToken,
    sweeper: JoinHandle<()>,
    notifications: JoinHandle<()>,
}

/// Spawn the sweeper loop and the notification dispatcher.
pub fn start(
    pool: DbPool,
    bus: &Arc<EventBus>,
    sweeper: Arc<DeadlineSweeper>,
    push: Option<PushDelivery>,
) -> BackgroundServices {
    let cancel = CancellationToken::new();

    let sweeper_cancel = cancel.clone();
    let sweeper_handle = tokio::spawn(async move {
        sweeper.run(sweeper_cancel).await;
    });

    let notifications_handle = tokio::spawn(NotificationDispatcher::run(
        pool,
        bus.subscribe(),
        push,
    ));

    BackgroundServices {
        cancel,
        sweeper: sweeper_handle,
        notifications: notifications_handle,
    }
}

impl BackgroundServices {
    /// Stop both services and wait briefly for them to drain.
    ///
    /// The notification dispatcher exits when the event bus closes, so the
    /// caller must drop its [`EventBus`] references before calling this.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.sweeper).await;
        let _ = tokio::time::timeout(Duration::from_secs(5), self.notifications).await;
        tracing::info!("Background services shut down");
    }
}

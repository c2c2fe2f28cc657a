//! Plowline event bus and notification infrastructure.
//!
//! Building blocks for the dispatch engine's fire-and-forget notification
//! path:
//!
//! - [`EventBus`] — in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`DispatchEvent`] — the canonical domain event envelope.
//! - [`NotificationDispatcher`] — background service that turns events into
//!   persisted notification rows and best-effort push deliveries.
//! - [`delivery`] — the external push-gateway channel.

pub mod bus;
pub mod delivery;
pub mod dispatcher;

pub use bus::{DispatchEvent, EventBus};
pub use delivery::push::{PushDelivery, PushError};
pub use dispatcher::NotificationDispatcher;

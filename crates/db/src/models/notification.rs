//! Notification queue models.

use plowline_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `notifications` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Notification {
    pub id: DbId,
    pub recipient_user_id: DbId,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub payload: serde_json::Value,
    pub delivered: bool,
    pub created_at: Timestamp,
}

/// DTO for enqueuing a notification.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient_user_id: DbId,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub payload: serde_json::Value,
}

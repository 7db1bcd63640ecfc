use mongodb::bson::{DateTime, Document};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEvent {
    Welcome,
    BookingRequested,
    BookingConfirmed,
    BookingCancelled,
    BookingCompleted,
    VerificationApproved,
    VerificationRejected,
    VerificationReinstated,
    VerificationRevoked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationCategory {
    Account,
    Booking,
    Verification,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPriority {
    Low,
    Normal,
    High,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NotificationAction {
    pub label: String,
    pub url: String,
}

/// Persisted per-user notification, independently queryable. `expires_at`
/// feeds a TTL index, so expired notifications disappear on their own.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Notification {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub event: NotificationEvent,
    pub category: NotificationCategory,
    pub title: String,
    pub message: String,
    pub read: bool,
    pub action: Option<NotificationAction>,
    pub metadata: Option<Document>,
    pub expires_at: Option<DateTime>,
    pub priority: NotificationPriority,
    pub created_at: DateTime,
}

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Notification categories pushed to users on workflow events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationType {
    QuoteReceived,
    QuoteAccepted,
    QuoteRejected,
    RequestNearby,
    RequestUpdated,
    RequestCancelled,
    JobStatusChanged,
    NewMessage,
    ReviewReceived,
    MembershipChanged,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuoteReceived => "quote_received",
            Self::QuoteAccepted => "quote_accepted",
            Self::QuoteRejected => "quote_rejected",
            Self::RequestNearby => "request_nearby",
            Self::RequestUpdated => "request_updated",
            Self::RequestCancelled => "request_cancelled",
            Self::JobStatusChanged => "job_status_changed",
            Self::NewMessage => "new_message",
            Self::ReviewReceived => "review_received",
            Self::MembershipChanged => "membership_changed",
        }
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response DTO for a notification
#[derive(Debug, Clone, Serialize)]
pub struct NotificationResponse {
    pub id: Uuid,
    pub r#type: String,
    pub title: String,
    pub body: Option<String>,
    pub data: serde_json::Value,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

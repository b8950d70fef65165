use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::users::Specialty;

/// Service request status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Quoted,
    Accepted,
    InProgress,
    Completed,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Quoted => "quoted",
            Self::Accepted => "accepted",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "quoted" => Self::Quoted,
            "accepted" => Self::Accepted,
            "in_progress" => Self::InProgress,
            "completed" => Self::Completed,
            "cancelled" => Self::Cancelled,
            _ => Self::Pending,
        }
    }

    /// Technicians may still submit or edit quotes.
    pub fn accepts_quotes(&self) -> bool {
        matches!(self, Self::Pending | Self::Quoted)
    }

    /// The owner may still edit title/description/location.
    pub fn editable(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Cancellation is allowed until work starts. Mirrors the job cancel
    /// edges: once the job is `in_progress` the request moves with the job
    /// (completed or disputed), never sideways to cancelled.
    pub fn cancellable(&self) -> bool {
        matches!(self, Self::Pending | Self::Quoted | Self::Accepted)
    }
}

/// Request DTO for creating a service request
#[derive(Debug, Clone, Deserialize)]
pub struct CreateServiceRequest {
    pub category: Specialty,
    pub title: String,
    pub description: String,
    pub address: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub urgent: bool,
    #[serde(default)]
    pub photo_urls: Vec<String>,
}

impl CreateServiceRequest {
    pub const MIN_TITLE_LEN: usize = 10;

    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().len() < Self::MIN_TITLE_LEN {
            return Err(format!(
                "Title must be at least {} characters",
                Self::MIN_TITLE_LEN
            ));
        }
        if self.description.trim().is_empty() {
            return Err("Description must not be empty".to_string());
        }
        if !(-90.0..=90.0).contains(&self.lat) || !(-180.0..=180.0).contains(&self.lng) {
            return Err("Location coordinates are out of range".to_string());
        }
        Ok(())
    }
}

/// Editable fields while a request is pending. Category is immutable.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateServiceRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default)]
    pub urgent: Option<bool>,
}

/// Response DTO for a service request
#[derive(Debug, Clone, Serialize)]
pub struct ServiceRequestResponse {
    pub id: Uuid,
    pub client_id: Uuid,
    pub category: String,
    pub title: String,
    pub description: String,
    pub address: String,
    pub lat: f64,
    pub lng: f64,
    pub urgent: bool,
    pub status: RequestStatus,
    pub photo_urls: Vec<String>,
    pub quote_count: i64,
    /// Distance from the caller's base, only on the technician feed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> CreateServiceRequest {
        CreateServiceRequest {
            category: Specialty::Plumbing,
            title: "Kitchen sink is leaking".to_string(),
            description: "Water pools under the sink cabinet".to_string(),
            address: "Av. Siempre Viva 742".to_string(),
            lat: -12.05,
            lng: -77.04,
            urgent: false,
            photo_urls: vec![],
        }
    }

    #[test]
    fn accepts_valid_request() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn rejects_short_title() {
        let mut req = valid();
        req.title = "leak".to_string();
        assert!(req.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        let mut req = valid();
        req.lat = 95.0;
        assert!(req.validate().is_err());
    }

    #[test]
    fn quote_window_tracks_status() {
        assert!(RequestStatus::Pending.accepts_quotes());
        assert!(RequestStatus::Quoted.accepts_quotes());
        assert!(!RequestStatus::Accepted.accepts_quotes());
        assert!(!RequestStatus::Cancelled.accepts_quotes());
    }

    #[test]
    fn only_pending_is_editable() {
        assert!(RequestStatus::Pending.editable());
        assert!(!RequestStatus::Quoted.editable());
        assert!(!RequestStatus::Accepted.editable());
    }

    #[test]
    fn cancellation_window_closes_when_work_starts() {
        assert!(RequestStatus::Pending.cancellable());
        assert!(RequestStatus::Quoted.cancellable());
        assert!(RequestStatus::Accepted.cancellable());
        // once the technician is on the job, only the job endpoint moves it
        assert!(!RequestStatus::InProgress.cancellable());
        assert!(!RequestStatus::Completed.cancellable());
        assert!(!RequestStatus::Cancelled.cancellable());
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Quote status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
}

impl QuoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "accepted" => Self::Accepted,
            "rejected" => Self::Rejected,
            "cancelled" => Self::Cancelled,
            _ => Self::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// One priced line of a quote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub amount_cents: i64,
}

/// Request DTO for submitting (or resubmitting) a quote
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitQuoteRequest {
    pub line_items: Vec<LineItem>,
    pub estimated_hours: f64,
    #[serde(default)]
    pub warranty_days: Option<i32>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl SubmitQuoteRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.line_items.is_empty() {
            return Err("Quote must contain at least one line item".to_string());
        }
        if self.line_items.iter().any(|li| li.amount_cents <= 0) {
            return Err("Line item amounts must be positive".to_string());
        }
        if self.estimated_hours <= 0.0 {
            return Err("Estimated hours must be positive".to_string());
        }
        Ok(())
    }

    pub fn total_cents(&self) -> i64 {
        self.line_items.iter().map(|li| li.amount_cents).sum()
    }
}

/// Response DTO for a quote
#[derive(Debug, Clone, Serialize)]
pub struct QuoteResponse {
    pub id: Uuid,
    pub request_id: Uuid,
    pub technician_id: Uuid,
    pub technician_name: Option<String>,
    pub line_items: Vec<LineItem>,
    pub total_cents: i64,
    pub estimated_hours: f64,
    pub warranty_days: Option<i32>,
    pub notes: Option<String>,
    pub status: QuoteStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote() -> SubmitQuoteRequest {
        SubmitQuoteRequest {
            line_items: vec![
                LineItem {
                    description: "Replace trap".to_string(),
                    amount_cents: 4_500,
                },
                LineItem {
                    description: "Labour".to_string(),
                    amount_cents: 8_000,
                },
            ],
            estimated_hours: 2.0,
            warranty_days: Some(30),
            notes: None,
        }
    }

    #[test]
    fn total_sums_line_items() {
        assert_eq!(quote().total_cents(), 12_500);
    }

    #[test]
    fn rejects_empty_and_non_positive_items() {
        let mut q = quote();
        q.line_items.clear();
        assert!(q.validate().is_err());

        let mut q = quote();
        q.line_items[0].amount_cents = 0;
        assert!(q.validate().is_err());
    }

    #[test]
    fn only_pending_is_live() {
        assert!(!QuoteStatus::Pending.is_terminal());
        assert!(QuoteStatus::Accepted.is_terminal());
        assert!(QuoteStatus::Rejected.is_terminal());
        assert!(QuoteStatus::Cancelled.is_terminal());
    }
}

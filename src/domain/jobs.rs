use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Job lifecycle. Strictly forward-moving; `disputed` and `cancelled` are
/// the only branches off the happy path and both are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Scheduled,
    EnRoute,
    InProgress,
    Completed,
    Disputed,
    Cancelled,
}

/// Which side of the job may drive a given transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionActor {
    Technician,
    Client,
    Either,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::EnRoute => "en_route",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Disputed => "disputed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "en_route" => Self::EnRoute,
            "in_progress" => Self::InProgress,
            "completed" => Self::Completed,
            "disputed" => Self::Disputed,
            "cancelled" => Self::Cancelled,
            _ => Self::Scheduled,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Disputed | Self::Cancelled)
    }

    /// Who may perform `from -> to`, or `None` if the edge does not exist.
    ///
    /// scheduled -> en_route -> in_progress -> completed, with `disputed`
    /// reachable from in_progress/completed and `cancelled` from
    /// scheduled/en_route. No backward edges.
    pub fn transition_actor(from: Self, to: Self) -> Option<TransitionActor> {
        use JobStatus::*;
        match (from, to) {
            (Scheduled, EnRoute) => Some(TransitionActor::Technician),
            (EnRoute, InProgress) => Some(TransitionActor::Technician),
            (InProgress, Completed) => Some(TransitionActor::Client),
            (InProgress, Disputed) | (Completed, Disputed) => Some(TransitionActor::Either),
            (Scheduled, Cancelled) | (EnRoute, Cancelled) => Some(TransitionActor::Either),
            _ => None,
        }
    }
}

/// Request DTO for advancing a job
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateJobStatusRequest {
    pub status: JobStatus,
    /// Required when moving to `disputed`
    #[serde(default)]
    pub dispute_reason: Option<String>,
}

/// Response DTO for a job
#[derive(Debug, Clone, Serialize)]
pub struct JobResponse {
    pub id: Uuid,
    pub request_id: Uuid,
    pub quote_id: Uuid,
    pub client_id: Uuid,
    pub technician_id: Uuid,
    pub status: JobStatus,
    pub total_cents: i64,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub dispute_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::JobStatus::*;
    use super::*;

    #[test]
    fn happy_path_edges_exist() {
        assert_eq!(
            JobStatus::transition_actor(Scheduled, EnRoute),
            Some(TransitionActor::Technician)
        );
        assert_eq!(
            JobStatus::transition_actor(EnRoute, InProgress),
            Some(TransitionActor::Technician)
        );
        assert_eq!(
            JobStatus::transition_actor(InProgress, Completed),
            Some(TransitionActor::Client)
        );
    }

    #[test]
    fn no_backward_edges() {
        assert!(JobStatus::transition_actor(EnRoute, Scheduled).is_none());
        assert!(JobStatus::transition_actor(InProgress, EnRoute).is_none());
        assert!(JobStatus::transition_actor(Completed, InProgress).is_none());
    }

    #[test]
    fn dispute_reachable_from_in_progress_and_completed_only() {
        assert!(JobStatus::transition_actor(InProgress, Disputed).is_some());
        assert!(JobStatus::transition_actor(Completed, Disputed).is_some());
        assert!(JobStatus::transition_actor(Scheduled, Disputed).is_none());
        assert!(JobStatus::transition_actor(EnRoute, Disputed).is_none());
    }

    #[test]
    fn cancel_reachable_from_scheduled_and_en_route_only() {
        assert!(JobStatus::transition_actor(Scheduled, Cancelled).is_some());
        assert!(JobStatus::transition_actor(EnRoute, Cancelled).is_some());
        assert!(JobStatus::transition_actor(InProgress, Cancelled).is_none());
        assert!(JobStatus::transition_actor(Completed, Cancelled).is_none());
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges_except_dispute() {
        for to in [Scheduled, EnRoute, InProgress, Completed, Cancelled] {
            assert!(JobStatus::transition_actor(Cancelled, to).is_none());
            assert!(JobStatus::transition_actor(Disputed, to).is_none());
        }
        // completed -> disputed is the single edge out of a terminal state
        assert!(JobStatus::transition_actor(Completed, Disputed).is_some());
    }

    #[test]
    fn self_transitions_are_rejected() {
        for s in [Scheduled, EnRoute, InProgress, Completed, Disputed, Cancelled] {
            assert!(JobStatus::transition_actor(s, s).is_none());
        }
    }
}

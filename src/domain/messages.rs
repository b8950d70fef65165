use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request DTO for sending a message. Exactly one of `receiver_id` or
/// `job_id` must be set; a job id resolves the counterpart automatically.
#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub receiver_id: Option<Uuid>,
    #[serde(default)]
    pub job_id: Option<Uuid>,
    pub body: String,
}

impl SendMessageRequest {
    pub const MAX_BODY_LEN: usize = 2000;

    pub fn validate(&self) -> Result<(), String> {
        if self.receiver_id.is_some() == self.job_id.is_some() {
            return Err("Exactly one of receiver_id or job_id must be set".to_string());
        }
        if self.body.trim().is_empty() {
            return Err("Message body must not be empty".to_string());
        }
        if self.body.len() > Self::MAX_BODY_LEN {
            return Err(format!(
                "Message body must be at most {} characters",
                Self::MAX_BODY_LEN
            ));
        }
        Ok(())
    }
}

/// Response DTO for a chat message
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub job_id: Option<Uuid>,
    pub body: String,
    pub read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Conversation room key: `direct:{lo}:{hi}` with the user-id pair sorted
/// so both participants resolve the same room, or `job:{id}`.
pub fn direct_room_key(a: Uuid, b: Uuid) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("direct:{}:{}", lo, hi)
}

pub fn job_room_key(job_id: Uuid) -> String {
    format!("job:{}", job_id)
}

pub fn user_room_key(user_id: Uuid) -> String {
    format!("user:{}", user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_room_key_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(direct_room_key(a, b), direct_room_key(b, a));
    }

    #[test]
    fn validate_requires_exactly_one_target() {
        let both = SendMessageRequest {
            receiver_id: Some(Uuid::new_v4()),
            job_id: Some(Uuid::new_v4()),
            body: "hi".to_string(),
        };
        assert!(both.validate().is_err());

        let neither = SendMessageRequest {
            receiver_id: None,
            job_id: None,
            body: "hi".to_string(),
        };
        assert!(neither.validate().is_err());
    }

    #[test]
    fn validate_bounds_body() {
        let empty = SendMessageRequest {
            receiver_id: Some(Uuid::new_v4()),
            job_id: None,
            body: "   ".to_string(),
        };
        assert!(empty.validate().is_err());

        let long = SendMessageRequest {
            receiver_id: Some(Uuid::new_v4()),
            job_id: None,
            body: "x".repeat(SendMessageRequest::MAX_BODY_LEN + 1),
        };
        assert!(long.validate().is_err());
    }
}

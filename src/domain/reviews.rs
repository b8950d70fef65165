use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request DTO for reviewing a completed job
#[derive(Debug, Clone, Deserialize)]
pub struct CreateReviewRequest {
    /// Overall rating, 1..=5
    pub rating: i16,
    #[serde(default)]
    pub punctuality: Option<i16>,
    #[serde(default)]
    pub quality: Option<i16>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl CreateReviewRequest {
    pub fn validate(&self) -> Result<(), String> {
        let in_range = |r: i16| (1..=5).contains(&r);
        if !in_range(self.rating) {
            return Err("Rating must be between 1 and 5".to_string());
        }
        for sub in [self.punctuality, self.quality].into_iter().flatten() {
            if !in_range(sub) {
                return Err("Sub-ratings must be between 1 and 5".to_string());
            }
        }
        Ok(())
    }
}

/// Request DTO for the subject's one-time response
#[derive(Debug, Clone, Deserialize)]
pub struct RespondReviewRequest {
    pub response: String,
}

/// Response DTO for a review
#[derive(Debug, Clone, Serialize)]
pub struct ReviewResponse {
    pub id: Uuid,
    pub job_id: Uuid,
    pub author_id: Uuid,
    pub author_name: Option<String>,
    pub subject_id: Uuid,
    pub rating: i16,
    pub punctuality: Option<i16>,
    pub quality: Option<i16>,
    pub comment: Option<String>,
    pub response: Option<String>,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_must_be_in_range() {
        for bad in [0, 6, -1] {
            let req = CreateReviewRequest {
                rating: bad,
                punctuality: None,
                quality: None,
                comment: None,
            };
            assert!(req.validate().is_err());
        }
    }

    #[test]
    fn sub_ratings_are_checked_when_present() {
        let req = CreateReviewRequest {
            rating: 4,
            punctuality: Some(7),
            quality: None,
            comment: None,
        };
        assert!(req.validate().is_err());
    }
}

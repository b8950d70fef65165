use serde::{Deserialize, Serialize};

/// Paid membership tier for technicians. Higher tiers extend the work
/// radius and rank earlier in nearby-technician listings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MembershipTier {
    Free,
    Plus,
    Pro,
}

impl Default for MembershipTier {
    fn default() -> Self {
        Self::Free
    }
}

impl MembershipTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Plus => "plus",
            Self::Pro => "pro",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "plus" => Self::Plus,
            "pro" => Self::Pro,
            _ => Self::Free,
        }
    }

    /// Extra kilometres added to the technician's base work radius.
    pub fn radius_bonus_km(&self) -> f64 {
        match self {
            Self::Free => 0.0,
            Self::Plus => 5.0,
            Self::Pro => 15.0,
        }
    }

    /// Monthly fee in cents, debited from the funds ledger on subscribe.
    pub fn monthly_fee_cents(&self) -> i64 {
        match self {
            Self::Free => 0,
            Self::Plus => 9_99,
            Self::Pro => 24_99,
        }
    }

    /// Sort key for listing priority. Lower ranks first.
    pub fn priority(&self) -> i32 {
        match self {
            Self::Pro => 0,
            Self::Plus => 1,
            Self::Free => 2,
        }
    }
}

/// Matching radius actually used for proximity queries.
pub fn effective_radius_km(base_radius_km: f64, tier: MembershipTier) -> f64 {
    base_radius_km + tier.radius_bonus_km()
}

/// Tier description for the public tier listing
#[derive(Debug, Serialize)]
pub struct TierInfo {
    pub tier: MembershipTier,
    pub monthly_fee_cents: i64,
    pub radius_bonus_km: f64,
}

impl TierInfo {
    pub fn all() -> Vec<Self> {
        [MembershipTier::Free, MembershipTier::Plus, MembershipTier::Pro]
            .into_iter()
            .map(|tier| Self {
                tier,
                monthly_fee_cents: tier.monthly_fee_cents(),
                radius_bonus_km: tier.radius_bonus_km(),
            })
            .collect()
    }
}

/// Request DTO for subscribing to a tier
#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub tier: MembershipTier,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_tier_adds_nothing() {
        assert_eq!(effective_radius_km(10.0, MembershipTier::Free), 10.0);
    }

    #[test]
    fn paid_tiers_extend_radius() {
        assert_eq!(effective_radius_km(10.0, MembershipTier::Plus), 15.0);
        assert_eq!(effective_radius_km(10.0, MembershipTier::Pro), 25.0);
    }

    #[test]
    fn pro_ranks_before_plus_before_free() {
        assert!(MembershipTier::Pro.priority() < MembershipTier::Plus.priority());
        assert!(MembershipTier::Plus.priority() < MembershipTier::Free.priority());
    }

    #[test]
    fn tier_round_trips_through_str() {
        for tier in [MembershipTier::Free, MembershipTier::Plus, MembershipTier::Pro] {
            assert_eq!(MembershipTier::from_str(tier.as_str()), tier);
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::memberships::MembershipTier;

/// User role. Immutable after registration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Client,
    Technician,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Technician => "technician",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "technician" => Self::Technician,
            _ => Self::Client,
        }
    }
}

/// Service categories a technician can work in. Also used as the category
/// of a service request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Specialty {
    Plumbing,
    Electrical,
    Carpentry,
    Painting,
    Appliances,
    Locksmith,
    Hvac,
    General,
}

impl Specialty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plumbing => "plumbing",
            Self::Electrical => "electrical",
            Self::Carpentry => "carpentry",
            Self::Painting => "painting",
            Self::Appliances => "appliances",
            Self::Locksmith => "locksmith",
            Self::Hvac => "hvac",
            Self::General => "general",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "plumbing" => Some(Self::Plumbing),
            "electrical" => Some(Self::Electrical),
            "carpentry" => Some(Self::Carpentry),
            "painting" => Some(Self::Painting),
            "appliances" => Some(Self::Appliances),
            "locksmith" => Some(Self::Locksmith),
            "hvac" => Some(Self::Hvac),
            "general" => Some(Self::General),
            _ => None,
        }
    }
}

/// Technician-specific profile payload at registration
#[derive(Debug, Clone, Deserialize)]
pub struct TechnicianSignup {
    pub specialties: Vec<Specialty>,
    #[serde(default)]
    pub bio: Option<String>,
    pub lat: f64,
    pub lng: f64,
    /// Base work radius in km, before the membership bonus
    pub work_radius_km: f64,
}

/// Request DTO for registration
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub role: Role,
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    /// Required when role is `technician`
    #[serde(default)]
    pub technician: Option<TechnicianSignup>,
}

/// Request DTO for login
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Profile fields any user may update
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

/// Technician profile fields the owner may update
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTechnicianProfileRequest {
    #[serde(default)]
    pub specialties: Option<Vec<Specialty>>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default)]
    pub work_radius_km: Option<f64>,
    #[serde(default)]
    pub available: Option<bool>,
}

/// Technician profile as exposed to the API
#[derive(Debug, Clone, Serialize)]
pub struct TechnicianProfileResponse {
    pub specialties: Vec<String>,
    pub bio: Option<String>,
    pub lat: f64,
    pub lng: f64,
    pub work_radius_km: f64,
    pub membership_tier: MembershipTier,
    /// Base radius plus the membership bonus
    pub effective_radius_km: f64,
    pub verified: bool,
    pub available: bool,
    pub rating_avg: Option<f64>,
    pub rating_count: i64,
    pub completed_jobs: i64,
}

/// Response DTO for a user
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub full_name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technician: Option<TechnicianProfileResponse>,
    pub created_at: DateTime<Utc>,
}

/// Login / registration response: token plus the profile it belongs to
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub expires_in: i64,
    pub user: UserResponse,
}

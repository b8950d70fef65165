//! Technician discovery
//!
//! Client-facing search over verified, available technicians. Paid tiers
//! rank ahead of free at any distance; within a tier, nearest wins.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::pagination::{PaginationParams, Paginated};
use crate::api::response::DataResponse;
use crate::app::AppState;
use crate::auth::{MaybeAuth, RequireClient};
use crate::domain::memberships::MembershipTier;
use crate::domain::users::Specialty;
use crate::error::{ApiError, ApiResult};
use crate::services::matching::{haversine_sql, EFFECTIVE_RADIUS_SQL};

#[derive(Debug, Deserialize)]
pub struct NearbyQuery {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub category: Option<Specialty>,
}

#[derive(Debug, sqlx::FromRow)]
struct NearbyRow {
    id: Uuid,
    full_name: String,
    photo_url: Option<String>,
    specialties: Vec<String>,
    bio: Option<String>,
    membership_tier: String,
    rating_avg: Option<f64>,
    rating_count: i64,
    completed_jobs: i64,
    distance_km: f64,
}

/// Public card for a technician in search results.
#[derive(Debug, Serialize)]
pub struct TechnicianCard {
    pub id: Uuid,
    pub full_name: String,
    pub photo_url: Option<String>,
    pub specialties: Vec<String>,
    pub bio: Option<String>,
    pub membership_tier: MembershipTier,
    pub rating_avg: Option<f64>,
    pub rating_count: i64,
    pub completed_jobs: i64,
    pub distance_km: f64,
}

impl From<NearbyRow> for TechnicianCard {
    fn from(row: NearbyRow) -> Self {
        Self {
            id: row.id,
            full_name: row.full_name,
            photo_url: row.photo_url,
            specialties: row.specialties,
            bio: row.bio,
            membership_tier: MembershipTier::from_str(&row.membership_tier),
            rating_avg: row.rating_avg,
            rating_count: row.rating_count,
            completed_jobs: row.completed_jobs,
            distance_km: row.distance_km,
        }
    }
}

/// GET /api/technicians/nearby
///
/// Technicians whose effective radius covers the given point. The caller's
/// point must be inside the technician's coverage, not the other way
/// around; radius is the technician's choice (plus tier bonus).
pub async fn nearby_technicians(
    RequireClient(_user): RequireClient,
    State(state): State<Arc<AppState>>,
    Query(query): Query<NearbyQuery>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<impl IntoResponse> {
    if !(-90.0..=90.0).contains(&query.lat) || !(-180.0..=180.0).contains(&query.lng) {
        return Err(ApiError::bad_request("Location coordinates are out of range"));
    }
    let category = query.category.map(|c| c.as_str());

    let filter = format!(
        r#"
        FROM technician_profiles tp
        JOIN users u ON u.id = tp.user_id
        WHERE u.active
          AND tp.verified
          AND tp.available
          AND ($3::text IS NULL OR $3 = ANY(tp.specialties))
          AND {distance} <= {radius}
        "#,
        distance = haversine_sql("$1", "$2"),
        radius = EFFECTIVE_RADIUS_SQL,
    );

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) {}", filter))
        .bind(query.lat)
        .bind(query.lng)
        .bind(category)
        .fetch_one(&state.db)
        .await?;

    let sql = format!(
        r#"
        SELECT u.id, u.full_name, u.photo_url, tp.specialties, tp.bio,
               tp.membership_tier, tp.rating_avg, tp.rating_count, tp.completed_jobs,
               {distance} AS distance_km
        {filter}
        ORDER BY CASE tp.membership_tier WHEN 'pro' THEN 0 WHEN 'plus' THEN 1 ELSE 2 END,
                 distance_km ASC
        LIMIT $4 OFFSET $5
        "#,
        distance = haversine_sql("$1", "$2"),
        filter = filter,
    );

    let rows = sqlx::query_as::<_, NearbyRow>(&sql)
        .bind(query.lat)
        .bind(query.lng)
        .bind(category)
        .bind(pagination.limit() as i64)
        .bind(pagination.offset() as i64)
        .fetch_all(&state.db)
        .await?;

    let data: Vec<TechnicianCard> = rows.into_iter().map(Into::into).collect();
    Ok(Json(Paginated::new(data, &pagination, total as u64)))
}

#[derive(Debug, sqlx::FromRow)]
struct TechnicianDetailRow {
    id: Uuid,
    full_name: String,
    phone: Option<String>,
    photo_url: Option<String>,
    specialties: Vec<String>,
    bio: Option<String>,
    membership_tier: String,
    verified: bool,
    available: bool,
    rating_avg: Option<f64>,
    rating_count: i64,
    completed_jobs: i64,
}

#[derive(Debug, Serialize)]
pub struct TechnicianDetail {
    pub id: Uuid,
    pub full_name: String,
    /// Only shown to authenticated callers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub photo_url: Option<String>,
    pub specialties: Vec<String>,
    pub bio: Option<String>,
    pub membership_tier: MembershipTier,
    pub verified: bool,
    pub available: bool,
    pub rating_avg: Option<f64>,
    pub rating_count: i64,
    pub completed_jobs: i64,
}

/// GET /api/technicians/:id
///
/// Public profile. Contact details only appear for logged-in callers.
pub async fn get_technician(
    MaybeAuth(auth): MaybeAuth,
    State(state): State<Arc<AppState>>,
    Path(technician_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let row = sqlx::query_as::<_, TechnicianDetailRow>(
        r#"
        SELECT u.id, u.full_name, u.phone, u.photo_url, tp.specialties, tp.bio,
               tp.membership_tier, tp.verified, tp.available,
               tp.rating_avg, tp.rating_count, tp.completed_jobs
        FROM technician_profiles tp
        JOIN users u ON u.id = tp.user_id
        WHERE u.id = $1 AND u.active
        "#,
    )
    .bind(technician_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Technician not found"))?;

    let detail = TechnicianDetail {
        id: row.id,
        full_name: row.full_name,
        phone: if auth.is_some() { row.phone } else { None },
        photo_url: row.photo_url,
        specialties: row.specialties,
        bio: row.bio,
        membership_tier: MembershipTier::from_str(&row.membership_tier),
        verified: row.verified,
        available: row.available,
        rating_avg: row.rating_avg,
        rating_count: row.rating_count,
        completed_jobs: row.completed_jobs,
    };

    Ok(Json(DataResponse::new(detail)))
}

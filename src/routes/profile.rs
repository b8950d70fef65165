//! Profile management
//!
//! Shared user fields plus the technician-specific profile. Clients have no
//! technician block; technician-only updates are gated on role.

use axum::{extract::State, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::response::DataResponse;
use crate::app::AppState;
use crate::auth::{RequireAuth, RequireTechnician};
use crate::domain::memberships::{effective_radius_km, MembershipTier};
use crate::domain::users::{
    Role, TechnicianProfileResponse, UpdateProfileRequest, UpdateTechnicianProfileRequest,
    UserResponse,
};
use crate::error::{ApiError, ApiResult};

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    role: String,
    full_name: String,
    phone: Option<String>,
    address: Option<String>,
    photo_url: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct TechnicianProfileRow {
    specialties: Vec<String>,
    bio: Option<String>,
    lat: f64,
    lng: f64,
    work_radius_km: f64,
    membership_tier: String,
    verified: bool,
    available: bool,
    rating_avg: Option<f64>,
    rating_count: i64,
    completed_jobs: i64,
}

impl From<TechnicianProfileRow> for TechnicianProfileResponse {
    fn from(row: TechnicianProfileRow) -> Self {
        let tier = MembershipTier::from_str(&row.membership_tier);
        Self {
            specialties: row.specialties,
            bio: row.bio,
            lat: row.lat,
            lng: row.lng,
            work_radius_km: row.work_radius_km,
            membership_tier: tier,
            effective_radius_km: effective_radius_km(row.work_radius_km, tier),
            verified: row.verified,
            available: row.available,
            rating_avg: row.rating_avg,
            rating_count: row.rating_count,
            completed_jobs: row.completed_jobs,
        }
    }
}

/// Load a user with their technician block (when present) for API output.
pub(crate) async fn load_user_response(db: &PgPool, user_id: Uuid) -> ApiResult<UserResponse> {
    let user = sqlx::query_as::<_, UserRow>(
        r#"
        SELECT id, email, role, full_name, phone, address, photo_url, created_at
        FROM users WHERE id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| ApiError::not_found("User not found"))?;

    let role = Role::from_str(&user.role);

    let technician = if role == Role::Technician {
        sqlx::query_as::<_, TechnicianProfileRow>(
            r#"
            SELECT specialties, bio, lat, lng, work_radius_km, membership_tier,
                   verified, available, rating_avg, rating_count, completed_jobs
            FROM technician_profiles WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .map(Into::into)
    } else {
        None
    };

    Ok(UserResponse {
        id: user.id,
        email: user.email,
        role,
        full_name: user.full_name,
        phone: user.phone,
        address: user.address,
        photo_url: user.photo_url,
        technician,
        created_at: user.created_at,
    })
}

/// PATCH /api/profile
pub async fn update_profile(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<impl IntoResponse> {
    if let Some(name) = &req.full_name {
        if name.trim().is_empty() {
            return Err(ApiError::bad_request("Full name must not be empty"));
        }
    }

    sqlx::query(
        r#"
        UPDATE users SET
            full_name = COALESCE($2, full_name),
            phone = COALESCE($3, phone),
            address = COALESCE($4, address),
            photo_url = COALESCE($5, photo_url),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(auth.id)
    .bind(req.full_name.as_deref().map(str::trim))
    .bind(&req.phone)
    .bind(&req.address)
    .bind(&req.photo_url)
    .execute(&state.db)
    .await?;

    let user = load_user_response(&state.db, auth.id).await?;
    Ok(Json(DataResponse::new(user)))
}

/// PATCH /api/profile/technician
pub async fn update_technician_profile(
    RequireTechnician(user): RequireTechnician,
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateTechnicianProfileRequest>,
) -> ApiResult<impl IntoResponse> {
    if let Some(specialties) = &req.specialties {
        if specialties.is_empty() {
            return Err(ApiError::bad_request(
                "Technicians must list at least one specialty",
            ));
        }
    }
    if let Some(radius) = req.work_radius_km {
        if radius <= 0.0 {
            return Err(ApiError::bad_request("Work radius must be positive"));
        }
    }
    if let Some(lat) = req.lat {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(ApiError::bad_request("Latitude is out of range"));
        }
    }
    if let Some(lng) = req.lng {
        if !(-180.0..=180.0).contains(&lng) {
            return Err(ApiError::bad_request("Longitude is out of range"));
        }
    }

    let specialties: Option<Vec<String>> = req
        .specialties
        .map(|s| s.iter().map(|sp| sp.as_str().to_string()).collect());

    sqlx::query(
        r#"
        UPDATE technician_profiles SET
            specialties = COALESCE($2, specialties),
            bio = COALESCE($3, bio),
            lat = COALESCE($4, lat),
            lng = COALESCE($5, lng),
            work_radius_km = COALESCE($6, work_radius_km),
            available = COALESCE($7, available),
            updated_at = NOW()
        WHERE user_id = $1
        "#,
    )
    .bind(user.id)
    .bind(&specialties)
    .bind(&req.bio)
    .bind(req.lat)
    .bind(req.lng)
    .bind(req.work_radius_km)
    .bind(req.available)
    .execute(&state.db)
    .await?;

    let user = load_user_response(&state.db, user.id).await?;
    Ok(Json(DataResponse::new(user)))
}

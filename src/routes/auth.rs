//! Registration and login
//!
//! Credentials are held locally: argon2 hash at rest, HS256 session token
//! on the wire. Role is fixed at registration and never changes.

use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::response::{Created, DataResponse};
use crate::app::AppState;
use crate::auth::{password, RequireAuth};
use crate::domain::users::{AuthResponse, LoginRequest, RegisterRequest, Role};
use crate::error::{ApiError, ApiResult};

use super::profile::load_user_response;

/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    if !req.email.contains('@') {
        return Err(ApiError::bad_request("Invalid email address"));
    }
    password::validate_password_strength(&req.password).map_err(ApiError::bad_request)?;
    if req.full_name.trim().is_empty() {
        return Err(ApiError::bad_request("Full name must not be empty"));
    }

    let technician = match (req.role, &req.technician) {
        (Role::Technician, Some(t)) => {
            if t.specialties.is_empty() {
                return Err(ApiError::bad_request(
                    "Technicians must list at least one specialty",
                ));
            }
            if t.work_radius_km <= 0.0 {
                return Err(ApiError::bad_request("Work radius must be positive"));
            }
            if !(-90.0..=90.0).contains(&t.lat) || !(-180.0..=180.0).contains(&t.lng) {
                return Err(ApiError::bad_request("Location coordinates are out of range"));
            }
            Some(t.clone())
        }
        (Role::Technician, None) => {
            return Err(ApiError::bad_request(
                "Technician registration requires a technician profile",
            ));
        }
        (Role::Client, _) => None,
    };

    let password_hash = password::hash_password(&req.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;

    let email = req.email.trim().to_lowercase();
    let user_id = Uuid::new_v4();

    let mut tx = state.db.begin().await?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO users (id, email, password_hash, role, full_name, phone, address)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(user_id)
    .bind(&email)
    .bind(&password_hash)
    .bind(req.role.as_str())
    .bind(req.full_name.trim())
    .bind(&req.phone)
    .bind(&req.address)
    .execute(&mut *tx)
    .await;

    if let Err(e) = inserted {
        if is_unique_violation(&e) {
            return Err(ApiError::conflict("Email is already registered"));
        }
        return Err(e.into());
    }

    if let Some(t) = &technician {
        let specialties: Vec<String> =
            t.specialties.iter().map(|s| s.as_str().to_string()).collect();
        sqlx::query(
            r#"
            INSERT INTO technician_profiles (user_id, specialties, bio, lat, lng, work_radius_km)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user_id)
        .bind(&specialties)
        .bind(&t.bio)
        .bind(t.lat)
        .bind(t.lng)
        .bind(t.work_radius_km)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(user_id = %user_id, role = req.role.as_str(), "User registered");

    let token = state
        .tokens
        .issue(user_id, &email, req.role)
        .map_err(|e| ApiError::internal(format!("Failed to issue token: {}", e)))?;

    let user = load_user_response(&state.db, user_id).await?;

    Ok(Created(DataResponse::new(AuthResponse {
        token,
        expires_in: state.tokens.ttl_seconds(),
        user,
    })))
}

#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    id: Uuid,
    email: String,
    password_hash: String,
    role: String,
    active: bool,
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = req.email.trim().to_lowercase();

    let row = sqlx::query_as::<_, CredentialRow>(
        "SELECT id, email, password_hash, role, active FROM users WHERE email = $1",
    )
    .bind(&email)
    .fetch_optional(&state.db)
    .await?;

    // Same rejection for unknown email, wrong password and deactivated
    // accounts; nothing about the account is revealed.
    let invalid = || ApiError::unauthorized("Invalid credentials");

    let row = row.ok_or_else(invalid)?;
    if !row.active {
        return Err(invalid());
    }

    let ok = password::verify_password(&req.password, &row.password_hash)
        .map_err(|e| ApiError::internal(format!("Stored credential is malformed: {}", e)))?;
    if !ok {
        return Err(invalid());
    }

    let token = state
        .tokens
        .issue(row.id, &row.email, Role::from_str(&row.role))
        .map_err(|e| ApiError::internal(format!("Failed to issue token: {}", e)))?;

    tracing::info!(user_id = %row.id, "User logged in");

    let user = load_user_response(&state.db, row.id).await?;

    Ok(Json(DataResponse::new(AuthResponse {
        token,
        expires_in: state.tokens.ttl_seconds(),
        user,
    })))
}

/// GET /api/me
pub async fn get_me(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
) -> ApiResult<impl IntoResponse> {
    let user = load_user_response(&state.db, auth.id).await?;
    Ok(Json(DataResponse::new(user)))
}

pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505")
    )
}

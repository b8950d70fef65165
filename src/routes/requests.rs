//! Service request routes
//!
//! Clients post requests; nearby matching technicians are notified and can
//! pull them from the `available` feed ordered by distance.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::pagination::{PaginationParams, Paginated};
use crate::api::response::{Created, DataResponse, MessageResponse};
use crate::app::AppState;
use crate::auth::{RequireAuth, RequireClient, RequireTechnician};
use crate::domain::requests::{
    CreateServiceRequest, RequestStatus, ServiceRequestResponse, UpdateServiceRequest,
};
use crate::error::{ApiError, ApiResult};
use crate::services::matching::{
    find_matching_technicians, haversine_km, haversine_sql, EFFECTIVE_RADIUS_SQL,
};
use crate::services::notifications;

#[derive(Debug, sqlx::FromRow)]
struct RequestRow {
    id: Uuid,
    client_id: Uuid,
    category: String,
    title: String,
    description: String,
    address: String,
    lat: f64,
    lng: f64,
    urgent: bool,
    status: String,
    photo_urls: Vec<String>,
    quote_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RequestRow {
    fn into_response(self, distance_km: Option<f64>) -> ServiceRequestResponse {
        ServiceRequestResponse {
            id: self.id,
            client_id: self.client_id,
            category: self.category,
            title: self.title,
            description: self.description,
            address: self.address,
            lat: self.lat,
            lng: self.lng,
            urgent: self.urgent,
            status: RequestStatus::from_str(&self.status),
            photo_urls: self.photo_urls,
            quote_count: self.quote_count,
            distance_km,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const REQUEST_COLUMNS: &str = "r.id, r.client_id, r.category, r.title, r.description, \
     r.address, r.lat, r.lng, r.urgent, r.status, r.photo_urls, \
     (SELECT COUNT(*) FROM quotes q WHERE q.request_id = r.id) AS quote_count, \
     r.created_at, r.updated_at";

async fn load_request(state: &AppState, id: Uuid) -> ApiResult<RequestRow> {
    let sql = format!("SELECT {} FROM service_requests r WHERE r.id = $1", REQUEST_COLUMNS);
    sqlx::query_as::<_, RequestRow>(&sql)
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Request not found"))
}

/// POST /api/requests
pub async fn create_request(
    RequireClient(user): RequireClient,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateServiceRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate().map_err(ApiError::bad_request)?;

    let sql = format!(
        r#"
        INSERT INTO service_requests
            (client_id, category, title, description, address, lat, lng, urgent, photo_urls)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {}
        "#,
        REQUEST_COLUMNS.replace("r.", "service_requests.")
    );

    let row = sqlx::query_as::<_, RequestRow>(&sql)
        .bind(user.id)
        .bind(req.category.as_str())
        .bind(req.title.trim())
        .bind(req.description.trim())
        .bind(&req.address)
        .bind(req.lat)
        .bind(req.lng)
        .bind(req.urgent)
        .bind(&req.photo_urls)
        .fetch_one(&state.db)
        .await?;

    tracing::info!(
        request_id = %row.id,
        client_id = %user.id,
        category = %row.category,
        urgent = row.urgent,
        "Service request created"
    );

    // Fan out to technicians whose effective radius covers the point.
    // Notification failures are logged, never surfaced to the client.
    let matched = find_matching_technicians(&state.db, req.category, req.lat, req.lng).await?;
    for tech in &matched {
        let distance = haversine_km(req.lat, req.lng, tech.lat, tech.lng);
        if let Err(e) = notifications::notify_request_nearby(
            &state.db,
            &state.hub,
            tech.user_id,
            row.id,
            &row.title,
            &row.category,
            distance,
        )
        .await
        {
            tracing::warn!(error = %e, technician_id = %tech.user_id, "Failed to notify technician");
        }
    }
    tracing::debug!(request_id = %row.id, notified = matched.len(), "Nearby technicians notified");

    Ok(Created(DataResponse::new(row.into_response(None))))
}

#[derive(Debug, Deserialize, Default)]
pub struct RequestStatusFilter {
    pub status: Option<RequestStatus>,
}

/// GET /api/requests
///
/// The caller's own requests, newest first.
pub async fn list_my_requests(
    RequireClient(user): RequireClient,
    State(state): State<Arc<AppState>>,
    Query(filter): Query<RequestStatusFilter>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<impl IntoResponse> {
    let status = filter.status.map(|s| s.as_str());

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM service_requests
        WHERE client_id = $1 AND ($2::text IS NULL OR status = $2)
        "#,
    )
    .bind(user.id)
    .bind(status)
    .fetch_one(&state.db)
    .await?;

    let sql = format!(
        r#"
        SELECT {}
        FROM service_requests r
        WHERE r.client_id = $1 AND ($2::text IS NULL OR r.status = $2)
        ORDER BY r.created_at DESC
        LIMIT $3 OFFSET $4
        "#,
        REQUEST_COLUMNS
    );

    let rows = sqlx::query_as::<_, RequestRow>(&sql)
        .bind(user.id)
        .bind(status)
        .bind(pagination.limit() as i64)
        .bind(pagination.offset() as i64)
        .fetch_all(&state.db)
        .await?;

    let data: Vec<ServiceRequestResponse> =
        rows.into_iter().map(|r| r.into_response(None)).collect();
    Ok(Json(Paginated::new(data, &pagination, total as u64)))
}

#[derive(Debug, sqlx::FromRow)]
struct AvailableRow {
    id: Uuid,
    client_id: Uuid,
    category: String,
    title: String,
    description: String,
    address: String,
    lat: f64,
    lng: f64,
    urgent: bool,
    status: String,
    photo_urls: Vec<String>,
    quote_count: i64,
    distance_km: f64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// GET /api/requests/available
///
/// Open requests within the calling technician's effective radius matching
/// their specialties, nearest first. Urgent requests rank ahead at equal
/// distance.
pub async fn available_requests(
    RequireTechnician(user): RequireTechnician,
    State(state): State<Arc<AppState>>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<impl IntoResponse> {
    let distance = haversine_sql("r.lat", "r.lng");

    let sql = format!(
        r#"
        SELECT {columns}, {distance} AS distance_km
        FROM service_requests r
        JOIN technician_profiles tp ON tp.user_id = $1
        WHERE r.status IN ('pending', 'quoted')
          AND r.category = ANY(tp.specialties)
          AND {distance} <= {radius}
        ORDER BY r.urgent DESC, distance_km ASC
        LIMIT $2 OFFSET $3
        "#,
        columns = REQUEST_COLUMNS,
        distance = distance,
        radius = EFFECTIVE_RADIUS_SQL,
    );

    let rows = sqlx::query_as::<_, AvailableRow>(&sql)
        .bind(user.id)
        .bind(pagination.limit() as i64)
        .bind(pagination.offset() as i64)
        .fetch_all(&state.db)
        .await?;

    let count_sql = format!(
        r#"
        SELECT COUNT(*)
        FROM service_requests r
        JOIN technician_profiles tp ON tp.user_id = $1
        WHERE r.status IN ('pending', 'quoted')
          AND r.category = ANY(tp.specialties)
          AND {distance} <= {radius}
        "#,
        distance = haversine_sql("r.lat", "r.lng"),
        radius = EFFECTIVE_RADIUS_SQL,
    );
    let total: i64 = sqlx::query_scalar(&count_sql)
        .bind(user.id)
        .fetch_one(&state.db)
        .await?;

    let data: Vec<ServiceRequestResponse> = rows
        .into_iter()
        .map(|r| ServiceRequestResponse {
            id: r.id,
            client_id: r.client_id,
            category: r.category,
            title: r.title,
            description: r.description,
            address: r.address,
            lat: r.lat,
            lng: r.lng,
            urgent: r.urgent,
            status: RequestStatus::from_str(&r.status),
            photo_urls: r.photo_urls,
            quote_count: r.quote_count,
            distance_km: Some(r.distance_km),
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
        .collect();

    Ok(Json(Paginated::new(data, &pagination, total as u64)))
}

/// GET /api/requests/:id
///
/// Visible to the owner, to any technician while the request is open, and
/// to technicians holding a quote on it.
pub async fn get_request(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let row = load_request(&state, request_id).await?;
    let status = RequestStatus::from_str(&row.status);

    let visible = if row.client_id == auth.id || status.accepts_quotes() {
        true
    } else {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM quotes WHERE request_id = $1 AND technician_id = $2)",
        )
        .bind(request_id)
        .bind(auth.id)
        .fetch_one(&state.db)
        .await?
    };

    if !visible {
        return Err(ApiError::not_found("Request not found"));
    }

    Ok(Json(DataResponse::new(row.into_response(None))))
}

/// PATCH /api/requests/:id
///
/// Owner-only, while `pending`. Category is immutable. Technicians with a
/// live quote are told the request changed under them.
pub async fn update_request(
    RequireClient(user): RequireClient,
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<Uuid>,
    Json(req): Json<UpdateServiceRequest>,
) -> ApiResult<impl IntoResponse> {
    let row = load_request(&state, request_id).await?;
    if row.client_id != user.id {
        return Err(ApiError::not_found("Request not found"));
    }

    let status = RequestStatus::from_str(&row.status);
    if !status.editable() {
        return Err(ApiError::conflict(format!(
            "Request in state '{}' can no longer be edited",
            status.as_str()
        )));
    }

    if let Some(title) = &req.title {
        if title.trim().len() < CreateServiceRequest::MIN_TITLE_LEN {
            return Err(ApiError::bad_request(format!(
                "Title must be at least {} characters",
                CreateServiceRequest::MIN_TITLE_LEN
            )));
        }
    }
    if let (Some(lat), Some(lng)) = (req.lat, req.lng) {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return Err(ApiError::bad_request("Location coordinates are out of range"));
        }
    } else if req.lat.is_some() != req.lng.is_some() {
        return Err(ApiError::bad_request("lat and lng must be updated together"));
    }

    sqlx::query(
        r#"
        UPDATE service_requests SET
            title = COALESCE($2, title),
            description = COALESCE($3, description),
            address = COALESCE($4, address),
            lat = COALESCE($5, lat),
            lng = COALESCE($6, lng),
            urgent = COALESCE($7, urgent),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(request_id)
    .bind(req.title.as_deref().map(str::trim))
    .bind(req.description.as_deref().map(str::trim))
    .bind(&req.address)
    .bind(req.lat)
    .bind(req.lng)
    .bind(req.urgent)
    .execute(&state.db)
    .await?;

    let updated = load_request(&state, request_id).await?;

    let quoting: Vec<Uuid> = sqlx::query_scalar(
        "SELECT technician_id FROM quotes WHERE request_id = $1 AND status = 'pending'",
    )
    .bind(request_id)
    .fetch_all(&state.db)
    .await?;

    for technician_id in quoting {
        if let Err(e) = notifications::notify_request_updated(
            &state.db,
            &state.hub,
            technician_id,
            request_id,
            &updated.title,
        )
        .await
        {
            tracing::warn!(error = %e, technician_id = %technician_id, "Failed to notify technician");
        }
    }

    Ok(Json(DataResponse::new(updated.into_response(None))))
}

/// POST /api/requests/:id/cancel
///
/// Owner, or the technician engaged through an accepted quote. Terminal:
/// live quotes are cancelled and a not-yet-started job is cancelled with
/// the request. Refused once the job is in progress; from there the job
/// endpoint owns the outcome.
pub async fn cancel_request(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let mut tx = state.db.begin().await?;

    let row = sqlx::query_as::<_, RequestRow>(&format!(
        "SELECT {} FROM service_requests r WHERE r.id = $1 FOR UPDATE OF r",
        REQUEST_COLUMNS
    ))
    .bind(request_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found("Request not found"))?;

    let engaged_technician: Option<Uuid> = sqlx::query_scalar(
        "SELECT technician_id FROM quotes WHERE request_id = $1 AND status = 'accepted'",
    )
    .bind(request_id)
    .fetch_optional(&mut *tx)
    .await?;

    let is_owner = row.client_id == auth.id;
    let is_engaged = engaged_technician == Some(auth.id);
    if !is_owner && !is_engaged {
        return Err(ApiError::not_found("Request not found"));
    }

    let status = RequestStatus::from_str(&row.status);
    if !status.cancellable() {
        return Err(ApiError::conflict(format!(
            "Request in state '{}' cannot be cancelled",
            status.as_str()
        )));
    }

    sqlx::query(
        "UPDATE service_requests SET status = 'cancelled', updated_at = NOW() WHERE id = $1",
    )
    .bind(request_id)
    .execute(&mut *tx)
    .await?;

    let quoting: Vec<Uuid> = sqlx::query_scalar(
        r#"
        UPDATE quotes SET status = 'cancelled', updated_at = NOW()
        WHERE request_id = $1 AND status IN ('pending', 'accepted')
        RETURNING technician_id
        "#,
    )
    .bind(request_id)
    .fetch_all(&mut *tx)
    .await?;

    // A job that has not progressed past en_route dies with the request.
    sqlx::query(
        r#"
        UPDATE jobs SET status = 'cancelled', updated_at = NOW()
        WHERE request_id = $1 AND status IN ('scheduled', 'en_route')
        "#,
    )
    .bind(request_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(request_id = %request_id, cancelled_by = %auth.id, "Request cancelled");

    // Tell everyone except the caller.
    let mut affected: Vec<Uuid> = quoting;
    if is_engaged {
        affected.push(row.client_id);
    }
    for user_id in affected.into_iter().filter(|id| *id != auth.id) {
        if let Err(e) = notifications::notify_request_cancelled(
            &state.db,
            &state.hub,
            user_id,
            request_id,
            &row.title,
        )
        .await
        {
            tracing::warn!(error = %e, user_id = %user_id, "Failed to notify about cancellation");
        }
    }

    Ok(Json(MessageResponse::new("Request cancelled")))
}

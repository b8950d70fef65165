//! Quote workflow
//!
//! Verified technicians submit quotes against open requests; resubmission
//! edits the live quote in place. Acceptance is a single transaction that
//! rejects siblings and schedules the job.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::pagination::{PaginationParams, Paginated};
use crate::api::response::{Created, DataResponse, MessageResponse};
use crate::app::AppState;
use crate::auth::{RequireClient, RequireTechnician, RequireVerifiedTechnician};
use crate::domain::quotes::{LineItem, QuoteResponse, QuoteStatus, SubmitQuoteRequest};
use crate::domain::requests::RequestStatus;
use crate::error::{ApiError, ApiResult};
use crate::services::notifications;

use super::{cents_to_decimal, decimal_to_cents};

#[derive(Debug, sqlx::FromRow)]
struct QuoteRow {
    id: Uuid,
    request_id: Uuid,
    technician_id: Uuid,
    technician_name: Option<String>,
    line_items: serde_json::Value,
    total: Decimal,
    estimated_hours: f64,
    warranty_days: Option<i32>,
    notes: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<QuoteRow> for QuoteResponse {
    fn from(row: QuoteRow) -> Self {
        let line_items: Vec<LineItem> =
            serde_json::from_value(row.line_items).unwrap_or_default();
        Self {
            id: row.id,
            request_id: row.request_id,
            technician_id: row.technician_id,
            technician_name: row.technician_name,
            line_items,
            total_cents: decimal_to_cents(row.total),
            estimated_hours: row.estimated_hours,
            warranty_days: row.warranty_days,
            notes: row.notes,
            status: QuoteStatus::from_str(&row.status),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const QUOTE_COLUMNS: &str = "q.id, q.request_id, q.technician_id, u.full_name AS technician_name, \
     q.line_items, q.total, q.estimated_hours, q.warranty_days, q.notes, q.status, \
     q.created_at, q.updated_at";

#[derive(Debug, sqlx::FromRow)]
struct RequestForQuoteRow {
    client_id: Uuid,
    status: String,
}

/// POST /api/requests/:id/quotes
///
/// Submit or resubmit. A technician holding a pending quote on the request
/// overwrites it; the one-live-quote index backs this up.
pub async fn submit_quote(
    RequireVerifiedTechnician(user): RequireVerifiedTechnician,
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<Uuid>,
    Json(req): Json<SubmitQuoteRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate().map_err(ApiError::bad_request)?;
    let total = cents_to_decimal(req.total_cents());
    let line_items = serde_json::to_value(&req.line_items)
        .map_err(|e| ApiError::internal(format!("Failed to encode line items: {}", e)))?;

    let mut tx = state.db.begin().await?;

    let request = sqlx::query_as::<_, RequestForQuoteRow>(
        "SELECT client_id, status FROM service_requests WHERE id = $1 FOR UPDATE",
    )
    .bind(request_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found("Request not found"))?;

    let status = RequestStatus::from_str(&request.status);
    if !status.accepts_quotes() {
        return Err(ApiError::conflict(format!(
            "Request in state '{}' no longer accepts quotes",
            status.as_str()
        )));
    }

    // The request must fall inside the technician's coverage: matching
    // specialty and within the membership-boosted radius.
    let covered: bool = sqlx::query_scalar(&format!(
        r#"
        SELECT EXISTS(
            SELECT 1
            FROM technician_profiles tp, service_requests r
            WHERE tp.user_id = $1 AND r.id = $2
              AND r.category = ANY(tp.specialties)
              AND {} <= {}
        )
        "#,
        crate::services::matching::haversine_sql("r.lat", "r.lng"),
        crate::services::matching::EFFECTIVE_RADIUS_SQL,
    ))
    .bind(user.id)
    .bind(request_id)
    .fetch_one(&mut *tx)
    .await?;

    if !covered {
        return Err(ApiError::forbidden(
            "Request is outside your specialties or work radius",
        ));
    }

    let existing: Option<Uuid> = sqlx::query_scalar(
        r#"
        SELECT id FROM quotes
        WHERE request_id = $1 AND technician_id = $2 AND status = 'pending'
        FOR UPDATE
        "#,
    )
    .bind(request_id)
    .bind(user.id)
    .fetch_optional(&mut *tx)
    .await?;

    let quote_id = match existing {
        Some(id) => {
            sqlx::query(
                r#"
                UPDATE quotes SET
                    line_items = $2, total = $3, estimated_hours = $4,
                    warranty_days = $5, notes = $6, updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(&line_items)
            .bind(total)
            .bind(req.estimated_hours)
            .bind(req.warranty_days)
            .bind(&req.notes)
            .execute(&mut *tx)
            .await?;
            id
        }
        None => {
            let id = Uuid::new_v4();
            let inserted = sqlx::query(
                r#"
                INSERT INTO quotes
                    (id, request_id, technician_id, line_items, total,
                     estimated_hours, warranty_days, notes)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(id)
            .bind(request_id)
            .bind(user.id)
            .bind(&line_items)
            .bind(total)
            .bind(req.estimated_hours)
            .bind(req.warranty_days)
            .bind(&req.notes)
            .execute(&mut *tx)
            .await;

            if let Err(e) = inserted {
                if super::auth::is_unique_violation(&e) {
                    return Err(ApiError::conflict(
                        "You already have a quote on this request",
                    ));
                }
                return Err(e.into());
            }
            id
        }
    };

    if status == RequestStatus::Pending {
        sqlx::query(
            "UPDATE service_requests SET status = 'quoted', updated_at = NOW() WHERE id = $1",
        )
        .bind(request_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        quote_id = %quote_id,
        request_id = %request_id,
        technician_id = %user.id,
        resubmission = existing.is_some(),
        "Quote submitted"
    );

    if let Err(e) = notifications::notify_quote_received(
        &state.db,
        &state.hub,
        request.client_id,
        request_id,
        quote_id,
        &user.full_name,
        req.total_cents(),
    )
    .await
    {
        tracing::warn!(error = %e, client_id = %request.client_id, "Failed to notify client");
    }

    let quote = load_quote(&state, quote_id).await?;
    Ok(Created(DataResponse::new(QuoteResponse::from(quote))))
}

async fn load_quote(state: &AppState, id: Uuid) -> ApiResult<QuoteRow> {
    let sql = format!(
        "SELECT {} FROM quotes q JOIN users u ON u.id = q.technician_id WHERE q.id = $1",
        QUOTE_COLUMNS
    );
    sqlx::query_as::<_, QuoteRow>(&sql)
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Quote not found"))
}

/// GET /api/requests/:id/quotes
///
/// Owner-only listing, live quotes first, cheapest first within a status.
pub async fn list_request_quotes(
    RequireClient(user): RequireClient,
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let owner: Option<Uuid> =
        sqlx::query_scalar("SELECT client_id FROM service_requests WHERE id = $1")
            .bind(request_id)
            .fetch_optional(&state.db)
            .await?;

    match owner {
        Some(id) if id == user.id => {}
        _ => return Err(ApiError::not_found("Request not found")),
    }

    let sql = format!(
        r#"
        SELECT {}
        FROM quotes q
        JOIN users u ON u.id = q.technician_id
        WHERE q.request_id = $1
        ORDER BY (q.status = 'pending') DESC, q.total ASC
        "#,
        QUOTE_COLUMNS
    );
    let rows = sqlx::query_as::<_, QuoteRow>(&sql)
        .bind(request_id)
        .fetch_all(&state.db)
        .await?;

    let data: Vec<QuoteResponse> = rows.into_iter().map(Into::into).collect();
    Ok(Json(DataResponse::new(data)))
}

/// GET /api/quotes
///
/// The calling technician's quotes, newest first.
pub async fn my_quotes(
    RequireTechnician(user): RequireTechnician,
    State(state): State<Arc<AppState>>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<impl IntoResponse> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM quotes WHERE technician_id = $1")
        .bind(user.id)
        .fetch_one(&state.db)
        .await?;

    let sql = format!(
        r#"
        SELECT {}
        FROM quotes q
        JOIN users u ON u.id = q.technician_id
        WHERE q.technician_id = $1
        ORDER BY q.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
        QUOTE_COLUMNS
    );
    let rows = sqlx::query_as::<_, QuoteRow>(&sql)
        .bind(user.id)
        .bind(pagination.limit() as i64)
        .bind(pagination.offset() as i64)
        .fetch_all(&state.db)
        .await?;

    let data: Vec<QuoteResponse> = rows.into_iter().map(Into::into).collect();
    Ok(Json(Paginated::new(data, &pagination, total as u64)))
}

#[derive(Debug, sqlx::FromRow)]
struct AcceptQuoteRow {
    request_id: Uuid,
    technician_id: Uuid,
    total: Decimal,
    status: String,
    client_id: Uuid,
    request_title: String,
    request_status: String,
}

/// POST /api/quotes/:id/accept
///
/// Owner-only. One transaction: the quote wins, pending siblings are
/// rejected, the request moves to `accepted` and a `scheduled` job is
/// created. Row locks serialize racing accepts; the loser sees a conflict.
pub async fn accept_quote(
    RequireClient(user): RequireClient,
    State(state): State<Arc<AppState>>,
    Path(quote_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let mut tx = state.db.begin().await?;

    let row = sqlx::query_as::<_, AcceptQuoteRow>(
        r#"
        SELECT q.request_id, q.technician_id, q.total, q.status,
               r.client_id, r.title AS request_title, r.status AS request_status
        FROM quotes q
        JOIN service_requests r ON r.id = q.request_id
        WHERE q.id = $1
        FOR UPDATE OF q, r
        "#,
    )
    .bind(quote_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found("Quote not found"))?;

    if row.client_id != user.id {
        return Err(ApiError::not_found("Quote not found"));
    }
    if QuoteStatus::from_str(&row.status) != QuoteStatus::Pending {
        return Err(ApiError::conflict("Quote is no longer pending"));
    }
    let request_status = RequestStatus::from_str(&row.request_status);
    if !request_status.accepts_quotes() {
        return Err(ApiError::conflict(format!(
            "Request in state '{}' cannot accept a quote",
            request_status.as_str()
        )));
    }

    sqlx::query("UPDATE quotes SET status = 'accepted', updated_at = NOW() WHERE id = $1")
        .bind(quote_id)
        .execute(&mut *tx)
        .await?;

    let losers: Vec<Uuid> = sqlx::query_scalar(
        r#"
        UPDATE quotes SET status = 'rejected', updated_at = NOW()
        WHERE request_id = $1 AND id <> $2 AND status = 'pending'
        RETURNING technician_id
        "#,
    )
    .bind(row.request_id)
    .bind(quote_id)
    .fetch_all(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE service_requests SET status = 'accepted', updated_at = NOW() WHERE id = $1",
    )
    .bind(row.request_id)
    .execute(&mut *tx)
    .await?;

    let job_id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO jobs (request_id, quote_id, client_id, technician_id, total)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(row.request_id)
    .bind(quote_id)
    .bind(user.id)
    .bind(row.technician_id)
    .bind(row.total)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        quote_id = %quote_id,
        request_id = %row.request_id,
        job_id = %job_id,
        technician_id = %row.technician_id,
        rejected_siblings = losers.len(),
        "Quote accepted, job scheduled"
    );

    if let Err(e) = notifications::notify_quote_accepted(
        &state.db,
        &state.hub,
        row.technician_id,
        row.request_id,
        job_id,
        &row.request_title,
    )
    .await
    {
        tracing::warn!(error = %e, technician_id = %row.technician_id, "Failed to notify winner");
    }
    for technician_id in losers {
        if let Err(e) = notifications::notify_quote_rejected(
            &state.db,
            &state.hub,
            technician_id,
            row.request_id,
            &row.request_title,
        )
        .await
        {
            tracing::warn!(error = %e, technician_id = %technician_id, "Failed to notify loser");
        }
    }

    let job = super::jobs::load_job_response(&state, job_id).await?;
    Ok(Json(DataResponse::new(job)))
}

/// POST /api/quotes/:id/withdraw
///
/// Technician pulls a pending quote. The request stays `quoted` even when
/// this was the last live quote; new quotes can still arrive.
pub async fn withdraw_quote(
    RequireTechnician(user): RequireTechnician,
    State(state): State<Arc<AppState>>,
    Path(quote_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let owner: Option<(Uuid, String)> = sqlx::query_as(
        "SELECT technician_id, status FROM quotes WHERE id = $1",
    )
    .bind(quote_id)
    .fetch_optional(&state.db)
    .await?;

    let (technician_id, status) = owner.ok_or_else(|| ApiError::not_found("Quote not found"))?;
    if technician_id != user.id {
        return Err(ApiError::not_found("Quote not found"));
    }
    if QuoteStatus::from_str(&status) != QuoteStatus::Pending {
        return Err(ApiError::conflict("Only pending quotes can be withdrawn"));
    }

    let updated = sqlx::query(
        r#"
        UPDATE quotes SET status = 'cancelled', updated_at = NOW()
        WHERE id = $1 AND status = 'pending'
        "#,
    )
    .bind(quote_id)
    .execute(&state.db)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(ApiError::conflict("Only pending quotes can be withdrawn"));
    }

    tracing::info!(quote_id = %quote_id, technician_id = %user.id, "Quote withdrawn");

    Ok(Json(MessageResponse::new("Quote withdrawn")))
}

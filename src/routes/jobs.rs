//! Job lifecycle
//!
//! The job is created by quote acceptance and walks a forward-only state
//! machine. Completion credits the technician's funds ledger and the
//! client's loyalty ledger exactly once.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::pagination::{PaginationParams, Paginated};
use crate::api::response::DataResponse;
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::jobs::{JobResponse, JobStatus, TransitionActor, UpdateJobStatusRequest};
use crate::domain::messages::job_room_key;
use crate::domain::users::Role;
use crate::error::{ApiError, ApiResult};
use crate::services::events::RealtimeEvent;
use crate::services::notifications;

use super::decimal_to_cents;

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    request_id: Uuid,
    quote_id: Uuid,
    client_id: Uuid,
    technician_id: Uuid,
    status: String,
    total: Decimal,
    scheduled_for: Option<DateTime<Utc>>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    dispute_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<JobRow> for JobResponse {
    fn from(row: JobRow) -> Self {
        Self {
            id: row.id,
            request_id: row.request_id,
            quote_id: row.quote_id,
            client_id: row.client_id,
            technician_id: row.technician_id,
            status: JobStatus::from_str(&row.status),
            total_cents: decimal_to_cents(row.total),
            scheduled_for: row.scheduled_for,
            started_at: row.started_at,
            completed_at: row.completed_at,
            dispute_reason: row.dispute_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const JOB_COLUMNS: &str = "id, request_id, quote_id, client_id, technician_id, status, total, \
     scheduled_for, started_at, completed_at, dispute_reason, created_at, updated_at";

pub(crate) async fn load_job_response(state: &AppState, id: Uuid) -> ApiResult<JobResponse> {
    let sql = format!("SELECT {} FROM jobs WHERE id = $1", JOB_COLUMNS);
    let row = sqlx::query_as::<_, JobRow>(&sql)
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Job not found"))?;
    Ok(row.into())
}

#[derive(Debug, Deserialize, Default)]
pub struct JobStatusFilter {
    pub status: Option<JobStatus>,
}

/// GET /api/jobs
///
/// Jobs the caller participates in, on whichever side, newest first.
pub async fn list_jobs(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(filter): Query<JobStatusFilter>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<impl IntoResponse> {
    let status = filter.status.map(|s| s.as_str());

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM jobs
        WHERE (client_id = $1 OR technician_id = $1)
          AND ($2::text IS NULL OR status = $2)
        "#,
    )
    .bind(auth.id)
    .bind(status)
    .fetch_one(&state.db)
    .await?;

    let sql = format!(
        r#"
        SELECT {}
        FROM jobs
        WHERE (client_id = $1 OR technician_id = $1)
          AND ($2::text IS NULL OR status = $2)
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4
        "#,
        JOB_COLUMNS
    );
    let rows = sqlx::query_as::<_, JobRow>(&sql)
        .bind(auth.id)
        .bind(status)
        .bind(pagination.limit() as i64)
        .bind(pagination.offset() as i64)
        .fetch_all(&state.db)
        .await?;

    let data: Vec<JobResponse> = rows.into_iter().map(Into::into).collect();
    Ok(Json(Paginated::new(data, &pagination, total as u64)))
}

/// GET /api/jobs/:id
pub async fn get_job(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let job = load_job_response(&state, job_id).await?;
    if job.client_id != auth.id && job.technician_id != auth.id {
        return Err(ApiError::not_found("Job not found"));
    }
    Ok(Json(DataResponse::new(job)))
}

/// PATCH /api/jobs/:id/status
///
/// Transition rules live in [`JobStatus::transition_actor`]: a missing
/// edge is a conflict, the wrong side driving a real edge is forbidden.
/// The final UPDATE is guarded on the observed status so a concurrent
/// transition surfaces as a conflict rather than a silent overwrite.
pub async fn update_job_status(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
    Json(req): Json<UpdateJobStatusRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut tx = state.db.begin().await?;

    let sql = format!("SELECT {} FROM jobs WHERE id = $1 FOR UPDATE", JOB_COLUMNS);
    let job = sqlx::query_as::<_, JobRow>(&sql)
        .bind(job_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Job not found"))?;

    if job.client_id != auth.id && job.technician_id != auth.id {
        return Err(ApiError::not_found("Job not found"));
    }

    let from = JobStatus::from_str(&job.status);
    let to = req.status;

    let actor = JobStatus::transition_actor(from, to).ok_or_else(|| {
        ApiError::conflict(format!(
            "Job cannot move from '{}' to '{}'",
            from.as_str(),
            to.as_str()
        ))
    })?;

    let caller_role = if auth.id == job.technician_id {
        Role::Technician
    } else {
        Role::Client
    };
    let allowed = match actor {
        TransitionActor::Technician => caller_role == Role::Technician,
        TransitionActor::Client => caller_role == Role::Client,
        TransitionActor::Either => true,
    };
    if !allowed {
        return Err(ApiError::forbidden(format!(
            "Only the {} may move the job to '{}'",
            match actor {
                TransitionActor::Technician => "technician",
                TransitionActor::Client => "client",
                TransitionActor::Either => "participants",
            },
            to.as_str()
        )));
    }

    let dispute_reason = if to == JobStatus::Disputed {
        let reason = req
            .dispute_reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| ApiError::bad_request("Disputing a job requires a reason"))?;
        Some(reason.to_string())
    } else {
        None
    };

    let updated = sqlx::query(
        r#"
        UPDATE jobs SET
            status = $2,
            started_at = CASE WHEN $2 = 'in_progress' THEN NOW() ELSE started_at END,
            completed_at = CASE WHEN $2 = 'completed' THEN NOW() ELSE completed_at END,
            dispute_reason = COALESCE($3, dispute_reason),
            updated_at = NOW()
        WHERE id = $1 AND status = $4
        "#,
    )
    .bind(job_id)
    .bind(to.as_str())
    .bind(&dispute_reason)
    .bind(from.as_str())
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(ApiError::conflict("Job was modified concurrently"));
    }

    match to {
        JobStatus::InProgress => {
            // `AND status <> 'cancelled'`: cancellation is terminal for the
            // request; a job transition racing a cancel must not revive it.
            sqlx::query(
                "UPDATE service_requests SET status = 'in_progress', updated_at = NOW() \
                 WHERE id = $1 AND status <> 'cancelled'",
            )
            .bind(job.request_id)
            .execute(&mut *tx)
            .await?;
        }
        JobStatus::Completed => {
            sqlx::query(
                "UPDATE service_requests SET status = 'completed', updated_at = NOW() \
                 WHERE id = $1 AND status <> 'cancelled'",
            )
            .bind(job.request_id)
            .execute(&mut *tx)
            .await?;

            // Partial unique indexes make both credits idempotent under
            // replayed completion signals.
            sqlx::query(
                r#"
                INSERT INTO ledger_entries (technician_id, job_id, entry_type, amount)
                VALUES ($1, $2, 'job_payout', $3)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(job.technician_id)
            .bind(job_id)
            .bind(job.total)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO loyalty_entries (client_id, job_id, entry_type, points)
                VALUES ($1, $2, 'job_completed', $3)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(job.client_id)
            .bind(job_id)
            .bind(state.settings.loyalty_points_per_completion)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                UPDATE technician_profiles
                SET completed_jobs = completed_jobs + 1, updated_at = NOW()
                WHERE user_id = $1
                "#,
            )
            .bind(job.technician_id)
            .execute(&mut *tx)
            .await?;
        }
        JobStatus::Cancelled => {
            sqlx::query(
                "UPDATE service_requests SET status = 'cancelled', updated_at = NOW() \
                 WHERE id = $1 AND status <> 'completed'",
            )
            .bind(job.request_id)
            .execute(&mut *tx)
            .await?;
        }
        _ => {}
    }

    tx.commit().await?;

    tracing::info!(
        job_id = %job_id,
        from = from.as_str(),
        to = to.as_str(),
        actor = %auth.id,
        "Job transitioned"
    );

    // Realtime fanout to anyone watching the job, then a persisted
    // notification for the counterpart.
    state.hub.publish(
        &job_room_key(job_id),
        RealtimeEvent::new(
            "job_status",
            job_room_key(job_id),
            serde_json::json!({
                "job_id": job_id,
                "status": to.as_str(),
                "changed_by": auth.id,
            }),
        ),
    );

    let counterpart = if auth.id == job.technician_id {
        job.client_id
    } else {
        job.technician_id
    };
    if let Err(e) =
        notifications::notify_job_status(&state.db, &state.hub, counterpart, job_id, to.as_str())
            .await
    {
        tracing::warn!(error = %e, user_id = %counterpart, "Failed to notify counterpart");
    }

    let job = load_job_response(&state, job_id).await?;
    Ok(Json(DataResponse::new(job)))
}

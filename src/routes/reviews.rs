//! Reviews
//!
//! Either participant reviews a completed job, once. Technician aggregate
//! rating is recomputed inside the same transaction as the insert so the
//! public profile never drifts from the review rows.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::pagination::{PaginationParams, Paginated};
use crate::api::response::{Created, DataResponse};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::jobs::JobStatus;
use crate::domain::reviews::{CreateReviewRequest, RespondReviewRequest, ReviewResponse};
use crate::error::{ApiError, ApiResult};
use crate::services::notifications;

use super::auth::is_unique_violation;

#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: Uuid,
    job_id: Uuid,
    author_id: Uuid,
    author_name: Option<String>,
    subject_id: Uuid,
    rating: i16,
    punctuality: Option<i16>,
    quality: Option<i16>,
    comment: Option<String>,
    response: Option<String>,
    responded_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<ReviewRow> for ReviewResponse {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: row.id,
            job_id: row.job_id,
            author_id: row.author_id,
            author_name: row.author_name,
            subject_id: row.subject_id,
            rating: row.rating,
            punctuality: row.punctuality,
            quality: row.quality,
            comment: row.comment,
            response: row.response,
            responded_at: row.responded_at,
            created_at: row.created_at,
        }
    }
}

const REVIEW_COLUMNS: &str = "rv.id, rv.job_id, rv.author_id, u.full_name AS author_name, \
     rv.subject_id, rv.rating, rv.punctuality, rv.quality, rv.comment, rv.response, \
     rv.responded_at, rv.created_at";

#[derive(Debug, sqlx::FromRow)]
struct JobForReview {
    client_id: Uuid,
    technician_id: Uuid,
    status: String,
}

/// POST /api/jobs/:id/review
pub async fn create_review(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
    Json(req): Json<CreateReviewRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate().map_err(ApiError::bad_request)?;

    let job = sqlx::query_as::<_, JobForReview>(
        "SELECT client_id, technician_id, status FROM jobs WHERE id = $1",
    )
    .bind(job_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Job not found"))?;

    let subject_id = if auth.id == job.client_id {
        job.technician_id
    } else if auth.id == job.technician_id {
        job.client_id
    } else {
        return Err(ApiError::not_found("Job not found"));
    };

    if JobStatus::from_str(&job.status) != JobStatus::Completed {
        return Err(ApiError::conflict("Only completed jobs can be reviewed"));
    }

    let mut tx = state.db.begin().await?;

    let review_id = Uuid::new_v4();
    let inserted = sqlx::query(
        r#"
        INSERT INTO reviews (id, job_id, author_id, subject_id, rating, punctuality, quality, comment)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(review_id)
    .bind(job_id)
    .bind(auth.id)
    .bind(subject_id)
    .bind(req.rating)
    .bind(req.punctuality)
    .bind(req.quality)
    .bind(req.comment.as_deref().map(str::trim))
    .execute(&mut *tx)
    .await;

    if let Err(e) = inserted {
        if is_unique_violation(&e) {
            return Err(ApiError::conflict("You already reviewed this job"));
        }
        return Err(e.into());
    }

    // Aggregate only reviews received by the technician; client-side
    // reviews do not feed a public rating.
    if subject_id == job.technician_id {
        sqlx::query(
            r#"
            UPDATE technician_profiles tp SET
                rating_avg = agg.avg,
                rating_count = agg.count,
                updated_at = NOW()
            FROM (
                SELECT AVG(rating)::DOUBLE PRECISION AS avg, COUNT(*) AS count
                FROM reviews WHERE subject_id = $1
            ) agg
            WHERE tp.user_id = $1
            "#,
        )
        .bind(subject_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        review_id = %review_id,
        job_id = %job_id,
        author_id = %auth.id,
        rating = req.rating,
        "Review created"
    );

    if let Err(e) = notifications::notify_review_received(
        &state.db,
        &state.hub,
        subject_id,
        review_id,
        &auth.full_name,
        req.rating,
    )
    .await
    {
        tracing::warn!(error = %e, subject_id = %subject_id, "Failed to notify review subject");
    }

    let review = load_review(&state, review_id).await?;
    Ok(Created(DataResponse::new(review)))
}

async fn load_review(state: &AppState, id: Uuid) -> ApiResult<ReviewResponse> {
    let sql = format!(
        "SELECT {} FROM reviews rv JOIN users u ON u.id = rv.author_id WHERE rv.id = $1",
        REVIEW_COLUMNS
    );
    let row = sqlx::query_as::<_, ReviewRow>(&sql)
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Review not found"))?;
    Ok(row.into())
}

/// POST /api/reviews/:id/response
///
/// Subject-only, once.
pub async fn respond_review(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(review_id): Path<Uuid>,
    Json(req): Json<RespondReviewRequest>,
) -> ApiResult<impl IntoResponse> {
    let response = req.response.trim();
    if response.is_empty() {
        return Err(ApiError::bad_request("Response must not be empty"));
    }

    let row: Option<(Uuid, Option<String>)> =
        sqlx::query_as("SELECT subject_id, response FROM reviews WHERE id = $1")
            .bind(review_id)
            .fetch_optional(&state.db)
            .await?;

    let (subject_id, existing) = row.ok_or_else(|| ApiError::not_found("Review not found"))?;
    if subject_id != auth.id {
        return Err(ApiError::not_found("Review not found"));
    }
    if existing.is_some() {
        return Err(ApiError::conflict("Review already has a response"));
    }

    sqlx::query(
        "UPDATE reviews SET response = $2, responded_at = NOW() WHERE id = $1 AND response IS NULL",
    )
    .bind(review_id)
    .bind(response)
    .execute(&state.db)
    .await?;

    let review = load_review(&state, review_id).await?;
    Ok(Json(DataResponse::new(review)))
}

/// GET /api/technicians/:id/reviews
///
/// Public listing of reviews a technician has received, newest first.
pub async fn technician_reviews(
    State(state): State<Arc<AppState>>,
    Path(technician_id): Path<Uuid>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<impl IntoResponse> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM technician_profiles WHERE user_id = $1)",
    )
    .bind(technician_id)
    .fetch_one(&state.db)
    .await?;
    if !exists {
        return Err(ApiError::not_found("Technician not found"));
    }

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE subject_id = $1")
        .bind(technician_id)
        .fetch_one(&state.db)
        .await?;

    let sql = format!(
        r#"
        SELECT {}
        FROM reviews rv
        JOIN users u ON u.id = rv.author_id
        WHERE rv.subject_id = $1
        ORDER BY rv.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
        REVIEW_COLUMNS
    );
    let rows = sqlx::query_as::<_, ReviewRow>(&sql)
        .bind(technician_id)
        .bind(pagination.limit() as i64)
        .bind(pagination.offset() as i64)
        .fetch_all(&state.db)
        .await?;

    let data: Vec<ReviewResponse> = rows.into_iter().map(Into::into).collect();
    Ok(Json(Paginated::new(data, &pagination, total as u64)))
}

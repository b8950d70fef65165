//! Client loyalty points
//!
//! Balance is the sum of the ledger; there is no mutable counter to drift.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::pagination::PaginationParams;
use crate::api::response::DataResponse;
use crate::app::AppState;
use crate::auth::RequireClient;
use crate::error::ApiResult;

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct LoyaltyEntry {
    pub id: Uuid,
    pub job_id: Option<Uuid>,
    pub entry_type: String,
    pub points: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct LoyaltyBalance {
    pub balance: i64,
    pub entries: Vec<LoyaltyEntry>,
}

/// GET /api/loyalty
pub async fn loyalty_balance(
    RequireClient(user): RequireClient,
    State(state): State<Arc<AppState>>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<impl IntoResponse> {
    let balance: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(points), 0) FROM loyalty_entries WHERE client_id = $1",
    )
    .bind(user.id)
    .fetch_one(&state.db)
    .await?;

    let entries = sqlx::query_as::<_, LoyaltyEntry>(
        r#"
        SELECT id, job_id, entry_type, points, created_at
        FROM loyalty_entries
        WHERE client_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user.id)
    .bind(pagination.limit() as i64)
    .bind(pagination.offset() as i64)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(DataResponse::new(LoyaltyBalance { balance, entries })))
}

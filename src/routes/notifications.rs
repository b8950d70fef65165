//! Notification inbox

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::pagination::{PaginationParams, Paginated};
use crate::api::response::{DataResponse, MessageResponse};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::notifications::NotificationResponse;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    #[sqlx(rename = "type")]
    r#type: String,
    title: String,
    body: Option<String>,
    data: serde_json::Value,
    read: bool,
    created_at: DateTime<Utc>,
}

impl From<NotificationRow> for NotificationResponse {
    fn from(row: NotificationRow) -> Self {
        Self {
            id: row.id,
            r#type: row.r#type,
            title: row.title,
            body: row.body,
            data: row.data,
            read: row.read,
            created_at: row.created_at,
        }
    }
}

/// GET /api/notifications
pub async fn list_notifications(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<impl IntoResponse> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = $1")
        .bind(auth.id)
        .fetch_one(&state.db)
        .await?;

    let rows = sqlx::query_as::<_, NotificationRow>(
        r#"
        SELECT id, type, title, body, data, read, created_at
        FROM notifications
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(auth.id)
    .bind(pagination.limit() as i64)
    .bind(pagination.offset() as i64)
    .fetch_all(&state.db)
    .await?;

    let data: Vec<NotificationResponse> = rows.into_iter().map(Into::into).collect();
    Ok(Json(Paginated::new(data, &pagination, total as u64)))
}

/// GET /api/notifications/unread-count
pub async fn unread_count(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
) -> ApiResult<impl IntoResponse> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT read")
            .bind(auth.id)
            .fetch_one(&state.db)
            .await?;

    Ok(Json(DataResponse::new(serde_json::json!({ "unread": count }))))
}

/// POST /api/notifications/:id/read
pub async fn mark_read(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(notification_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let updated = sqlx::query(
        "UPDATE notifications SET read = TRUE WHERE id = $1 AND user_id = $2",
    )
    .bind(notification_id)
    .bind(auth.id)
    .execute(&state.db)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(ApiError::not_found("Notification not found"));
    }

    Ok(Json(MessageResponse::new("Notification marked read")))
}

/// POST /api/notifications/read-all
pub async fn mark_all_read(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
) -> ApiResult<impl IntoResponse> {
    sqlx::query("UPDATE notifications SET read = TRUE WHERE user_id = $1 AND NOT read")
        .bind(auth.id)
        .execute(&state.db)
        .await?;

    Ok(Json(MessageResponse::new("All notifications marked read")))
}

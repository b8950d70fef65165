//! Chat
//!
//! Direct client/technician threads plus per-job threads. Messages persist
//! first, then fan out to the matching realtime room; the receiver also
//! gets a persisted notification so offline users catch up.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::response::{Created, DataResponse};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::messages::{direct_room_key, job_room_key, SendMessageRequest};
use crate::error::{ApiError, ApiResult};
use crate::services::events::RealtimeEvent;
use crate::services::notifications;

#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    sender_id: Uuid,
    receiver_id: Uuid,
    job_id: Option<Uuid>,
    body: String,
    read: bool,
    read_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<MessageRow> for crate::domain::messages::MessageResponse {
    fn from(row: MessageRow) -> Self {
        Self {
            id: row.id,
            sender_id: row.sender_id,
            receiver_id: row.receiver_id,
            job_id: row.job_id,
            body: row.body,
            read: row.read,
            read_at: row.read_at,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct JobParticipants {
    client_id: Uuid,
    technician_id: Uuid,
}

/// POST /api/messages
pub async fn send_message(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate().map_err(ApiError::bad_request)?;

    // Resolve the receiver and room. A job id addresses the other
    // participant; a receiver id must point at a real, active user.
    let (receiver_id, job_id, room) = match (req.receiver_id, req.job_id) {
        (Some(receiver_id), None) => {
            if receiver_id == auth.id {
                return Err(ApiError::bad_request("Cannot message yourself"));
            }
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM users WHERE id = $1 AND active)",
            )
            .bind(receiver_id)
            .fetch_one(&state.db)
            .await?;
            if !exists {
                return Err(ApiError::not_found("Receiver not found"));
            }
            (receiver_id, None, direct_room_key(auth.id, receiver_id))
        }
        (None, Some(job_id)) => {
            let job = sqlx::query_as::<_, JobParticipants>(
                "SELECT client_id, technician_id FROM jobs WHERE id = $1",
            )
            .bind(job_id)
            .fetch_optional(&state.db)
            .await?
            .ok_or_else(|| ApiError::not_found("Job not found"))?;

            let receiver = if auth.id == job.client_id {
                job.technician_id
            } else if auth.id == job.technician_id {
                job.client_id
            } else {
                return Err(ApiError::not_found("Job not found"));
            };
            (receiver, Some(job_id), job_room_key(job_id))
        }
        // validate() already rejected the other combinations
        _ => return Err(ApiError::bad_request("Exactly one target required")),
    };

    let body = req.body.trim();
    let row = sqlx::query_as::<_, MessageRow>(
        r#"
        INSERT INTO messages (sender_id, receiver_id, job_id, body)
        VALUES ($1, $2, $3, $4)
        RETURNING id, sender_id, receiver_id, job_id, body, read, read_at, created_at
        "#,
    )
    .bind(auth.id)
    .bind(receiver_id)
    .bind(job_id)
    .bind(body)
    .fetch_one(&state.db)
    .await?;

    tracing::debug!(
        message_id = %row.id,
        sender_id = %auth.id,
        receiver_id = %receiver_id,
        job = job_id.is_some(),
        "Message sent"
    );

    state.hub.publish(
        &room,
        RealtimeEvent::new(
            "message",
            room.clone(),
            serde_json::json!({
                "message_id": row.id,
                "sender_id": auth.id,
                "receiver_id": receiver_id,
                "job_id": job_id,
                "body": body,
                "created_at": row.created_at,
            }),
        ),
    );

    if let Err(e) = notifications::notify_new_message(
        &state.db,
        &state.hub,
        receiver_id,
        auth.id,
        &auth.full_name,
    )
    .await
    {
        tracing::warn!(error = %e, receiver_id = %receiver_id, "Failed to notify receiver");
    }

    let response: crate::domain::messages::MessageResponse = row.into();
    Ok(Created(DataResponse::new(response)))
}

#[derive(Debug, Deserialize)]
pub struct ConversationQuery {
    #[serde(default = "default_conversation_limit")]
    pub limit: u32,
}

fn default_conversation_limit() -> u32 {
    50
}

impl ConversationQuery {
    fn limit(&self) -> i64 {
        self.limit.clamp(1, 100) as i64
    }
}

/// GET /api/messages/conversation/:user_id
///
/// Latest window of the direct thread, chronological. Fetching marks the
/// inbound half read.
pub async fn direct_conversation(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(other_id): Path<Uuid>,
    Query(query): Query<ConversationQuery>,
) -> ApiResult<impl IntoResponse> {
    let rows = sqlx::query_as::<_, MessageRow>(
        r#"
        SELECT * FROM (
            SELECT id, sender_id, receiver_id, job_id, body, read, read_at, created_at
            FROM messages
            WHERE job_id IS NULL
              AND ((sender_id = $1 AND receiver_id = $2)
                OR (sender_id = $2 AND receiver_id = $1))
            ORDER BY created_at DESC
            LIMIT $3
        ) window
        ORDER BY created_at ASC
        "#,
    )
    .bind(auth.id)
    .bind(other_id)
    .bind(query.limit())
    .fetch_all(&state.db)
    .await?;

    sqlx::query(
        r#"
        UPDATE messages SET read = TRUE, read_at = NOW()
        WHERE receiver_id = $1 AND sender_id = $2 AND job_id IS NULL AND NOT read
        "#,
    )
    .bind(auth.id)
    .bind(other_id)
    .execute(&state.db)
    .await?;

    let data: Vec<crate::domain::messages::MessageResponse> =
        rows.into_iter().map(Into::into).collect();
    Ok(Json(DataResponse::new(data)))
}

/// GET /api/messages/job/:job_id
pub async fn job_conversation(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<Uuid>,
    Query(query): Query<ConversationQuery>,
) -> ApiResult<impl IntoResponse> {
    let job = sqlx::query_as::<_, JobParticipants>(
        "SELECT client_id, technician_id FROM jobs WHERE id = $1",
    )
    .bind(job_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Job not found"))?;

    if auth.id != job.client_id && auth.id != job.technician_id {
        return Err(ApiError::not_found("Job not found"));
    }

    let rows = sqlx::query_as::<_, MessageRow>(
        r#"
        SELECT * FROM (
            SELECT id, sender_id, receiver_id, job_id, body, read, read_at, created_at
            FROM messages
            WHERE job_id = $1
            ORDER BY created_at DESC
            LIMIT $2
        ) window
        ORDER BY created_at ASC
        "#,
    )
    .bind(job_id)
    .bind(query.limit())
    .fetch_all(&state.db)
    .await?;

    sqlx::query(
        r#"
        UPDATE messages SET read = TRUE, read_at = NOW()
        WHERE job_id = $1 AND receiver_id = $2 AND NOT read
        "#,
    )
    .bind(job_id)
    .bind(auth.id)
    .execute(&state.db)
    .await?;

    let data: Vec<crate::domain::messages::MessageResponse> =
        rows.into_iter().map(Into::into).collect();
    Ok(Json(DataResponse::new(data)))
}

/// GET /api/messages/unread-count
pub async fn unread_count(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
) -> ApiResult<impl IntoResponse> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE receiver_id = $1 AND NOT read")
            .bind(auth.id)
            .fetch_one(&state.db)
            .await?;

    Ok(Json(DataResponse::new(serde_json::json!({ "unread": count }))))
}

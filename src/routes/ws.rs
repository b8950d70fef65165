//! WebSocket endpoint
//!
//! One socket per connection; the client joins rooms explicitly and the
//! hub fans events in. Browsers cannot set headers on the upgrade request,
//! so the token travels as a query parameter. Every connection is placed
//! in its own user room automatically; join requests are authorized before
//! the hub sees them.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::CurrentUser;
use crate::domain::messages::{direct_room_key, user_room_key};
use crate::error::ApiError;
use crate::services::events::RealtimeEvent;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: String,
}

/// Frames the client may send after the upgrade.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame {
    Join { room: String },
    Leave { room: String },
    Typing { room: String },
}

/// GET /api/ws?token=...
pub async fn ws_upgrade(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsQuery>,
    upgrade: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let claims = state
        .tokens
        .verify(&query.token)
        .map_err(|_| ApiError::unauthorized("Invalid token"))?;
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| ApiError::unauthorized("Invalid token"))?;

    let user = sqlx::query_as::<_, CurrentUser>(
        r#"
        SELECT u.id, u.email, u.role, u.full_name, u.active,
               COALESCE(tp.verified, false) AS technician_verified
        FROM users u
        LEFT JOIN technician_profiles tp ON tp.user_id = u.id
        WHERE u.id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::unauthorized("User no longer exists"))?;

    if !user.active {
        return Err(ApiError::unauthorized("User no longer exists"));
    }

    Ok(upgrade.on_upgrade(move |socket| handle_socket(socket, state, user_id)))
}

/// Check that a user may join a room before registering it with the hub.
///
/// Personal room: own id only. Direct room: the pair must contain the
/// user. Job room: the user must be a participant of that job.
async fn authorize_room(state: &AppState, user_id: Uuid, room: &str) -> bool {
    if room == user_room_key(user_id) {
        return true;
    }

    if let Some(pair) = room.strip_prefix("direct:") {
        let mut ids = pair.splitn(2, ':').map(Uuid::parse_str);
        let (Some(Ok(a)), Some(Ok(b))) = (ids.next(), ids.next()) else {
            return false;
        };
        return (a == user_id || b == user_id) && room == direct_room_key(a, b);
    }

    if let Some(id) = room.strip_prefix("job:") {
        let Ok(job_id) = Uuid::parse_str(id) else {
            return false;
        };
        let participant: Result<bool, sqlx::Error> = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM jobs
                WHERE id = $1 AND (client_id = $2 OR technician_id = $2)
            )
            "#,
        )
        .bind(job_id)
        .bind(user_id)
        .fetch_one(&state.db)
        .await;
        return participant.unwrap_or(false);
    }

    false
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user_id: Uuid) {
    let conn_id = Uuid::new_v4();
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<RealtimeEvent>();

    // Every connection hears its own user room without an explicit join.
    state
        .hub
        .join(&user_room_key(user_id), conn_id, user_id, tx.clone());

    tracing::debug!(conn_id = %conn_id, user_id = %user_id, "WebSocket connected");

    let mut writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&event) else {
                continue;
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let reader_state = state.clone();
    let reader_tx = tx;
    let mut reader = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            let Message::Text(text) = message else {
                if matches!(message, Message::Close(_)) {
                    break;
                }
                continue;
            };

            let Ok(frame) = serde_json::from_str::<ClientFrame>(&text) else {
                tracing::debug!(conn_id = %conn_id, "Ignoring malformed frame");
                continue;
            };

            match frame {
                ClientFrame::Join { room } => {
                    if authorize_room(&reader_state, user_id, &room).await {
                        reader_state
                            .hub
                            .join(&room, conn_id, user_id, reader_tx.clone());
                    } else {
                        tracing::debug!(conn_id = %conn_id, room = %room, "Join refused");
                    }
                }
                ClientFrame::Leave { room } => {
                    reader_state.hub.leave(&room, conn_id);
                }
                ClientFrame::Typing { room } => {
                    if !authorize_room(&reader_state, user_id, &room).await {
                        continue;
                    }
                    // Ephemeral: fanned out to the room, never persisted,
                    // and not echoed back to any of the typist's devices.
                    reader_state.hub.publish_except(
                        &room,
                        user_id,
                        RealtimeEvent::new(
                            "typing",
                            room.clone(),
                            serde_json::json!({ "user_id": user_id }),
                        ),
                    );
                }
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    state.hub.leave_all(conn_id);
    tracing::debug!(conn_id = %conn_id, user_id = %user_id, "WebSocket disconnected");
}

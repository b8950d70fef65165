//! Notification service
//!
//! Persists a notification row and pushes the same payload to the
//! recipient's personal realtime room. Routes call the `notify_*` helpers
//! when workflow events occur.

use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::messages::user_room_key;
use crate::domain::notifications::NotificationType;
use crate::services::events::{EventHub, RealtimeEvent};

/// Create a notification for a user and push it over the realtime hub.
pub async fn create_notification(
    db: &PgPool,
    hub: &EventHub,
    user_id: Uuid,
    notification_type: NotificationType,
    title: &str,
    body: Option<&str>,
    data: Option<serde_json::Value>,
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    let type_str = notification_type.as_str();
    let data = data.unwrap_or(serde_json::json!({}));

    sqlx::query(
        r#"
        INSERT INTO notifications (id, user_id, type, title, body, data)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(type_str)
    .bind(title)
    .bind(body)
    .bind(&data)
    .execute(db)
    .await?;

    hub.publish(
        &user_room_key(user_id),
        RealtimeEvent::new(
            type_str,
            user_room_key(user_id),
            serde_json::json!({
                "notification_id": id,
                "title": title,
                "body": body,
                "data": data,
            }),
        ),
    );

    tracing::info!(
        user_id = %user_id,
        notification_type = %type_str,
        notification_id = %id,
        "Notification created"
    );

    Ok(id)
}

/// Notify a nearby technician about a new matching request.
pub async fn notify_request_nearby(
    db: &PgPool,
    hub: &EventHub,
    technician_id: Uuid,
    request_id: Uuid,
    title: &str,
    category: &str,
    distance_km: f64,
) -> Result<Uuid, sqlx::Error> {
    create_notification(
        db,
        hub,
        technician_id,
        NotificationType::RequestNearby,
        &format!("New {} request near you", category),
        Some(&format!("'{}' was posted {:.1} km from your base", title, distance_km)),
        Some(serde_json::json!({
            "request_id": request_id,
            "category": category,
            "distance_km": distance_km,
        })),
    )
    .await
}

/// Notify the client that a technician quoted their request.
pub async fn notify_quote_received(
    db: &PgPool,
    hub: &EventHub,
    client_id: Uuid,
    request_id: Uuid,
    quote_id: Uuid,
    technician_name: &str,
    total_cents: i64,
) -> Result<Uuid, sqlx::Error> {
    create_notification(
        db,
        hub,
        client_id,
        NotificationType::QuoteReceived,
        &format!("New quote from {}", technician_name),
        Some(&format!(
            "{} quoted ${:.2} for your request",
            technician_name,
            total_cents as f64 / 100.0
        )),
        Some(serde_json::json!({
            "request_id": request_id,
            "quote_id": quote_id,
            "technician_name": technician_name,
            "total_cents": total_cents,
        })),
    )
    .await
}

/// Notify a technician that their quote was accepted and a job created.
pub async fn notify_quote_accepted(
    db: &PgPool,
    hub: &EventHub,
    technician_id: Uuid,
    request_id: Uuid,
    job_id: Uuid,
    request_title: &str,
) -> Result<Uuid, sqlx::Error> {
    create_notification(
        db,
        hub,
        technician_id,
        NotificationType::QuoteAccepted,
        "Your quote was accepted!",
        Some(&format!(
            "The client accepted your quote for '{}'. A job has been scheduled.",
            request_title
        )),
        Some(serde_json::json!({
            "request_id": request_id,
            "job_id": job_id,
        })),
    )
    .await
}

/// Notify a technician that a competing quote won.
pub async fn notify_quote_rejected(
    db: &PgPool,
    hub: &EventHub,
    technician_id: Uuid,
    request_id: Uuid,
    request_title: &str,
) -> Result<Uuid, sqlx::Error> {
    create_notification(
        db,
        hub,
        technician_id,
        NotificationType::QuoteRejected,
        "Quote not selected",
        Some(&format!("Your quote for '{}' was not selected.", request_title)),
        Some(serde_json::json!({
            "request_id": request_id,
        })),
    )
    .await
}

/// Notify a technician with a live quote that the request changed.
pub async fn notify_request_updated(
    db: &PgPool,
    hub: &EventHub,
    technician_id: Uuid,
    request_id: Uuid,
    request_title: &str,
) -> Result<Uuid, sqlx::Error> {
    create_notification(
        db,
        hub,
        technician_id,
        NotificationType::RequestUpdated,
        "Request updated",
        Some(&format!(
            "'{}' was edited by the client. Review your quote.",
            request_title
        )),
        Some(serde_json::json!({
            "request_id": request_id,
        })),
    )
    .await
}

/// Notify the other party that a request was cancelled.
pub async fn notify_request_cancelled(
    db: &PgPool,
    hub: &EventHub,
    user_id: Uuid,
    request_id: Uuid,
    request_title: &str,
) -> Result<Uuid, sqlx::Error> {
    create_notification(
        db,
        hub,
        user_id,
        NotificationType::RequestCancelled,
        "Request cancelled",
        Some(&format!("'{}' was cancelled.", request_title)),
        Some(serde_json::json!({
            "request_id": request_id,
        })),
    )
    .await
}

/// Notify the counterpart that a job changed state.
pub async fn notify_job_status(
    db: &PgPool,
    hub: &EventHub,
    user_id: Uuid,
    job_id: Uuid,
    status: &str,
) -> Result<Uuid, sqlx::Error> {
    create_notification(
        db,
        hub,
        user_id,
        NotificationType::JobStatusChanged,
        &format!("Job is now {}", status.replace('_', " ")),
        None,
        Some(serde_json::json!({
            "job_id": job_id,
            "status": status,
        })),
    )
    .await
}

/// Notify a receiver about a new chat message.
pub async fn notify_new_message(
    db: &PgPool,
    hub: &EventHub,
    receiver_id: Uuid,
    sender_id: Uuid,
    sender_name: &str,
) -> Result<Uuid, sqlx::Error> {
    create_notification(
        db,
        hub,
        receiver_id,
        NotificationType::NewMessage,
        &format!("New message from {}", sender_name),
        None,
        Some(serde_json::json!({
            "sender_id": sender_id,
            "sender_name": sender_name,
        })),
    )
    .await
}

/// Notify a technician about a received review.
pub async fn notify_review_received(
    db: &PgPool,
    hub: &EventHub,
    subject_id: Uuid,
    review_id: Uuid,
    reviewer_name: &str,
    rating: i16,
) -> Result<Uuid, sqlx::Error> {
    create_notification(
        db,
        hub,
        subject_id,
        NotificationType::ReviewReceived,
        &format!("New review from {}", reviewer_name),
        Some(&format!("{} left you a {}-star review.", reviewer_name, rating)),
        Some(serde_json::json!({
            "review_id": review_id,
            "rating": rating,
        })),
    )
    .await
}

//! HTTP route handlers

use axum::{
    extract::{DefaultBodyLimit, State},
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::app::AppState;

pub mod auth;
pub mod jobs;
pub mod loyalty;
pub mod memberships;
pub mod messages;
pub mod notifications;
pub mod profile;
pub mod quotes;
pub mod requests;
pub mod reviews;
pub mod technicians;
pub mod uploads;
pub mod ws;

/// Money columns are NUMERIC(12,2); the API speaks integer cents.
pub(crate) fn decimal_to_cents(d: Decimal) -> i64 {
    (d * Decimal::from(100)).round().to_i64().unwrap_or(0)
}

pub(crate) fn cents_to_decimal(cents: i64) -> Decimal {
    Decimal::from(cents) / Decimal::from(100)
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database = crate::db::health_check(&state.db).await;
    let status = if database {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(serde_json::json!({
            "status": if database { "ok" } else { "unavailable" },
            "database": database,
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}

/// All API routes, nested under `/api` by the app builder.
pub fn api_router() -> Router<Arc<AppState>> {
    // The multipart limit covers 10 files of 5 MB plus framing overhead;
    // per-file size is enforced in the handler.
    let upload_routes = Router::new()
        .route("/uploads", post(uploads::upload_photos))
        .layer(DefaultBodyLimit::max(60 * 1024 * 1024));

    Router::new()
        .route("/health", get(health))
        // Auth and profile
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/me", get(auth::get_me))
        .route("/profile", patch(profile::update_profile))
        .route("/profile/technician", patch(profile::update_technician_profile))
        // Service requests
        .route("/requests", post(requests::create_request).get(requests::list_my_requests))
        .route("/requests/available", get(requests::available_requests))
        .route(
            "/requests/:id",
            get(requests::get_request).patch(requests::update_request),
        )
        .route("/requests/:id/cancel", post(requests::cancel_request))
        .route(
            "/requests/:id/quotes",
            post(quotes::submit_quote).get(quotes::list_request_quotes),
        )
        // Quotes
        .route("/quotes", get(quotes::my_quotes))
        .route("/quotes/:id/accept", post(quotes::accept_quote))
        .route("/quotes/:id/withdraw", post(quotes::withdraw_quote))
        // Jobs
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/:id", get(jobs::get_job))
        .route("/jobs/:id/status", patch(jobs::update_job_status))
        .route("/jobs/:id/review", post(reviews::create_review))
        // Chat
        .route("/messages", post(messages::send_message))
        .route("/messages/unread-count", get(messages::unread_count))
        .route(
            "/messages/conversation/:user_id",
            get(messages::direct_conversation),
        )
        .route("/messages/job/:job_id", get(messages::job_conversation))
        // Reviews
        .route("/reviews/:id/response", post(reviews::respond_review))
        // Technician discovery
        .route("/technicians/nearby", get(technicians::nearby_technicians))
        .route("/technicians/:id", get(technicians::get_technician))
        .route("/technicians/:id/reviews", get(reviews::technician_reviews))
        // Loyalty and memberships
        .route("/loyalty", get(loyalty::loyalty_balance))
        .route("/memberships/tiers", get(memberships::list_tiers))
        .route("/memberships/current", get(memberships::current_membership))
        .route("/memberships/subscribe", post(memberships::subscribe))
        // Notifications
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/:id/read", post(notifications::mark_read))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        // Realtime
        .route("/ws", get(ws::ws_upgrade))
        .merge(upload_routes)
}

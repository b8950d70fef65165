//! Technician memberships
//!
//! The monthly fee is debited from the technician's funds ledger at
//! subscribe time. The profile row lock serializes concurrent subscribes
//! so the balance check and the debit cannot interleave.

use axum::{extract::State, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::response::DataResponse;
use crate::app::AppState;
use crate::auth::RequireTechnician;
use crate::domain::memberships::{MembershipTier, SubscribeRequest, TierInfo};
use crate::domain::notifications::NotificationType;
use crate::error::{ApiError, ApiResult};
use crate::services::notifications;

use super::{cents_to_decimal, decimal_to_cents};

/// GET /api/memberships/tiers
pub async fn list_tiers() -> impl IntoResponse {
    Json(DataResponse::new(TierInfo::all()))
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub job_id: Option<Uuid>,
    pub entry_type: String,
    pub amount_cents: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct MembershipStatus {
    pub tier: MembershipTier,
    pub monthly_fee_cents: i64,
    pub radius_bonus_km: f64,
    pub funds_balance_cents: i64,
    pub recent_entries: Vec<LedgerEntry>,
}

#[derive(Debug, sqlx::FromRow)]
struct RawLedgerEntry {
    id: Uuid,
    job_id: Option<Uuid>,
    entry_type: String,
    amount: Decimal,
    created_at: DateTime<Utc>,
}

async fn funds_balance_cents(
    db: impl sqlx::PgExecutor<'_>,
    technician_id: Uuid,
) -> Result<i64, sqlx::Error> {
    let balance: Decimal = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount), 0) FROM ledger_entries WHERE technician_id = $1",
    )
    .bind(technician_id)
    .fetch_one(db)
    .await?;
    Ok(decimal_to_cents(balance))
}

/// GET /api/memberships/current
pub async fn current_membership(
    RequireTechnician(user): RequireTechnician,
    State(state): State<Arc<AppState>>,
) -> ApiResult<impl IntoResponse> {
    let tier_str: String =
        sqlx::query_scalar("SELECT membership_tier FROM technician_profiles WHERE user_id = $1")
            .bind(user.id)
            .fetch_one(&state.db)
            .await?;
    let tier = MembershipTier::from_str(&tier_str);

    let balance = funds_balance_cents(&state.db, user.id).await?;

    let raw = sqlx::query_as::<_, RawLedgerEntry>(
        r#"
        SELECT id, job_id, entry_type, amount, created_at
        FROM ledger_entries
        WHERE technician_id = $1
        ORDER BY created_at DESC
        LIMIT 20
        "#,
    )
    .bind(user.id)
    .fetch_all(&state.db)
    .await?;

    let recent_entries = raw
        .into_iter()
        .map(|e| LedgerEntry {
            id: e.id,
            job_id: e.job_id,
            entry_type: e.entry_type,
            amount_cents: decimal_to_cents(e.amount),
            created_at: e.created_at,
        })
        .collect();

    Ok(Json(DataResponse::new(MembershipStatus {
        tier,
        monthly_fee_cents: tier.monthly_fee_cents(),
        radius_bonus_km: tier.radius_bonus_km(),
        funds_balance_cents: balance,
        recent_entries,
    })))
}

/// POST /api/memberships/subscribe
///
/// Switching to `free` is always allowed and charges nothing. Paid tiers
/// require the fee to be covered by the current funds balance.
pub async fn subscribe(
    RequireTechnician(user): RequireTechnician,
    State(state): State<Arc<AppState>>,
    Json(req): Json<SubscribeRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut tx = state.db.begin().await?;

    let current: String = sqlx::query_scalar(
        "SELECT membership_tier FROM technician_profiles WHERE user_id = $1 FOR UPDATE",
    )
    .bind(user.id)
    .fetch_one(&mut *tx)
    .await?;
    let current = MembershipTier::from_str(&current);

    if current == req.tier {
        return Err(ApiError::conflict(format!(
            "Already on the '{}' tier",
            req.tier.as_str()
        )));
    }

    let fee_cents = req.tier.monthly_fee_cents();
    if fee_cents > 0 {
        let balance = funds_balance_cents(&mut *tx, user.id).await?;
        if balance < fee_cents {
            return Err(ApiError::conflict(format!(
                "Insufficient funds: the '{}' tier costs ${:.2}",
                req.tier.as_str(),
                fee_cents as f64 / 100.0
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO ledger_entries (technician_id, entry_type, amount)
            VALUES ($1, 'membership_fee', $2)
            "#,
        )
        .bind(user.id)
        .bind(-cents_to_decimal(fee_cents))
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query(
        "UPDATE technician_profiles SET membership_tier = $2, updated_at = NOW() WHERE user_id = $1",
    )
    .bind(user.id)
    .bind(req.tier.as_str())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        technician_id = %user.id,
        from = current.as_str(),
        to = req.tier.as_str(),
        fee_cents,
        "Membership changed"
    );

    if let Err(e) = notifications::create_notification(
        &state.db,
        &state.hub,
        user.id,
        NotificationType::MembershipChanged,
        &format!("You are now on the '{}' tier", req.tier.as_str()),
        None,
        Some(serde_json::json!({
            "tier": req.tier.as_str(),
            "fee_cents": fee_cents,
        })),
    )
    .await
    {
        tracing::warn!(error = %e, technician_id = %user.id, "Failed to create notification");
    }

    Ok(Json(DataResponse::new(TierInfo {
        tier: req.tier,
        monthly_fee_cents: fee_cents,
        radius_bonus_km: req.tier.radius_bonus_km(),
    })))
}

//! Billing cycle handlers.

use axum::extract::{Json, State};
use chrono::Utc;

use crate::dtos::{
    BillingRunResponse, CommandRetryResponse, ProRataRequest, ProRataResponse,
    SuspensionRunResponse,
};
use crate::services::billing::calculate_prorata;
use crate::startup::AppState;
use service_core::error::AppError;

/// Compute a pro-rata amount without touching any state.
///
/// POST /billing/calculate-prorata
pub async fn calculate_prorata_handler(
    Json(req): Json<ProRataRequest>,
) -> Result<Json<ProRataResponse>, AppError> {
    let result = calculate_prorata(
        req.active_date,
        req.package_price,
        req.active_period,
        &req.active_period_unit,
    );

    Ok(Json(ProRataResponse {
        is_pro_rata_applied: result.is_pro_rata_applied,
        pro_rata_amount: result.pro_rata_amount,
        remaining_days: result.remaining_days,
        days_in_month: result.days_in_month,
    }))
}

/// Run the monthly billing cycle. Idempotent per customer per calendar
/// month.
///
/// POST /billing/generate-monthly-bills
pub async fn generate_monthly_bills(
    State(state): State<AppState>,
) -> Result<Json<BillingRunResponse>, AppError> {
    let outcome = state.engine.generate_monthly_bills(Utc::now()).await?;

    Ok(Json(BillingRunResponse {
        generated: outcome.bills.len(),
        skipped: outcome.skipped,
        failed: outcome.failed,
        bills: outcome.bills,
    }))
}

/// Run the overdue suspension sweep. No-op outside the configured day.
///
/// POST /billing/suspend-overdue
pub async fn suspend_overdue(
    State(state): State<AppState>,
) -> Result<Json<SuspensionRunResponse>, AppError> {
    let outcome = state.engine.suspend_overdue(Utc::now()).await?;

    Ok(Json(SuspensionRunResponse {
        is_suspension_day: outcome.is_suspension_day,
        suspended: outcome.suspended.len(),
        failed: outcome.failed,
        customers: outcome.suspended,
    }))
}

/// Redeliver router commands that have not been confirmed.
///
/// POST /billing/retry-router-commands
pub async fn retry_router_commands(
    State(state): State<AppState>,
) -> Result<Json<CommandRetryResponse>, AppError> {
    let outcome = state.engine.retry_router_commands().await?;

    Ok(Json(CommandRetryResponse {
        confirmed: outcome.confirmed,
        failed: outcome.failed,
        skipped: outcome.skipped,
    }))
}

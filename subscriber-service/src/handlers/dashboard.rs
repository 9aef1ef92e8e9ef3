//! Dashboard summary handler.

use axum::extract::{Json, State};
use chrono::Utc;

use crate::models::DashboardSummary;
use crate::startup::AppState;
use service_core::error::AppError;

/// Aggregate customer and billing counts for the dashboard.
///
/// GET /dashboard/summary
pub async fn summary(State(state): State<AppState>) -> Result<Json<DashboardSummary>, AppError> {
    let month_start = state.engine.month_start_utc(Utc::now())?;
    let summary = state.db.dashboard_summary(month_start).await?;
    Ok(Json(summary))
}

//! Distribution point (ODP) handlers.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use uuid::Uuid;
use validator::Validate;

use crate::dtos::CreateOdpRequest;
use crate::models::{CreateOdp, Odp};
use crate::startup::AppState;
use service_core::error::AppError;

/// Create a distribution point.
///
/// POST /odps
pub async fn create_odp(
    State(state): State<AppState>,
    Json(req): Json<CreateOdpRequest>,
) -> Result<(StatusCode, Json<Odp>), AppError> {
    req.validate()?;

    let odp = state
        .db
        .create_odp(&CreateOdp {
            name: req.name,
            location: req.location,
            area: req.area,
            total_slots: req.total_slots,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(odp)))
}

/// Get a distribution point by ID.
///
/// GET /odps/:id
pub async fn get_odp(
    State(state): State<AppState>,
    Path(odp_id): Path<Uuid>,
) -> Result<Json<Odp>, AppError> {
    let odp = state
        .db
        .get_odp(odp_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("ODP not found")))?;

    Ok(Json(odp))
}

/// List distribution points.
///
/// GET /odps
pub async fn list_odps(State(state): State<AppState>) -> Result<Json<Vec<Odp>>, AppError> {
    let odps = state.db.list_odps().await?;
    Ok(Json(odps))
}

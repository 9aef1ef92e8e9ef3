//! Router inventory handlers.

use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use validator::Validate;

use crate::dtos::CreateRouterRequest;
use crate::models::{CreateRouter, Router};
use crate::startup::AppState;
use service_core::error::AppError;

/// Register a router.
///
/// POST /routers
pub async fn create_router(
    State(state): State<AppState>,
    Json(req): Json<CreateRouterRequest>,
) -> Result<(StatusCode, Json<Router>), AppError> {
    req.validate()?;

    let router = state
        .db
        .create_router(&CreateRouter {
            name: req.name,
            ip_address: req.ip_address,
            area: req.area,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(router)))
}

/// List routers.
///
/// GET /routers
pub async fn list_routers(State(state): State<AppState>) -> Result<Json<Vec<Router>>, AppError> {
    let routers = state.db.list_routers().await?;
    Ok(Json(routers))
}

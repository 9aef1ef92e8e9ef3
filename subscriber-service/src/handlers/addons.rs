//! Add-on line item handlers.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use uuid::Uuid;
use validator::Validate;

use crate::dtos::{CreateAddonRequest, UpdateAddonRequest};
use crate::models::{AddonItem, CreateAddon, UpdateAddon};
use crate::startup::AppState;
use service_core::error::AppError;

/// Create an add-on for a customer.
///
/// POST /customers/:id/addons
pub async fn create_addon(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
    Json(req): Json<CreateAddonRequest>,
) -> Result<(StatusCode, Json<AddonItem>), AppError> {
    req.validate()?;

    let addon = state
        .db
        .create_addon(&CreateAddon {
            customer_id,
            item_name: req.item_name,
            item_type: req.item_type,
            price: req.price,
            quantity: req.quantity,
            description: req.description,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(addon)))
}

/// List a customer's active add-ons.
///
/// GET /customers/:id/addons
pub async fn list_addons(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
) -> Result<Json<Vec<AddonItem>>, AppError> {
    state
        .db
        .get_customer(customer_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Customer not found")))?;

    let addons = state.db.list_customer_addons(customer_id).await?;
    Ok(Json(addons))
}

/// Update an active add-on.
///
/// PUT /addons/:id
pub async fn update_addon(
    State(state): State<AppState>,
    Path(addon_id): Path<Uuid>,
    Json(req): Json<UpdateAddonRequest>,
) -> Result<Json<AddonItem>, AppError> {
    req.validate()?;

    let addon = state
        .db
        .update_addon(
            addon_id,
            &UpdateAddon {
                item_name: req.item_name,
                price: req.price,
                quantity: req.quantity,
                description: req.description,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Add-on not found")))?;

    Ok(Json(addon))
}

/// Deactivate an add-on. The row stays for billing history.
///
/// DELETE /addons/:id
pub async fn deactivate_addon(
    State(state): State<AppState>,
    Path(addon_id): Path<Uuid>,
) -> Result<Json<AddonItem>, AppError> {
    let addon = state
        .db
        .deactivate_addon(addon_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Add-on not found")))?;

    Ok(Json(addon))
}

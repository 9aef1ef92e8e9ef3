//! Customer subscription handlers, including the ODP slot operations.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use uuid::Uuid;
use validator::Validate;

use crate::dtos::{AttachOdpRequest, CreateCustomerRequest, MoveOdpRequest, UpdateCustomerRequest};
use crate::models::{
    BillTransaction, CreateCustomer, Customer, InstallationStatus, UpdateCustomer,
};
use crate::startup::AppState;
use service_core::error::AppError;

/// Create a customer, optionally reserving an ODP slot.
///
/// POST /customers
pub async fn create_customer(
    State(state): State<AppState>,
    Json(req): Json<CreateCustomerRequest>,
) -> Result<(StatusCode, Json<Customer>), AppError> {
    req.validate()?;

    let customer = state
        .db
        .create_customer(&CreateCustomer {
            name: req.name,
            address: req.address,
            phone: req.phone,
            package_name: req.package_name,
            package_price: req.package_price,
            discount: req.discount,
            active_date: req.active_date,
            active_period: req.active_period,
            active_period_unit: req.active_period_unit,
            installation_status: req
                .installation_status
                .unwrap_or(InstallationStatus::NotInstalled),
            odp_id: req.odp_id,
            router_name: req.router_name,
            ppp_secret: req.ppp_secret,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(customer)))
}

/// Get a customer by ID.
///
/// GET /customers/:id
pub async fn get_customer(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
) -> Result<Json<Customer>, AppError> {
    let customer = state
        .db
        .get_customer(customer_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Customer not found")))?;

    Ok(Json(customer))
}

/// List customers.
///
/// GET /customers
pub async fn list_customers(
    State(state): State<AppState>,
) -> Result<Json<Vec<Customer>>, AppError> {
    let customers = state.db.list_customers().await?;
    Ok(Json(customers))
}

/// Update a customer's subscription fields.
///
/// PUT /customers/:id
pub async fn update_customer(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
    Json(req): Json<UpdateCustomerRequest>,
) -> Result<Json<Customer>, AppError> {
    req.validate()?;

    let customer = state
        .db
        .update_customer(
            customer_id,
            &UpdateCustomer {
                name: req.name,
                address: req.address,
                phone: req.phone,
                package_name: req.package_name,
                package_price: req.package_price,
                discount: req.discount,
                active_date: req.active_date,
                service_status: req.service_status,
                installation_status: req.installation_status,
                router_name: req.router_name,
                ppp_secret: req.ppp_secret,
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Customer not found")))?;

    Ok(Json(customer))
}

/// Delete a customer, returning its ODP slot.
///
/// DELETE /customers/:id
pub async fn delete_customer(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.db.delete_customer(customer_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Attach a customer to an ODP.
///
/// POST /customers/:id/odp/attach
pub async fn attach_odp(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
    Json(req): Json<AttachOdpRequest>,
) -> Result<Json<Customer>, AppError> {
    let customer = state
        .db
        .attach_customer_to_odp(customer_id, req.odp_id)
        .await?;
    Ok(Json(customer))
}

/// Move a customer to another ODP.
///
/// POST /customers/:id/odp/move
pub async fn move_odp(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
    Json(req): Json<MoveOdpRequest>,
) -> Result<Json<Customer>, AppError> {
    let customer = state
        .db
        .move_customer_odp(customer_id, req.new_odp_id)
        .await?;
    Ok(Json(customer))
}

/// Detach a customer from its ODP.
///
/// POST /customers/:id/odp/detach
pub async fn detach_odp(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
) -> Result<Json<Customer>, AppError> {
    let customer = state.db.detach_customer_from_odp(customer_id).await?;
    Ok(Json(customer))
}

/// List a customer's billing transactions.
///
/// GET /customers/:id/transactions
pub async fn list_transactions(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
) -> Result<Json<Vec<BillTransaction>>, AppError> {
    state
        .db
        .get_customer(customer_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Customer not found")))?;

    let transactions = state.db.list_customer_transactions(customer_id).await?;
    Ok(Json(transactions))
}

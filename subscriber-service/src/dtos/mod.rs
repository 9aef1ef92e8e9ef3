//! Request and response bodies for the HTTP API.

use crate::models::{AddonType, BillTransaction, Customer, InstallationStatus, ServiceStatus};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

fn default_quantity() -> i32 {
    1
}

fn default_active_period() -> i32 {
    1
}

fn default_period_unit() -> String {
    "months".to_string()
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOdpRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub location: Option<String>,
    pub area: Option<String>,
    #[validate(range(min = 1, max = 256))]
    pub total_slots: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRouterRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 64))]
    pub ip_address: String,
    pub area: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCustomerRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub package_name: String,
    pub package_price: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    pub active_date: Option<NaiveDate>,
    #[serde(default = "default_active_period")]
    pub active_period: i32,
    #[serde(default = "default_period_unit")]
    pub active_period_unit: String,
    pub installation_status: Option<InstallationStatus>,
    pub odp_id: Option<Uuid>,
    pub router_name: Option<String>,
    pub ppp_secret: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateCustomerRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub package_name: Option<String>,
    pub package_price: Option<Decimal>,
    pub discount: Option<Decimal>,
    pub active_date: Option<NaiveDate>,
    pub service_status: Option<ServiceStatus>,
    pub installation_status: Option<InstallationStatus>,
    pub router_name: Option<String>,
    pub ppp_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AttachOdpRequest {
    pub odp_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct MoveOdpRequest {
    pub new_odp_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAddonRequest {
    #[validate(length(min = 1, max = 200))]
    pub item_name: String,
    pub item_type: AddonType,
    pub price: Decimal,
    #[serde(default = "default_quantity")]
    #[validate(range(min = 1))]
    pub quantity: i32,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateAddonRequest {
    #[validate(length(min = 1, max = 200))]
    pub item_name: Option<String>,
    pub price: Option<Decimal>,
    #[validate(range(min = 1))]
    pub quantity: Option<i32>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProRataRequest {
    pub active_date: NaiveDate,
    pub package_price: Decimal,
    #[serde(default = "default_active_period")]
    pub active_period: i32,
    #[serde(default = "default_period_unit")]
    pub active_period_unit: String,
}

#[derive(Debug, Serialize)]
pub struct ProRataResponse {
    pub is_pro_rata_applied: bool,
    pub pro_rata_amount: Decimal,
    pub remaining_days: i64,
    pub days_in_month: i64,
}

#[derive(Debug, Serialize)]
pub struct BillingRunResponse {
    pub generated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub bills: Vec<BillTransaction>,
}

#[derive(Debug, Serialize)]
pub struct SuspensionRunResponse {
    pub is_suspension_day: bool,
    pub suspended: usize,
    pub failed: usize,
    pub customers: Vec<Customer>,
}

#[derive(Debug, Serialize)]
pub struct CommandRetryResponse {
    pub confirmed: usize,
    pub failed: usize,
    pub skipped: usize,
}

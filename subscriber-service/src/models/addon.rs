//! Billable add-on line items tied to a customer.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// How an add-on recurs on the customer's bill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddonType {
    Monthly,
    OneTime,
}

impl AddonType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddonType::Monthly => "monthly",
            AddonType::OneTime => "one_time",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "one_time" => AddonType::OneTime,
            _ => AddonType::Monthly,
        }
    }
}

/// Lifecycle state of an add-on. Deactivated items are kept for history
/// but excluded from billing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddonState {
    Active,
    Deactivated,
}

impl AddonState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddonState::Active => "active",
            AddonState::Deactivated => "deactivated",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "deactivated" => AddonState::Deactivated,
            _ => AddonState::Active,
        }
    }
}

/// A billable line item. Monthly items recur every cycle; one-time items
/// bill once and are then marked paid.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AddonItem {
    pub addon_id: Uuid,
    pub customer_id: Uuid,
    pub item_name: String,
    pub item_type: String,
    pub price: Decimal,
    pub quantity: i32,
    pub is_paid: bool,
    pub state: String,
    pub description: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Input for creating an add-on.
#[derive(Debug, Clone)]
pub struct CreateAddon {
    pub customer_id: Uuid,
    pub item_name: String,
    pub item_type: AddonType,
    pub price: Decimal,
    pub quantity: i32,
    pub description: Option<String>,
}

/// Partial update for an add-on.
#[derive(Debug, Clone, Default)]
pub struct UpdateAddon {
    pub item_name: Option<String>,
    pub price: Option<Decimal>,
    pub quantity: Option<i32>,
    pub description: Option<String>,
}

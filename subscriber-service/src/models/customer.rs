//! Customer model and subscription state.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Payment state of a customer's current billing cycle.
///
/// Transitions: `lunas -> belum_lunas` (new bill), `belum_lunas -> suspend`
/// (overdue), `suspend -> lunas` and `belum_lunas -> lunas` (payment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingStatus {
    Lunas,
    BelumLunas,
    Suspend,
}

impl BillingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingStatus::Lunas => "lunas",
            BillingStatus::BelumLunas => "belum_lunas",
            BillingStatus::Suspend => "suspend",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "belum_lunas" => BillingStatus::BelumLunas,
            "suspend" => BillingStatus::Suspend,
            _ => BillingStatus::Lunas,
        }
    }

    /// Whether `next` is a permitted transition from the current status.
    pub fn can_transition(&self, next: BillingStatus) -> bool {
        matches!(
            (self, next),
            (BillingStatus::Lunas, BillingStatus::BelumLunas)
                | (BillingStatus::BelumLunas, BillingStatus::Suspend)
                | (BillingStatus::BelumLunas, BillingStatus::Lunas)
                | (BillingStatus::Suspend, BillingStatus::Lunas)
        )
    }
}

/// Whether the network service is provisioned and running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Active,
    Inactive,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Active => "active",
            ServiceStatus::Inactive => "inactive",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "active" => ServiceStatus::Active,
            _ => ServiceStatus::Inactive,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallationStatus {
    Installed,
    NotInstalled,
}

impl InstallationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallationStatus::Installed => "installed",
            InstallationStatus::NotInstalled => "not_installed",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "installed" => InstallationStatus::Installed,
            _ => InstallationStatus::NotInstalled,
        }
    }
}

/// State of the customer's PPP secret on the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MikrotikStatus {
    Enabled,
    Disabled,
}

impl MikrotikStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MikrotikStatus::Enabled => "enabled",
            MikrotikStatus::Disabled => "disabled",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "disabled" => MikrotikStatus::Disabled,
            _ => MikrotikStatus::Enabled,
        }
    }
}

/// Customer subscription record.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Customer {
    pub customer_id: Uuid,
    pub customer_number: String,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub package_name: String,
    pub package_price: Decimal,
    pub discount: Decimal,
    pub active_date: Option<NaiveDate>,
    pub active_period: i32,
    pub active_period_unit: String,
    pub is_pro_rata_applied: bool,
    pub pro_rata_amount: Option<Decimal>,
    pub status: String,
    pub billing_status: String,
    pub service_status: String,
    pub installation_status: String,
    pub odp_id: Option<Uuid>,
    pub router_name: Option<String>,
    pub ppp_secret: Option<String>,
    pub mikrotik_status: String,
    pub last_billing_date: Option<DateTime<Utc>>,
    pub next_billing_date: Option<NaiveDate>,
    pub last_suspend_date: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Input for creating a customer.
#[derive(Debug, Clone)]
pub struct CreateCustomer {
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub package_name: String,
    pub package_price: Decimal,
    pub discount: Decimal,
    pub active_date: Option<NaiveDate>,
    pub active_period: i32,
    pub active_period_unit: String,
    pub installation_status: InstallationStatus,
    pub odp_id: Option<Uuid>,
    pub router_name: Option<String>,
    pub ppp_secret: Option<String>,
}

/// Partial update for a customer. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateCustomer {
    pub name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub package_name: Option<String>,
    pub package_price: Option<Decimal>,
    pub discount: Option<Decimal>,
    pub active_date: Option<NaiveDate>,
    pub service_status: Option<ServiceStatus>,
    pub installation_status: Option<InstallationStatus>,
    pub router_name: Option<String>,
    pub ppp_secret: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn billing_status_allows_documented_transitions() {
        assert!(BillingStatus::Lunas.can_transition(BillingStatus::BelumLunas));
        assert!(BillingStatus::BelumLunas.can_transition(BillingStatus::Suspend));
        assert!(BillingStatus::BelumLunas.can_transition(BillingStatus::Lunas));
        assert!(BillingStatus::Suspend.can_transition(BillingStatus::Lunas));
    }

    #[test]
    fn suspend_only_reachable_from_belum_lunas() {
        assert!(!BillingStatus::Lunas.can_transition(BillingStatus::Suspend));
        assert!(!BillingStatus::Suspend.can_transition(BillingStatus::Suspend));
        assert!(!BillingStatus::Suspend.can_transition(BillingStatus::BelumLunas));
    }
}

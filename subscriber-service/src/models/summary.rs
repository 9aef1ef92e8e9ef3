//! Dashboard summary counts.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Aggregated back-office numbers for the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total_customers: i64,
    pub active_customers: i64,
    pub unpaid_customers: i64,
    pub suspended_customers: i64,
    pub pending_bills: i64,
    pub billed_this_month: Decimal,
}

//! Billing transaction model and bill breakdown snapshot.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Payment status of a bill transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Paid,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Paid => "paid",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "paid" => TransactionStatus::Paid,
            _ => TransactionStatus::Pending,
        }
    }
}

/// An immutable billing record. Created once per customer per billing
/// period; only the payment status transitions after creation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BillTransaction {
    pub transaction_id: Uuid,
    pub customer_id: Uuid,
    pub kind: String,
    pub amount: Decimal,
    pub description: String,
    pub status: String,
    pub due_date: NaiveDate,
    pub breakdown: serde_json::Value,
    pub created_utc: DateTime<Utc>,
}

/// Package charge line within a bill breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageLine {
    pub name: String,
    pub price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Add-on charge line within a bill breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddonLine {
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
    pub total: Decimal,
}

/// Structured snapshot of everything that went into a bill amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillBreakdown {
    pub package: PackageLine,
    pub addons: Vec<AddonLine>,
    pub one_time_items: Vec<AddonLine>,
    pub discount: Decimal,
}

/// Input for persisting a computed monthly bill. All effects (transaction
/// insert, one-time add-ons marked paid, pro-rata flag, customer billing
/// fields) land in a single database transaction.
#[derive(Debug, Clone)]
pub struct CreateBill {
    pub customer_id: Uuid,
    pub amount: Decimal,
    pub description: String,
    pub due_date: NaiveDate,
    pub breakdown: serde_json::Value,
    pub paid_addon_ids: Vec<Uuid>,
    /// `Some` when pro-rata was applied for the first time; durably marks
    /// the customer so it is applied at most once per lifetime.
    pub pro_rata_amount: Option<Decimal>,
    pub last_billing_date: DateTime<Utc>,
    pub next_billing_date: NaiveDate,
    /// Bills created on/after this instant count as "already billed this
    /// month" (idempotence guard, re-checked inside the transaction).
    pub month_start_utc: DateTime<Utc>,
}

//! Billing engine.
//!
//! Pure charge computation (pro-rata, add-ons, discount) separated from
//! the orchestration that persists bills and drives overdue suspension.
//! All calendar decisions use the business timezone (a fixed UTC
//! offset), never the server's local time.

use crate::config::BillingSettings;
use crate::models::{
    AddonItem, AddonLine, AddonType, BillBreakdown, BillTransaction, CreateBill, Customer,
    PackageLine, RouterCommand,
};
use crate::services::database::Database;
use crate::services::metrics::{
    BILLS_GENERATED_TOTAL, ERRORS_TOTAL, ROUTER_COMMANDS_TOTAL, SUSPENSIONS_TOTAL,
};
use crate::services::mikrotik::MikrotikClient;
use anyhow::anyhow;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use service_core::error::AppError;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Period unit that triggers first-month pro-ration.
const MONTHLY_PERIOD_UNIT: &str = "months";

/// Result of the pro-rata calculation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProRataResult {
    pub is_pro_rata_applied: bool,
    pub pro_rata_amount: Decimal,
    pub remaining_days: i64,
    pub days_in_month: i64,
}

/// A fully computed charge, ready to persist.
#[derive(Debug)]
pub struct BillComputation {
    pub total: Decimal,
    pub breakdown: BillBreakdown,
    pub paid_addon_ids: Vec<Uuid>,
    pub pro_rata: Option<ProRataResult>,
}

/// Outcome of one bulk billing run.
#[derive(Debug, Default)]
pub struct CycleOutcome {
    pub bills: Vec<BillTransaction>,
    pub skipped: usize,
    pub failed: usize,
}

/// Outcome of one overdue-suspension sweep.
#[derive(Debug, Default)]
pub struct SuspensionOutcome {
    /// False when the sweep ran outside the designated day and did nothing.
    pub is_suspension_day: bool,
    pub suspended: Vec<Customer>,
    pub failed: usize,
}

/// Outcome of redelivering unconfirmed router commands.
#[derive(Debug, Default)]
pub struct CommandRetryOutcome {
    pub confirmed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Number of calendar days in the month containing `date`.
pub fn days_in_month(date: NaiveDate) -> i64 {
    let (next_year, next_month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    let first_of_next = NaiveDate::from_ymd_opt(next_year, next_month, 1);
    let first_of_this = NaiveDate::from_ymd_opt(date.year(), date.month(), 1);
    match (first_of_next, first_of_this) {
        (Some(next), Some(this)) => (next - this).num_days(),
        _ => 30,
    }
}

/// First day of the month after the one containing `date`.
pub fn first_of_next_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(date)
}

/// Pro-rata for a partial first month.
///
/// For a monthly period unit the activation day itself is billable, so
/// `remaining_days = days_in_month - day + 1`; the daily rate is the
/// package price divided by the month length and the result is rounded
/// half-up to the nearest currency unit. Activation on the 1st covers
/// the whole month and is not pro-rated. Any other period unit bills the
/// full package price.
pub fn calculate_prorata(
    active_date: NaiveDate,
    package_price: Decimal,
    active_period: i32,
    active_period_unit: &str,
) -> ProRataResult {
    if active_period_unit != MONTHLY_PERIOD_UNIT {
        return ProRataResult {
            is_pro_rata_applied: false,
            pro_rata_amount: package_price,
            remaining_days: i64::from(active_period),
            days_in_month: i64::from(active_period),
        };
    }

    let month_days = days_in_month(active_date);
    let remaining = month_days - i64::from(active_date.day()) + 1;

    if remaining >= month_days {
        return ProRataResult {
            is_pro_rata_applied: false,
            pro_rata_amount: package_price,
            remaining_days: month_days,
            days_in_month: month_days,
        };
    }

    let amount = (package_price / Decimal::from(month_days) * Decimal::from(remaining))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

    ProRataResult {
        is_pro_rata_applied: true,
        pro_rata_amount: amount,
        remaining_days: remaining,
        days_in_month: month_days,
    }
}

/// Compute a customer's charge for the cycle. Pure: the caller persists
/// the result and the addon/pro-rata side effects atomically.
pub fn compute_bill(customer: &Customer, addons: &[AddonItem]) -> BillComputation {
    let mut package_line = PackageLine {
        name: customer.package_name.clone(),
        price: customer.package_price,
        note: None,
    };

    let mut pro_rata = None;
    let mut base = customer.package_price;

    if !customer.is_pro_rata_applied {
        if let Some(active_date) = customer.active_date {
            let result = calculate_prorata(
                active_date,
                customer.package_price,
                customer.active_period,
                &customer.active_period_unit,
            );
            if result.is_pro_rata_applied {
                base = result.pro_rata_amount;
                package_line.price = result.pro_rata_amount;
                package_line.note = Some(format!(
                    "pro-rata {} of {} days",
                    result.remaining_days, result.days_in_month
                ));
                pro_rata = Some(result);
            }
        }
    }

    let mut total = base;
    let mut addon_lines = Vec::new();
    let mut one_time_lines = Vec::new();
    let mut paid_addon_ids = Vec::new();

    for addon in addons {
        let line_total = addon.price * Decimal::from(addon.quantity);
        match AddonType::from_string(&addon.item_type) {
            AddonType::Monthly => {
                total += line_total;
                addon_lines.push(AddonLine {
                    name: addon.item_name.clone(),
                    price: addon.price,
                    quantity: addon.quantity,
                    total: line_total,
                });
            }
            AddonType::OneTime if !addon.is_paid => {
                total += line_total;
                paid_addon_ids.push(addon.addon_id);
                one_time_lines.push(AddonLine {
                    name: addon.item_name.clone(),
                    price: addon.price,
                    quantity: addon.quantity,
                    total: line_total,
                });
            }
            AddonType::OneTime => {}
        }
    }

    total -= customer.discount;
    if total < Decimal::ZERO {
        total = Decimal::ZERO;
    }

    BillComputation {
        total,
        breakdown: BillBreakdown {
            package: package_line,
            addons: addon_lines,
            one_time_items: one_time_lines,
            discount: customer.discount,
        },
        paid_addon_ids,
        pro_rata,
    }
}

/// Orchestrates bill generation, overdue suspension, and router command
/// delivery.
#[derive(Clone)]
pub struct BillingEngine {
    db: Database,
    mikrotik: MikrotikClient,
    settings: BillingSettings,
    offset: FixedOffset,
}

impl BillingEngine {
    pub fn new(
        db: Database,
        mikrotik: MikrotikClient,
        settings: BillingSettings,
    ) -> Result<Self, AppError> {
        let offset = FixedOffset::east_opt(settings.utc_offset_hours * 3600)
            .ok_or_else(|| AppError::ConfigError(anyhow!("Invalid business UTC offset")))?;
        Ok(Self {
            db,
            mikrotik,
            settings,
            offset,
        })
    }

    fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset).date_naive()
    }

    /// UTC instant of midnight on the 1st of the current month in the
    /// business timezone. Bills created on/after this instant count for
    /// the current cycle.
    pub fn month_start_utc(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, AppError> {
        let today = self.local_date(now);
        let first = NaiveDate::from_ymd_opt(today.year(), today.month(), 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .ok_or_else(|| AppError::InternalError(anyhow!("Invalid month start")))?;
        let local = first
            .and_local_timezone(self.offset)
            .single()
            .ok_or_else(|| AppError::InternalError(anyhow!("Ambiguous month start")))?;
        Ok(local.with_timezone(&Utc))
    }

    /// Generate this month's bills for every billable customer. Failures
    /// are per-customer: one bad record is logged and counted, and the
    /// run continues.
    #[instrument(skip(self))]
    pub async fn generate_monthly_bills(
        &self,
        now: DateTime<Utc>,
    ) -> Result<CycleOutcome, AppError> {
        let today = self.local_date(now);
        let month_start_utc = self.month_start_utc(now)?;
        let due_date = NaiveDate::from_ymd_opt(today.year(), today.month(), self.settings.due_day)
            .ok_or_else(|| AppError::ConfigError(anyhow!("Invalid billing due day")))?;
        let next_billing_date = first_of_next_month(today);

        let customers = self.db.list_billable_customers().await?;
        info!(count = customers.len(), "Starting monthly billing cycle");

        let mut outcome = CycleOutcome::default();

        for customer in customers {
            match self
                .db
                .bill_exists_since(customer.customer_id, month_start_utc)
                .await
            {
                Ok(true) => {
                    outcome.skipped += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    error!(
                        customer_id = %customer.customer_id,
                        error = %e,
                        "Failed to check for an existing bill, continuing"
                    );
                    ERRORS_TOTAL.with_label_values(&["billing"]).inc();
                    outcome.failed += 1;
                    continue;
                }
            }

            match self
                .bill_one(&customer, now, due_date, next_billing_date, month_start_utc)
                .await
            {
                Ok(bill) => {
                    BILLS_GENERATED_TOTAL.inc();
                    outcome.bills.push(bill);
                }
                Err(AppError::Conflict(_)) => {
                    outcome.skipped += 1;
                }
                Err(e) => {
                    error!(
                        customer_id = %customer.customer_id,
                        error = %e,
                        "Failed to generate bill, continuing"
                    );
                    ERRORS_TOTAL.with_label_values(&["billing"]).inc();
                    outcome.failed += 1;
                }
            }
        }

        info!(
            generated = outcome.bills.len(),
            skipped = outcome.skipped,
            failed = outcome.failed,
            "Monthly billing cycle completed"
        );

        Ok(outcome)
    }

    async fn bill_one(
        &self,
        customer: &Customer,
        now: DateTime<Utc>,
        due_date: NaiveDate,
        next_billing_date: NaiveDate,
        month_start_utc: DateTime<Utc>,
    ) -> Result<BillTransaction, AppError> {
        let addons = self.db.list_customer_addons(customer.customer_id).await?;
        let computation = compute_bill(customer, &addons);

        let today = self.local_date(now);
        let description = format!(
            "Monthly bill {} {:04}-{:02}",
            customer.package_name,
            today.year(),
            today.month()
        );

        let breakdown = serde_json::to_value(&computation.breakdown)
            .map_err(|e| AppError::InternalError(anyhow!("Failed to encode breakdown: {}", e)))?;

        self.db
            .persist_bill(&CreateBill {
                customer_id: customer.customer_id,
                amount: computation.total,
                description,
                due_date,
                breakdown,
                paid_addon_ids: computation.paid_addon_ids,
                pro_rata_amount: computation.pro_rata.map(|p| p.pro_rata_amount),
                last_billing_date: now,
                next_billing_date,
                month_start_utc,
            })
            .await
    }

    /// Suspend customers with an overdue pending bill. Gated to the
    /// configured day of the month; outside it, no-op. State commits
    /// before the router call, with the intended command recorded so a
    /// failed call can be redelivered later.
    #[instrument(skip(self))]
    pub async fn suspend_overdue(&self, now: DateTime<Utc>) -> Result<SuspensionOutcome, AppError> {
        let today = self.local_date(now);
        if today.day() != self.settings.suspension_day {
            info!(day = today.day(), "Not suspension day, skipping sweep");
            return Ok(SuspensionOutcome::default());
        }

        let overdue = self.db.list_overdue_customers(today).await?;
        info!(count = overdue.len(), "Starting overdue suspension sweep");

        let mut outcome = SuspensionOutcome {
            is_suspension_day: true,
            ..Default::default()
        };

        for candidate in overdue {
            match self.db.suspend_customer(candidate.customer_id, now).await {
                Ok((customer, command)) => {
                    SUSPENSIONS_TOTAL.inc();
                    if let Some(command) = command {
                        self.deliver_command(&command).await;
                    } else {
                        warn!(
                            customer_id = %customer.customer_id,
                            "Suspended customer has no router credential, nothing to disable"
                        );
                    }
                    outcome.suspended.push(customer);
                }
                Err(e) => {
                    error!(
                        customer_id = %candidate.customer_id,
                        error = %e,
                        "Failed to suspend customer, continuing"
                    );
                    ERRORS_TOTAL.with_label_values(&["suspension"]).inc();
                    outcome.failed += 1;
                }
            }
        }

        info!(
            suspended = outcome.suspended.len(),
            failed = outcome.failed,
            "Overdue suspension sweep completed"
        );

        Ok(outcome)
    }

    /// Redeliver router commands that never got a confirmed outcome.
    #[instrument(skip(self))]
    pub async fn retry_router_commands(&self) -> Result<CommandRetryOutcome, AppError> {
        let commands = self.db.list_unconfirmed_commands().await?;
        let mut outcome = CommandRetryOutcome::default();

        for command in commands {
            if !self.mikrotik.is_configured() {
                outcome.skipped += 1;
                continue;
            }
            if self.deliver_command(&command).await {
                outcome.confirmed += 1;
            } else {
                outcome.failed += 1;
            }
        }

        Ok(outcome)
    }

    /// Attempt delivery of one router command and record the outcome.
    /// Returns true when the router confirmed.
    async fn deliver_command(&self, command: &RouterCommand) -> bool {
        if !self.mikrotik.is_configured() {
            warn!(
                command_id = %command.command_id,
                "Router integration not configured, command stays pending"
            );
            return false;
        }

        let result = self.execute_command(command).await;

        let error_text = result.as_ref().err().map(|e| e.to_string());
        let label = if error_text.is_none() {
            "confirmed"
        } else {
            "failed"
        };
        ROUTER_COMMANDS_TOTAL.with_label_values(&[label]).inc();

        if let Err(ref e) = result {
            error!(
                command_id = %command.command_id,
                router = %command.router_name,
                error = %e,
                "Router command delivery failed"
            );
        }

        if let Err(e) = self
            .db
            .mark_command_result(command.command_id, error_text.as_deref())
            .await
        {
            error!(
                command_id = %command.command_id,
                error = %e,
                "Failed to record router command outcome"
            );
        }

        result.is_ok()
    }

    async fn execute_command(&self, command: &RouterCommand) -> Result<(), AppError> {
        let router = self
            .db
            .get_router_by_name(&command.router_name)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(anyhow!(
                    "Router '{}' is not in the inventory",
                    command.router_name
                ))
            })?;

        self.mikrotik
            .disable_ppp_secret(&router.ip_address, &command.secret_name)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AddonState, BillingStatus, InstallationStatus, MikrotikStatus};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn test_customer(price: Decimal, discount: Decimal, active_date: Option<NaiveDate>) -> Customer {
        Customer {
            customer_id: Uuid::new_v4(),
            customer_number: "LTS0001".to_string(),
            name: "Budi Santoso".to_string(),
            address: Some("Jl. Merdeka 1".to_string()),
            phone: Some("08123456789".to_string()),
            package_name: "Home 20M".to_string(),
            package_price: price,
            discount,
            active_date,
            active_period: 1,
            active_period_unit: "months".to_string(),
            is_pro_rata_applied: false,
            pro_rata_amount: None,
            status: "active".to_string(),
            billing_status: BillingStatus::Lunas.as_str().to_string(),
            service_status: "active".to_string(),
            installation_status: InstallationStatus::Installed.as_str().to_string(),
            odp_id: None,
            router_name: None,
            ppp_secret: None,
            mikrotik_status: MikrotikStatus::Enabled.as_str().to_string(),
            last_billing_date: None,
            next_billing_date: None,
            last_suspend_date: None,
            created_utc: Utc::now(),
            updated_utc: Utc::now(),
        }
    }

    fn test_addon(
        item_type: AddonType,
        price: Decimal,
        quantity: i32,
        is_paid: bool,
    ) -> AddonItem {
        AddonItem {
            addon_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            item_name: "Extra IP".to_string(),
            item_type: item_type.as_str().to_string(),
            price,
            quantity,
            is_paid,
            state: AddonState::Active.as_str().to_string(),
            description: None,
            created_utc: Utc::now(),
            updated_utc: Utc::now(),
        }
    }

    #[test]
    fn prorata_mid_month_january() {
        let result = calculate_prorata(date(2025, 1, 15), dec!(300000), 1, "months");
        assert!(result.is_pro_rata_applied);
        assert_eq!(result.days_in_month, 31);
        assert_eq!(result.remaining_days, 17);
        assert_eq!(result.pro_rata_amount, dec!(164516));
    }

    #[test]
    fn prorata_first_of_month_is_full_price() {
        let result = calculate_prorata(date(2025, 1, 1), dec!(300000), 1, "months");
        assert!(!result.is_pro_rata_applied);
        assert_eq!(result.remaining_days, 31);
        assert_eq!(result.days_in_month, 31);
        assert_eq!(result.pro_rata_amount, dec!(300000));
    }

    #[test]
    fn prorata_last_day_of_february() {
        let result = calculate_prorata(date(2025, 2, 28), dec!(280000), 1, "months");
        assert!(result.is_pro_rata_applied);
        assert_eq!(result.days_in_month, 28);
        assert_eq!(result.remaining_days, 1);
        assert_eq!(result.pro_rata_amount, dec!(10000));
    }

    #[test]
    fn prorata_leap_february() {
        let result = calculate_prorata(date(2024, 2, 15), dec!(290000), 1, "months");
        assert_eq!(result.days_in_month, 29);
        assert_eq!(result.remaining_days, 15);
    }

    #[test]
    fn prorata_non_monthly_unit_bills_full_price() {
        let result = calculate_prorata(date(2025, 1, 15), dec!(300000), 90, "days");
        assert!(!result.is_pro_rata_applied);
        assert_eq!(result.pro_rata_amount, dec!(300000));
        assert_eq!(result.remaining_days, 90);
        assert_eq!(result.days_in_month, 90);
    }

    #[test]
    fn days_in_month_handles_december() {
        assert_eq!(days_in_month(date(2025, 12, 10)), 31);
        assert_eq!(days_in_month(date(2025, 4, 1)), 30);
    }

    #[test]
    fn first_of_next_month_rolls_year() {
        assert_eq!(first_of_next_month(date(2025, 12, 15)), date(2026, 1, 1));
        assert_eq!(first_of_next_month(date(2025, 6, 30)), date(2025, 7, 1));
    }

    #[test]
    fn compute_bill_plain_package() {
        let customer = test_customer(dec!(300000), dec!(0), None);
        let computation = compute_bill(&customer, &[]);
        assert_eq!(computation.total, dec!(300000));
        assert!(computation.pro_rata.is_none());
        assert!(computation.paid_addon_ids.is_empty());
    }

    #[test]
    fn compute_bill_applies_prorata_once() {
        let mut customer = test_customer(dec!(300000), dec!(0), Some(date(2025, 1, 15)));
        let computation = compute_bill(&customer, &[]);
        assert_eq!(computation.total, dec!(164516));
        assert!(computation.pro_rata.is_some());

        customer.is_pro_rata_applied = true;
        let second = compute_bill(&customer, &[]);
        assert_eq!(second.total, dec!(300000));
        assert!(second.pro_rata.is_none());
    }

    #[test]
    fn compute_bill_monthly_addon_recurs() {
        let customer = test_customer(dec!(300000), dec!(0), None);
        let addon = test_addon(AddonType::Monthly, dec!(50000), 2, false);
        let computation = compute_bill(&customer, &[addon]);
        assert_eq!(computation.total, dec!(400000));
        // Monthly add-ons bill every cycle, never marked paid.
        assert!(computation.paid_addon_ids.is_empty());
    }

    #[test]
    fn compute_bill_one_time_addon_bills_once() {
        let customer = test_customer(dec!(300000), dec!(0), None);
        let unpaid = test_addon(AddonType::OneTime, dec!(150000), 1, false);
        let unpaid_id = unpaid.addon_id;
        let paid = test_addon(AddonType::OneTime, dec!(99000), 1, true);

        let computation = compute_bill(&customer, &[unpaid, paid]);
        assert_eq!(computation.total, dec!(450000));
        assert_eq!(computation.paid_addon_ids, vec![unpaid_id]);
        assert_eq!(computation.breakdown.one_time_items.len(), 1);
    }

    #[test]
    fn compute_bill_discount_subtracted() {
        let customer = test_customer(dec!(300000), dec!(25000), None);
        let computation = compute_bill(&customer, &[]);
        assert_eq!(computation.total, dec!(275000));
        assert_eq!(computation.breakdown.discount, dec!(25000));
    }

    #[test]
    fn compute_bill_total_clamped_at_zero() {
        let customer = test_customer(dec!(100000), dec!(150000), None);
        let computation = compute_bill(&customer, &[]);
        assert_eq!(computation.total, dec!(0));
    }

    #[test]
    fn compute_bill_breakdown_notes_prorata() {
        let customer = test_customer(dec!(300000), dec!(0), Some(date(2025, 1, 15)));
        let computation = compute_bill(&customer, &[]);
        let note = computation.breakdown.package.note.unwrap();
        assert!(note.contains("17"));
        assert!(note.contains("31"));
    }
}

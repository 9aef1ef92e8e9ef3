//! Integration tests for the monthly billing cycle.
//!
//! These tests need a running PostgreSQL instance (TEST_DATABASE_URL).
//! Cycles are driven through the engine with a fixed clock so the
//! calendar behavior is deterministic.

mod common;

use chrono::{NaiveDate, TimeZone, Utc};
use common::TestApp;
use rust_decimal_macros::dec;
use subscriber_service::models::{AddonType, CreateAddon};

/// 2025-03-15 10:00 in UTC+7 is 2025-03-15 03:00 UTC.
fn mid_march() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 15, 3, 0, 0).unwrap()
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set TEST_DATABASE_URL)"]
async fn billing_run_is_idempotent_per_month() {
    let app = TestApp::spawn().await;
    let engine = app.engine();

    let customer = app.create_customer("Budi", dec!(300000)).await;
    app.activate_service(customer.customer_id).await;

    let first = engine.generate_monthly_bills(mid_march()).await.unwrap();
    assert_eq!(first.bills.len(), 1);
    assert_eq!(first.failed, 0);

    let second = engine.generate_monthly_bills(mid_march()).await.unwrap();
    assert_eq!(second.bills.len(), 0);
    assert_eq!(second.skipped, 1);

    let transactions = app
        .db
        .list_customer_transactions(customer.customer_id)
        .await
        .unwrap();
    assert_eq!(transactions.len(), 1);

    app.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set TEST_DATABASE_URL)"]
async fn bill_updates_customer_billing_state() {
    let app = TestApp::spawn().await;
    let engine = app.engine();

    let customer = app.create_customer("Budi", dec!(300000)).await;
    app.activate_service(customer.customer_id).await;

    let outcome = engine.generate_monthly_bills(mid_march()).await.unwrap();
    let bill = &outcome.bills[0];
    assert_eq!(bill.amount, dec!(300000));
    assert_eq!(bill.status, "pending");
    assert_eq!(bill.due_date, NaiveDate::from_ymd_opt(2025, 3, 5).unwrap());

    let billed = app.db.get_customer(customer.customer_id).await.unwrap().unwrap();
    assert_eq!(billed.billing_status, "belum_lunas");
    assert_eq!(
        billed.next_billing_date,
        Some(NaiveDate::from_ymd_opt(2025, 4, 1).unwrap())
    );
    assert!(billed.last_billing_date.is_some());

    app.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set TEST_DATABASE_URL)"]
async fn prorata_applied_once_per_customer_lifetime() {
    let app = TestApp::spawn().await;
    let engine = app.engine();

    let customer = app
        .create_customer_with(
            "Budi",
            dec!(300000),
            dec!(0),
            NaiveDate::from_ymd_opt(2025, 3, 15),
            None,
        )
        .await;
    app.activate_service(customer.customer_id).await;

    // March has 31 days, activation on the 15th leaves 17 billable days.
    let march = engine.generate_monthly_bills(mid_march()).await.unwrap();
    assert_eq!(march.bills[0].amount, dec!(164516));

    let after_march = app.db.get_customer(customer.customer_id).await.unwrap().unwrap();
    assert!(after_march.is_pro_rata_applied);
    assert_eq!(after_march.pro_rata_amount, Some(dec!(164516)));

    // April bills the full package price.
    let mid_april = Utc.with_ymd_and_hms(2025, 4, 15, 3, 0, 0).unwrap();
    let april = engine.generate_monthly_bills(mid_april).await.unwrap();
    assert_eq!(april.bills[0].amount, dec!(300000));

    app.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set TEST_DATABASE_URL)"]
async fn one_time_addon_bills_exactly_once() {
    let app = TestApp::spawn().await;
    let engine = app.engine();

    let customer = app.create_customer("Budi", dec!(300000)).await;
    app.activate_service(customer.customer_id).await;

    app.db
        .create_addon(&CreateAddon {
            customer_id: customer.customer_id,
            item_name: "Installation fee".to_string(),
            item_type: AddonType::OneTime,
            price: dec!(150000),
            quantity: 1,
            description: None,
        })
        .await
        .unwrap();
    app.db
        .create_addon(&CreateAddon {
            customer_id: customer.customer_id,
            item_name: "Static IP".to_string(),
            item_type: AddonType::Monthly,
            price: dec!(50000),
            quantity: 1,
            description: None,
        })
        .await
        .unwrap();

    let march = engine.generate_monthly_bills(mid_march()).await.unwrap();
    assert_eq!(march.bills[0].amount, dec!(500000));

    let addons = app.db.list_customer_addons(customer.customer_id).await.unwrap();
    let one_time = addons.iter().find(|a| a.item_type == "one_time").unwrap();
    assert!(one_time.is_paid);

    // Next cycle: only package plus the recurring add-on.
    let mid_april = Utc.with_ymd_and_hms(2025, 4, 15, 3, 0, 0).unwrap();
    let april = engine.generate_monthly_bills(mid_april).await.unwrap();
    assert_eq!(april.bills[0].amount, dec!(350000));

    app.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set TEST_DATABASE_URL)"]
async fn inactive_customers_are_not_billed() {
    let app = TestApp::spawn().await;
    let engine = app.engine();

    // service_status stays 'inactive' without activation.
    app.create_customer("Budi", dec!(300000)).await;

    let outcome = engine.generate_monthly_bills(mid_march()).await.unwrap();
    assert!(outcome.bills.is_empty());

    app.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set TEST_DATABASE_URL)"]
async fn prorata_endpoint_is_pure() {
    let app = TestApp::spawn().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/billing/calculate-prorata", app.address))
        .json(&serde_json::json!({
            "active_date": "2025-01-15",
            "package_price": "300000"
        }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["is_pro_rata_applied"], true);
    assert_eq!(body["remaining_days"], 17);
    assert_eq!(body["days_in_month"], 31);

    app.cleanup().await;
}

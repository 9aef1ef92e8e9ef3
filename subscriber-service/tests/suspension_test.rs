//! Integration tests for overdue suspension and router command records.
//!
//! These tests need a running PostgreSQL instance (TEST_DATABASE_URL).

mod common;

use chrono::{TimeZone, Utc};
use common::TestApp;
use rust_decimal_macros::dec;

/// 2025-03-06 09:00 in UTC+7 is 2025-03-06 02:00 UTC.
fn suspension_day() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 6, 2, 0, 0).unwrap()
}

/// Give the customer router credentials so suspension records a command.
async fn set_router_credentials(app: &TestApp, customer_id: uuid::Uuid) {
    sqlx::query(
        "UPDATE customers SET router_name = 'rtr-core-01', ppp_secret = 'pppoe-budi' WHERE customer_id = $1",
    )
    .bind(customer_id)
    .execute(app.db.pool())
    .await
    .unwrap();
}

/// Bill the customer early in the month so the 5th-of-month due date is
/// already past on the 6th.
async fn bill_customer(app: &TestApp) -> uuid::Uuid {
    let engine = app.engine();
    let customer = app.create_customer("Budi", dec!(300000)).await;
    app.activate_service(customer.customer_id).await;

    let early_march = Utc.with_ymd_and_hms(2025, 3, 1, 2, 0, 0).unwrap();
    let outcome = engine.generate_monthly_bills(early_march).await.unwrap();
    assert_eq!(outcome.bills.len(), 1);

    customer.customer_id
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set TEST_DATABASE_URL)"]
async fn sweep_is_noop_outside_suspension_day() {
    let app = TestApp::spawn().await;
    let engine = app.engine();

    let customer_id = bill_customer(&app).await;

    let not_the_day = Utc.with_ymd_and_hms(2025, 3, 7, 2, 0, 0).unwrap();
    let outcome = engine.suspend_overdue(not_the_day).await.unwrap();
    assert!(!outcome.is_suspension_day);
    assert!(outcome.suspended.is_empty());

    let untouched = app.db.get_customer(customer_id).await.unwrap().unwrap();
    assert_eq!(untouched.billing_status, "belum_lunas");

    app.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set TEST_DATABASE_URL)"]
async fn overdue_customer_is_suspended_on_the_day() {
    let app = TestApp::spawn().await;
    let engine = app.engine();

    let customer_id = bill_customer(&app).await;

    let outcome = engine.suspend_overdue(suspension_day()).await.unwrap();
    assert!(outcome.is_suspension_day);
    assert_eq!(outcome.suspended.len(), 1);

    let suspended = app.db.get_customer(customer_id).await.unwrap().unwrap();
    assert_eq!(suspended.billing_status, "suspend");
    assert_eq!(suspended.mikrotik_status, "disabled");
    assert!(suspended.last_suspend_date.is_some());

    app.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set TEST_DATABASE_URL)"]
async fn paid_customers_are_not_suspended() {
    let app = TestApp::spawn().await;
    let engine = app.engine();

    let customer_id = bill_customer(&app).await;
    sqlx::query("UPDATE customers SET billing_status = 'lunas' WHERE customer_id = $1")
        .bind(customer_id)
        .execute(app.db.pool())
        .await
        .unwrap();

    let outcome = engine.suspend_overdue(suspension_day()).await.unwrap();
    assert!(outcome.is_suspension_day);
    assert!(outcome.suspended.is_empty());

    app.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set TEST_DATABASE_URL)"]
async fn suspension_records_router_command_for_later_delivery() {
    let app = TestApp::spawn().await;
    let engine = app.engine();

    let customer_id = bill_customer(&app).await;
    set_router_credentials(&app, customer_id).await;

    let outcome = engine.suspend_overdue(suspension_day()).await.unwrap();
    assert_eq!(outcome.suspended.len(), 1);

    // Router integration is disabled in tests, so the command stays
    // pending for the retry loop.
    let commands = app.db.list_unconfirmed_commands().await.unwrap();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].action, "disable_ppp_secret");
    assert_eq!(commands[0].router_name, "rtr-core-01");
    assert_eq!(commands[0].secret_name, "pppoe-budi");
    assert_eq!(commands[0].status, "pending");

    app.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set TEST_DATABASE_URL)"]
async fn retry_skips_commands_when_integration_disabled() {
    let app = TestApp::spawn().await;
    let engine = app.engine();

    let customer_id = bill_customer(&app).await;
    set_router_credentials(&app, customer_id).await;
    engine.suspend_overdue(suspension_day()).await.unwrap();

    let outcome = engine.retry_router_commands().await.unwrap();
    assert_eq!(outcome.confirmed, 0);
    assert_eq!(outcome.skipped, 1);

    app.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set TEST_DATABASE_URL)"]
async fn suspension_is_not_repeated_for_already_suspended_customers() {
    let app = TestApp::spawn().await;
    let engine = app.engine();

    bill_customer(&app).await;

    let first = engine.suspend_overdue(suspension_day()).await.unwrap();
    assert_eq!(first.suspended.len(), 1);

    let second = engine.suspend_overdue(suspension_day()).await.unwrap();
    assert!(second.suspended.is_empty());

    app.cleanup().await;
}

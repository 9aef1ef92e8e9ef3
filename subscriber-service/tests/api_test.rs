//! HTTP API integration tests.
//!
//! These tests need a running PostgreSQL instance (TEST_DATABASE_URL).

mod common;

use common::TestApp;
use serde_json::json;

#[tokio::test]
#[ignore = "requires PostgreSQL (set TEST_DATABASE_URL)"]
async fn health_and_metrics_endpoints_respond() {
    let app = TestApp::spawn().await;
    let client = reqwest::Client::new();

    let health = client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .unwrap();
    assert!(health.status().is_success());

    let ready = client
        .get(format!("{}/ready", app.address))
        .send()
        .await
        .unwrap();
    assert!(ready.status().is_success());

    let metrics = client
        .get(format!("{}/metrics", app.address))
        .send()
        .await
        .unwrap();
    assert!(metrics.status().is_success());
    let body = metrics.text().await.unwrap();
    assert!(body.contains("http_requests_total") || body.contains("subscriber_"));

    app.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set TEST_DATABASE_URL)"]
async fn customer_crud_over_http() {
    let app = TestApp::spawn().await;
    let client = reqwest::Client::new();

    let created = client
        .post(format!("{}/customers", app.address))
        .json(&json!({
            "name": "Budi Santoso",
            "package_name": "Home 20M",
            "package_price": "300000"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), 201);
    let customer: serde_json::Value = created.json().await.unwrap();
    let customer_id = customer["customer_id"].as_str().unwrap().to_string();
    assert!(customer["customer_number"].as_str().unwrap().starts_with("LTS"));
    assert_eq!(customer["billing_status"], "lunas");

    let updated = client
        .put(format!("{}/customers/{}", app.address, customer_id))
        .json(&json!({ "service_status": "active" }))
        .send()
        .await
        .unwrap();
    assert!(updated.status().is_success());
    let updated: serde_json::Value = updated.json().await.unwrap();
    assert_eq!(updated["service_status"], "active");

    let listed = client
        .get(format!("{}/customers", app.address))
        .send()
        .await
        .unwrap();
    let customers: Vec<serde_json::Value> = listed.json().await.unwrap();
    assert_eq!(customers.len(), 1);

    let deleted = client
        .delete(format!("{}/customers/{}", app.address, customer_id))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), 204);

    let missing = client
        .get(format!("{}/customers/{}", app.address, customer_id))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);

    app.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set TEST_DATABASE_URL)"]
async fn invalid_customer_payload_is_rejected() {
    let app = TestApp::spawn().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/customers", app.address))
        .json(&json!({
            "name": "",
            "package_name": "Home 20M",
            "package_price": "300000"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 422);

    app.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set TEST_DATABASE_URL)"]
async fn attach_endpoint_returns_conflict_when_full() {
    let app = TestApp::spawn().await;
    let client = reqwest::Client::new();

    let odp = app.create_odp("ODP-B01", 1).await;
    let first = app.create_customer("Budi", rust_decimal_macros::dec!(300000)).await;
    let second = app.create_customer("Siti", rust_decimal_macros::dec!(300000)).await;

    let ok = client
        .post(format!(
            "{}/customers/{}/odp/attach",
            app.address, first.customer_id
        ))
        .json(&json!({ "odp_id": odp.odp_id }))
        .send()
        .await
        .unwrap();
    assert!(ok.status().is_success());

    let full = client
        .post(format!(
            "{}/customers/{}/odp/attach",
            app.address, second.customer_id
        ))
        .json(&json!({ "odp_id": odp.odp_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(full.status(), 409);

    app.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set TEST_DATABASE_URL)"]
async fn dashboard_summary_counts_customers() {
    let app = TestApp::spawn().await;
    let client = reqwest::Client::new();

    let customer = app.create_customer("Budi", rust_decimal_macros::dec!(300000)).await;
    app.activate_service(customer.customer_id).await;

    let response = client
        .get(format!("{}/dashboard/summary", app.address))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["total_customers"], 1);
    assert_eq!(body["active_customers"], 1);

    app.cleanup().await;
}

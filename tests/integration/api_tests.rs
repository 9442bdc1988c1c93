//! API tests against a running server

use reqwest::Client;
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api/v1";

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_readiness() {
    let client = Client::new();

    let response = client
        .get(format!("{}/ready", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
#[ignore]
async fn test_borrow_unknown_book() {
    let client = Client::new();

    let response = client
        .post(format!("{}/loans/borrow", BASE_URL))
        .json(&json!({
            "book_id": i64::MAX,
            "borrower_id": 1,
            "loan_date": "2025-01-06",
            "due_date": "2025-01-20"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 404);

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error"], "NoSuchItem");
    assert_eq!(body["code"], 5);
}

#[tokio::test]
#[ignore]
async fn test_manual_entry_without_due_date() {
    let client = Client::new();

    let response = client
        .post(format!("{}/loans/manual", BASE_URL))
        .json(&json!({
            "action": "borrow",
            "book_id": 1,
            "borrower_id": 1,
            "loan_date": "2025-01-06"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 400);
}

#[tokio::test]
#[ignore]
async fn test_loan_history() {
    let client = Client::new();

    let response = client
        .get(format!("{}/loans/history?active_only=true&per_page=5", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["items"].is_array());
    assert!(body["total"].is_number());
    assert_eq!(body["per_page"], 5);
}

#[tokio::test]
#[ignore]
async fn test_loan_stats() {
    let client = Client::new();

    let response = client
        .get(format!("{}/loans/stats", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["active"].is_number());
    assert!(body["overdue"].is_number());
    assert!(body["opened_today"].is_number());
}

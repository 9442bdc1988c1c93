//! HTTP routes served over the in-memory store

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use circulation_server::{
    api::create_router,
    models::{
        book::Book,
        user::{Borrower, BorrowingRole},
    },
    repository::MemoryLedgerStore,
    services::{LoanPolicy, Services},
    AppState,
};

async fn app() -> Router {
    let store = MemoryLedgerStore::new();
    store.insert_book(Book::new(1, "Dune", Some("9780441013593"))).await;
    store.insert_book(Book::new(2, "Emma", None)).await;
    store
        .insert_borrower(Borrower::new(10, "Ada", BorrowingRole::Standard))
        .await;

    let state = AppState {
        services: Arc::new(Services::new(Arc::new(store), LoanPolicy::default())),
    };
    create_router(state)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    let request = match body {
        Some(body) => request.body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn borrow_body(book_id: i64) -> Value {
    json!({
        "book_id": book_id,
        "borrower_id": 10,
        "loan_date": "2025-01-06",
        "due_date": "2025-01-13",
        "staff_id": 3
    })
}

#[tokio::test]
async fn test_health() {
    let app = app().await;

    let (status, body) = send(&app, Method::GET, "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, Method::GET, "/api/v1/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_borrow_and_late_return() {
    let app = app().await;

    let (status, body) = send(&app, Method::POST, "/api/v1/loans/borrow", Some(borrow_body(1))).await;
    assert_eq!(status, StatusCode::CREATED);
    let loan_id = body["loan"]["id"].as_i64().unwrap();
    assert_eq!(body["loan"]["book_id"], 1);
    assert_eq!(body["loan"]["return_date"], Value::Null);

    let (status, body) = send(&app, Method::GET, "/api/v1/books/1/active-loan", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], loan_id);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/loans/return",
        Some(json!({ "book_id": 1, "return_date": "2025-01-16" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["loan_id"], loan_id);
    assert_eq!(body["returned"], true);
    assert_eq!(body["days_overdue"], 3);
    assert!(body["message"].as_str().unwrap().contains("3 day(s) overdue"));

    let (status, body) = send(&app, Method::GET, "/api/v1/books/1/active-loan", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn test_ledger_rejections_map_to_statuses() {
    let app = app().await;

    let (status, body) = send(&app, Method::POST, "/api/v1/loans/borrow", Some(borrow_body(42))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 5);
    assert_eq!(body["error"], "NoSuchItem");

    send(&app, Method::POST, "/api/v1/loans/borrow", Some(borrow_body(1))).await;
    let (status, body) = send(&app, Method::POST, "/api/v1/loans/borrow", Some(borrow_body(1))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 7);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/loans/return",
        Some(json!({ "book_id": 2, "return_date": "2025-01-08" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 12);

    let backwards = json!({
        "book_id": 2,
        "borrower_id": 10,
        "loan_date": "2025-01-06",
        "due_date": "2025-01-01"
    });
    let (status, body) = send(&app, Method::POST, "/api/v1/loans/borrow", Some(backwards)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 18);
}

#[tokio::test]
async fn test_invalid_ids_are_rejected_before_the_ledger() {
    let app = app().await;

    let (status, body) = send(&app, Method::POST, "/api/v1/loans/borrow", Some(borrow_body(0))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 18);
}

#[tokio::test]
async fn test_manual_entry_routes() {
    let app = app().await;

    let missing_due = json!({
        "action": "borrow",
        "book_id": 2,
        "borrower_id": 10,
        "loan_date": "2025-01-06"
    });
    let (status, _) = send(&app, Method::POST, "/api/v1/loans/manual", Some(missing_due)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let borrow = json!({
        "action": "borrow",
        "book_id": 2,
        "borrower_id": 10,
        "loan_date": "2025-01-06",
        "due_date": "2025-01-20"
    });
    let (status, body) = send(&app, Method::POST, "/api/v1/loans/manual", Some(borrow)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["action"], "borrow");
    assert_eq!(body["days_overdue"], Value::Null);

    let give_back = json!({
        "action": "return",
        "book_id": 2,
        "borrower_id": 10,
        "loan_date": "2025-01-06",
        "return_date": "2025-01-10"
    });
    let (status, body) = send(&app, Method::POST, "/api/v1/loans/manual", Some(give_back)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["action"], "return");
    assert_eq!(body["days_overdue"], 0);
}

#[tokio::test]
async fn test_listings() {
    let app = app().await;
    send(&app, Method::POST, "/api/v1/loans/borrow", Some(borrow_body(1))).await;
    send(&app, Method::POST, "/api/v1/loans/borrow", Some(borrow_body(2))).await;

    let (status, body) = send(&app, Method::GET, "/api/v1/loans/history?per_page=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["per_page"], 1);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["items"][0]["book"]["title"], "Emma");

    let (status, body) = send(&app, Method::GET, "/api/v1/loans/active", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);

    // Due dates in the test data are long past
    let (status, body) = send(&app, Method::GET, "/api/v1/loans/overdue", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
    assert_eq!(body[0]["is_overdue"], true);

    let (status, body) = send(&app, Method::GET, "/api/v1/loans/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], 2);
    assert_eq!(body["overdue"], 2);

    let (status, body) = send(&app, Method::GET, "/api/v1/users/10/loans", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["borrower"]["name"], "Ada");

    let (status, body) = send(&app, Method::GET, "/api/v1/users/99/loans", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 4);
}

#[tokio::test]
async fn test_history_page_past_the_end() {
    let app = app().await;
    send(&app, Method::POST, "/api/v1/loans/borrow", Some(borrow_body(1))).await;

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/loans/history?page=9223372036854775807",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["page"], i64::MAX);
    assert!(body["items"].as_array().unwrap().is_empty());
}

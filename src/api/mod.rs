//! API handlers for the circulation REST endpoints

pub mod health;
pub mod loans;
pub mod openapi;

use axum::{
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::ToSchema;

use crate::{models::loan::LoanDetails, AppState};

/// Page of loans
#[derive(Serialize, ToSchema)]
pub struct LoanPage {
    pub items: Vec<LoanDetails>,
    /// Total number of matching loans
    pub total: i64,
    /// Current page number
    pub page: i64,
    /// Loans per page
    pub per_page: i64,
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Loans
        .route("/loans/borrow", post(loans::borrow))
        .route("/loans/return", post(loans::return_book))
        .route("/loans/manual", post(loans::manual_entry))
        .route("/loans/history", get(loans::history))
        .route("/loans/active", get(loans::active))
        .route("/loans/overdue", get(loans::overdue))
        .route("/loans/stats", get(loans::stats))
        .route("/books/:id/active-loan", get(loans::book_active_loan))
        .route("/users/:id/loans", get(loans::user_loans))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{health, loans};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Circulation API",
        version = "1.0.0",
        description = "Library borrow/return REST API"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Loans
        loans::borrow,
        loans::return_book,
        loans::manual_entry,
        loans::history,
        loans::active,
        loans::overdue,
        loans::stats,
        loans::book_active_loan,
        loans::user_loans,
    ),
    components(
        schemas(
            health::HealthResponse,
            crate::error::ErrorResponse,
            crate::models::book::BookStatus,
            crate::models::book::BookShort,
            crate::models::user::BorrowerShort,
            crate::models::loan::Loan,
            crate::models::loan::LoanDetails,
            crate::models::loan::LoanCounts,
            crate::models::loan::BorrowBook,
            crate::models::loan::ReturnBook,
            crate::models::loan::ReturnOutcome,
            crate::models::loan::ManualAction,
            crate::models::loan::ManualEntry,
            crate::api::LoanPage,
            loans::BorrowResponse,
            loans::ReturnResponse,
            loans::ManualEntryResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "loans", description = "Borrow, return and loan listings")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

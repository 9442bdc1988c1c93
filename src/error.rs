//! Error types for the circulation server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Numeric error codes reported in error bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    DbFailure = 3,
    NoSuchUser = 4,
    NoSuchItem = 5,
    ItemNotAvailable = 7,
    MaxBorrowsReached = 11,
    ItemNotBorrowed = 12,
    NoSuchLoan = 13,
    LoanAlreadyReturned = 14,
    LoanItemMismatch = 15,
    UserInactive = 16,
    BadValue = 18,
    InconsistentData = 20,
}

/// Rejections of the borrow/return state machine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Book {0} not found")]
    BookNotFound(i64),

    #[error("Borrower {0} not found")]
    BorrowerNotFound(i64),

    #[error("Loan {0} not found")]
    LoanNotFound(i64),

    #[error("Book {0} is not available for borrowing")]
    BookNotAvailable(i64),

    #[error("Book {0} is not currently borrowed")]
    BookNotBorrowed(i64),

    #[error("Loan {0} has already been returned")]
    LoanAlreadyReturned(i64),

    #[error("Loan {loan_id} does not belong to book {book_id}")]
    LoanBookMismatch { loan_id: i64, book_id: i64 },

    #[error("Borrower {borrower_id} has reached the maximum number of active loans ({active}/{limit})")]
    BorrowingLimitExceeded {
        borrower_id: i64,
        active: i64,
        limit: u32,
    },

    #[error("Borrower {0} is inactive")]
    BorrowerInactive(i64),

    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),

    #[error("Book {0} is marked as borrowed but has no open loan")]
    OrphanedBorrowedBook(i64),
}

impl LedgerError {
    pub fn code(&self) -> ErrorCode {
        match self {
            LedgerError::BookNotFound(_) => ErrorCode::NoSuchItem,
            LedgerError::BorrowerNotFound(_) => ErrorCode::NoSuchUser,
            LedgerError::LoanNotFound(_) => ErrorCode::NoSuchLoan,
            LedgerError::BookNotAvailable(_) => ErrorCode::ItemNotAvailable,
            LedgerError::BookNotBorrowed(_) => ErrorCode::ItemNotBorrowed,
            LedgerError::LoanAlreadyReturned(_) => ErrorCode::LoanAlreadyReturned,
            LedgerError::LoanBookMismatch { .. } => ErrorCode::LoanItemMismatch,
            LedgerError::BorrowingLimitExceeded { .. } => ErrorCode::MaxBorrowsReached,
            LedgerError::BorrowerInactive(_) => ErrorCode::UserInactive,
            LedgerError::InvalidDateRange(_) => ErrorCode::BadValue,
            LedgerError::OrphanedBorrowedBook(_) => ErrorCode::InconsistentData,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            LedgerError::BookNotFound(_)
            | LedgerError::BorrowerNotFound(_)
            | LedgerError::LoanNotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::BookNotAvailable(_)
            | LedgerError::BookNotBorrowed(_)
            | LedgerError::LoanAlreadyReturned(_)
            | LedgerError::LoanBookMismatch { .. } => StatusCode::CONFLICT,
            LedgerError::BorrowingLimitExceeded { .. } | LedgerError::BorrowerInactive(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            LedgerError::InvalidDateRange(_) => StatusCode::BAD_REQUEST,
            LedgerError::OrphanedBorrowedBook(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Ledger(e) => {
                if let LedgerError::OrphanedBorrowedBook(book_id) = e {
                    tracing::error!("Inconsistent circulation data for book {}", book_id);
                }
                (e.status(), e.code(), e.to_string())
            }
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DbFailure,
                    "Database error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

//! Borrow/return endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::AppResult,
    models::loan::{
        BorrowBook, Loan, LoanCounts, LoanDetails, LoanQuery, ManualAction, ManualEntry,
        ManualOutcome, PageQuery, ReturnBook, ReturnOutcome,
    },
    AppState,
};

use super::LoanPage;

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Borrow response
#[derive(Serialize, ToSchema)]
pub struct BorrowResponse {
    pub loan: Loan,
    /// Status message
    pub message: String,
}

/// Return response
#[derive(Serialize, ToSchema)]
pub struct ReturnResponse {
    pub loan_id: i64,
    pub returned: bool,
    /// Whole days past the due date, 0 when on time
    pub days_overdue: i32,
    /// Status message
    pub message: String,
}

impl From<ReturnOutcome> for ReturnResponse {
    fn from(outcome: ReturnOutcome) -> Self {
        let mut message = "Book returned successfully!".to_string();
        if outcome.days_overdue > 0 {
            message.push_str(&format!(
                " Note: Book was {} day(s) overdue.",
                outcome.days_overdue
            ));
        }
        Self {
            loan_id: outcome.loan_id,
            returned: outcome.returned,
            days_overdue: outcome.days_overdue,
            message,
        }
    }
}

/// Manual entry response
#[derive(Serialize, ToSchema)]
pub struct ManualEntryResponse {
    pub action: ManualAction,
    pub loan_id: i64,
    /// Set for returns
    pub days_overdue: Option<i32>,
    pub message: String,
}

/// Borrow a book
#[utoipa::path(
    post,
    path = "/loans/borrow",
    tag = "loans",
    request_body = BorrowBook,
    responses(
        (status = 201, description = "Loan created", body = BorrowResponse),
        (status = 400, description = "Invalid request or date range"),
        (status = 404, description = "Book or borrower not found"),
        (status = 409, description = "Book not available"),
        (status = 422, description = "Borrower inactive or at borrowing limit")
    )
)]
pub async fn borrow(
    State(state): State<AppState>,
    Json(request): Json<BorrowBook>,
) -> AppResult<(StatusCode, Json<BorrowResponse>)> {
    request.validate()?;

    let loan = state.services.loans.borrow(request).await?;
    let message = format!("Book borrowed successfully! Loan ID: {}", loan.id);

    Ok((StatusCode::CREATED, Json(BorrowResponse { loan, message })))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/loans/return",
    tag = "loans",
    request_body = ReturnBook,
    responses(
        (status = 200, description = "Book returned", body = ReturnResponse),
        (status = 404, description = "Book or loan not found"),
        (status = 409, description = "Book not borrowed, loan already returned or loan of another book"),
        (status = 500, description = "Book is borrowed but has no open loan")
    )
)]
pub async fn return_book(
    State(state): State<AppState>,
    Json(request): Json<ReturnBook>,
) -> AppResult<Json<ReturnResponse>> {
    request.validate()?;

    let outcome = state.services.loans.return_book(request).await?;
    Ok(Json(outcome.into()))
}

/// Borrow or return from the manual entry form
#[utoipa::path(
    post,
    path = "/loans/manual",
    tag = "loans",
    request_body = ManualEntry,
    responses(
        (status = 201, description = "Loan created", body = ManualEntryResponse),
        (status = 200, description = "Book returned", body = ManualEntryResponse),
        (status = 400, description = "Missing date for the requested action")
    )
)]
pub async fn manual_entry(
    State(state): State<AppState>,
    Json(request): Json<ManualEntry>,
) -> AppResult<(StatusCode, Json<ManualEntryResponse>)> {
    request.validate()?;

    let response = match state.services.loans.manual_entry(request).await? {
        ManualOutcome::Borrowed(loan) => (
            StatusCode::CREATED,
            ManualEntryResponse {
                action: ManualAction::Borrow,
                loan_id: loan.id,
                days_overdue: None,
                message: format!("Book borrowed successfully! Loan ID: {}", loan.id),
            },
        ),
        ManualOutcome::Returned(outcome) => {
            let returned = ReturnResponse::from(outcome);
            (
                StatusCode::OK,
                ManualEntryResponse {
                    action: ManualAction::Return,
                    loan_id: returned.loan_id,
                    days_overdue: Some(returned.days_overdue),
                    message: returned.message,
                },
            )
        }
    };

    let (status, body) = response;
    Ok((status, Json(body)))
}

/// Loan history
#[utoipa::path(
    get,
    path = "/loans/history",
    tag = "loans",
    params(LoanQuery),
    responses(
        (status = 200, description = "Loans, newest first", body = LoanPage)
    )
)]
pub async fn history(
    State(state): State<AppState>,
    Query(query): Query<LoanQuery>,
) -> AppResult<Json<LoanPage>> {
    let (items, total) = state.services.loans.history(&query, today()).await?;
    let paging = query.paging();

    Ok(Json(LoanPage {
        items,
        total,
        page: paging.page,
        per_page: paging.per_page,
    }))
}

/// Open loans
#[utoipa::path(
    get,
    path = "/loans/active",
    tag = "loans",
    params(PageQuery),
    responses(
        (status = 200, description = "Open loans, soonest due first", body = LoanPage)
    )
)]
pub async fn active(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<LoanPage>> {
    let (items, total) = state.services.loans.active_loans(&query, today()).await?;
    let paging = query.paging();

    Ok(Json(LoanPage {
        items,
        total,
        page: paging.page,
        per_page: paging.per_page,
    }))
}

/// Overdue loans
#[utoipa::path(
    get,
    path = "/loans/overdue",
    tag = "loans",
    responses(
        (status = 200, description = "Open loans past their due date", body = Vec<LoanDetails>)
    )
)]
pub async fn overdue(State(state): State<AppState>) -> AppResult<Json<Vec<LoanDetails>>> {
    let loans = state.services.loans.overdue_loans(today()).await?;
    Ok(Json(loans))
}

/// Circulation counters
#[utoipa::path(
    get,
    path = "/loans/stats",
    tag = "loans",
    responses(
        (status = 200, description = "Active, overdue and today's loans", body = LoanCounts)
    )
)]
pub async fn stats(State(state): State<AppState>) -> AppResult<Json<LoanCounts>> {
    let counts = state.services.loans.counts(today()).await?;
    Ok(Json(counts))
}

/// Open loan of a book, used to pre-fill returns
#[utoipa::path(
    get,
    path = "/books/{id}/active-loan",
    tag = "loans",
    params(
        ("id" = i64, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Open loan, or null when the book is on the shelf", body = Loan),
        (status = 404, description = "Book not found")
    )
)]
pub async fn book_active_loan(
    State(state): State<AppState>,
    Path(book_id): Path<i64>,
) -> AppResult<Json<Option<Loan>>> {
    let loan = state.services.loans.active_loan_for(book_id).await?;
    Ok(Json(loan))
}

/// Open loans of a borrower
#[utoipa::path(
    get,
    path = "/users/{id}/loans",
    tag = "loans",
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User's open loans", body = Vec<LoanDetails>),
        (status = 404, description = "User not found")
    )
)]
pub async fn user_loans(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    let loans = state.services.loans.borrower_loans(user_id, today()).await?;
    Ok(Json(loans))
}

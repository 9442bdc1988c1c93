//! Loan model and circulation requests

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::book::BookShort;
use super::user::BorrowerShort;

/// Whole days by which `returned` is past `due`; zero when on time or early
pub fn overdue_days(due: NaiveDate, returned: NaiveDate) -> i32 {
    let days = (returned - due).num_days().max(0);
    i32::try_from(days).unwrap_or(i32::MAX)
}

/// Loan row. A loan with no `return_date` is open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i64,
    pub book_id: i64,
    pub borrower_id: i64,
    /// Staff member who processed the borrow
    pub staff_id: Option<i64>,
    pub loan_date: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub condition_notes: Option<String>,
    pub returned_to_staff_id: Option<i64>,
    pub days_overdue: i32,
}

impl Loan {
    pub fn is_open(&self) -> bool {
        self.return_date.is_none()
    }
}

/// Values written when a loan is opened
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub book_id: i64,
    pub borrower_id: i64,
    pub staff_id: Option<i64>,
    pub loan_date: NaiveDate,
    pub due_date: NaiveDate,
    pub notes: Option<String>,
}

/// Values written when a loan is closed
#[derive(Debug, Clone)]
pub struct LoanReturn {
    pub return_date: NaiveDate,
    pub days_overdue: i32,
    pub condition_notes: Option<String>,
    pub returned_to_staff_id: Option<i64>,
}

/// Borrow request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct BorrowBook {
    #[validate(range(min = 1))]
    pub book_id: i64,
    #[validate(range(min = 1))]
    pub borrower_id: i64,
    pub loan_date: NaiveDate,
    pub due_date: NaiveDate,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    /// Staff member processing the loan
    pub staff_id: Option<i64>,
}

/// Return request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ReturnBook {
    #[validate(range(min = 1))]
    pub book_id: i64,
    pub return_date: NaiveDate,
    /// Specific loan to close; defaults to the book's most recent open loan
    pub loan_id: Option<i64>,
    #[validate(length(max = 1000))]
    pub condition_notes: Option<String>,
    /// Staff member receiving the book
    pub staff_id: Option<i64>,
}

/// Result of a successful return
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReturnOutcome {
    pub loan_id: i64,
    pub returned: bool,
    pub days_overdue: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ManualAction {
    Borrow,
    Return,
}

/// Front-desk manual entry: one form for both directions
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ManualEntry {
    pub action: ManualAction,
    #[validate(range(min = 1))]
    pub book_id: i64,
    #[validate(range(min = 1))]
    pub borrower_id: i64,
    pub loan_date: NaiveDate,
    /// Required to borrow
    pub due_date: Option<NaiveDate>,
    /// Required to return
    pub return_date: Option<NaiveDate>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    pub staff_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManualOutcome {
    Borrowed(Loan),
    Returned(ReturnOutcome),
}

/// Loan with book and borrower, for listings
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoanDetails {
    pub id: i64,
    pub book: BookShort,
    pub borrower: BorrowerShort,
    pub staff_id: Option<i64>,
    pub loan_date: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub condition_notes: Option<String>,
    /// Stored value for returned loans, running count for open ones
    pub days_overdue: i32,
    pub is_overdue: bool,
}

impl LoanDetails {
    /// Fill the running overdue count of an open loan
    pub fn as_of(mut self, today: NaiveDate) -> Self {
        if self.return_date.is_none() {
            self.days_overdue = overdue_days(self.due_date, today);
            self.is_overdue = self.days_overdue > 0;
        }
        self
    }
}

/// Loan history filters
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LoanQuery {
    pub book_id: Option<i64>,
    pub borrower_id: Option<i64>,
    /// Only loans that have not been returned
    pub active_only: Option<bool>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl LoanQuery {
    pub fn paging(&self) -> Paging {
        Paging::new(self.page, self.per_page)
    }
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl PageQuery {
    pub fn paging(&self) -> Paging {
        Paging::new(self.page, self.per_page)
    }
}

/// Normalized page window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub page: i64,
    pub per_page: i64,
}

impl Paging {
    pub const DEFAULT_PER_PAGE: i64 = 20;
    pub const MAX_PER_PAGE: i64 = 100;

    pub fn new(page: Option<i64>, per_page: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page
                .unwrap_or(Self::DEFAULT_PER_PAGE)
                .clamp(1, Self::MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }
}

/// Circulation counters for the desk dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LoanCounts {
    pub active: i64,
    pub overdue: i64,
    pub opened_today: i64,
}

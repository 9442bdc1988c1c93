//! Repository layer for circulation data
//!
//! Every borrow or return runs inside one [`LedgerTx`]. A unit of work that
//! is dropped without [`LedgerTx::commit`] is rolled back, so an error
//! returned halfway through leaves nothing behind.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{
    error::AppResult,
    models::{
        book::{Book, BookStatus},
        loan::{Loan, LoanCounts, LoanDetails, LoanQuery, LoanReturn, NewLoan, Paging},
        user::Borrower,
        NewAuditEntry,
    },
};

pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;

/// Durable store behind the loan ledger
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Open a unit of work
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>>;

    /// Check that the store is reachable
    async fn ping(&self) -> AppResult<()>;

    /// Loans newest first, with the total matching the filters
    async fn loan_history(&self, query: &LoanQuery) -> AppResult<(Vec<LoanDetails>, i64)>;

    /// Open loans by ascending due date, with the total number of open loans
    async fn active_loans(&self, paging: Paging) -> AppResult<(Vec<LoanDetails>, i64)>;

    /// Open loans due strictly before `today`
    async fn overdue_loans(&self, today: NaiveDate) -> AppResult<Vec<LoanDetails>>;

    /// Open loans of one borrower
    async fn borrower_loans(&self, borrower_id: i64) -> AppResult<Vec<LoanDetails>>;

    async fn borrower_exists(&self, borrower_id: i64) -> AppResult<bool>;

    /// Book without taking a row lock
    async fn find_book(&self, book_id: i64) -> AppResult<Option<Book>>;

    /// Most recent open loan of a book, without taking a row lock
    async fn find_open_loan(&self, book_id: i64) -> AppResult<Option<Loan>>;

    async fn loan_counts(&self, today: NaiveDate) -> AppResult<LoanCounts>;
}

/// Unit of work over books, borrowers, loans and the audit trail.
///
/// The `*_for_update` reads lock the row until commit or rollback.
#[async_trait]
pub trait LedgerTx: Send {
    async fn book_for_update(&mut self, book_id: i64) -> AppResult<Option<Book>>;

    async fn borrower_for_update(&mut self, borrower_id: i64) -> AppResult<Option<Borrower>>;

    async fn count_open_loans(&mut self, borrower_id: i64) -> AppResult<i64>;

    async fn loan_for_update(&mut self, loan_id: i64) -> AppResult<Option<Loan>>;

    /// Most recent open loan of a book (latest loan date, then highest id)
    async fn latest_open_loan(&mut self, book_id: i64) -> AppResult<Option<Loan>>;

    /// Open loan of a book held by a given borrower
    async fn open_loan_held_by(&mut self, book_id: i64, borrower_id: i64) -> AppResult<Option<Loan>>;

    async fn insert_loan(&mut self, loan: &NewLoan) -> AppResult<Loan>;

    async fn close_loan(&mut self, loan_id: i64, closing: &LoanReturn) -> AppResult<Loan>;

    async fn set_book_status(&mut self, book_id: i64, status: BookStatus) -> AppResult<()>;

    async fn record_audit(&mut self, entry: &NewAuditEntry) -> AppResult<()>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}

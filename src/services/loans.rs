//! Loan ledger: the borrow/return state machine
//!
//! A book moves `available -> borrowed` on borrow and back on return;
//! nothing else is accepted. Every check runs before the first write, and
//! the writes of one operation share a single unit of work.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::{
    error::{AppError, AppResult, LedgerError},
    models::{
        book::BookStatus,
        loan::{
            overdue_days, BorrowBook, Loan, LoanCounts, LoanDetails, LoanQuery, LoanReturn,
            ManualAction, ManualEntry, ManualOutcome, NewLoan, PageQuery, ReturnBook,
            ReturnOutcome,
        },
        AuditAction, NewAuditEntry,
    },
    repository::{LedgerStore, LedgerTx},
};

use super::policy::LoanPolicy;

fn non_empty(notes: Option<String>) -> Option<String> {
    notes.filter(|n| !n.trim().is_empty())
}

#[derive(Clone)]
pub struct LoanLedger {
    store: Arc<dyn LedgerStore>,
    policy: LoanPolicy,
}

impl LoanLedger {
    pub fn new(store: Arc<dyn LedgerStore>, policy: LoanPolicy) -> Self {
        Self { store, policy }
    }

    /// Lend a book; returns the new open loan
    pub async fn borrow(&self, request: BorrowBook) -> AppResult<Loan> {
        let mut tx = self.store.begin().await?;
        let loan = self.borrow_in(tx.as_mut(), request).await?;
        tx.commit().await?;

        tracing::info!(
            "Book {} borrowed by user {} (loan {}, due {})",
            loan.book_id, loan.borrower_id, loan.id, loan.due_date
        );
        Ok(loan)
    }

    /// Take a book back, closing its open loan
    pub async fn return_book(&self, request: ReturnBook) -> AppResult<ReturnOutcome> {
        let mut tx = self.store.begin().await?;
        let outcome = self.return_in(tx.as_mut(), request).await?;
        tx.commit().await?;

        tracing::info!(
            "Loan {} returned ({} day(s) overdue)",
            outcome.loan_id, outcome.days_overdue
        );
        Ok(outcome)
    }

    /// Open loan of a book, if any
    pub async fn active_loan_for(&self, book_id: i64) -> AppResult<Option<Loan>> {
        self.store
            .find_book(book_id)
            .await?
            .ok_or(LedgerError::BookNotFound(book_id))?;
        self.store.find_open_loan(book_id).await
    }

    /// Front-desk form that names the action instead of calling borrow/return
    pub async fn manual_entry(&self, entry: ManualEntry) -> AppResult<ManualOutcome> {
        match entry.action {
            ManualAction::Borrow => {
                let due_date = entry.due_date.ok_or_else(|| {
                    AppError::Validation("due_date is required to borrow".to_string())
                })?;
                let loan = self
                    .borrow(BorrowBook {
                        book_id: entry.book_id,
                        borrower_id: entry.borrower_id,
                        loan_date: entry.loan_date,
                        due_date,
                        notes: entry.notes,
                        staff_id: entry.staff_id,
                    })
                    .await?;
                Ok(ManualOutcome::Borrowed(loan))
            }
            ManualAction::Return => {
                let return_date = entry.return_date.ok_or_else(|| {
                    AppError::Validation("return_date is required to return".to_string())
                })?;

                let mut tx = self.store.begin().await?;
                // Book row first, same lock order as return_book
                let book = tx
                    .book_for_update(entry.book_id)
                    .await?
                    .ok_or(LedgerError::BookNotFound(entry.book_id))?;
                if book.status != BookStatus::Borrowed {
                    return Err(LedgerError::BookNotBorrowed(book.id).into());
                }

                // Prefer the loan held by the named borrower
                let held = tx
                    .open_loan_held_by(entry.book_id, entry.borrower_id)
                    .await?;
                tracing::debug!(
                    "Manual return of book {}: loan held by user {}: {:?}",
                    entry.book_id, entry.borrower_id, held.as_ref().map(|l| l.id)
                );

                let request = ReturnBook {
                    book_id: entry.book_id,
                    return_date,
                    loan_id: held.map(|l| l.id),
                    condition_notes: entry.notes,
                    staff_id: entry.staff_id,
                };
                let outcome = self.return_in(tx.as_mut(), request).await?;
                tx.commit().await?;

                tracing::info!(
                    "Loan {} returned from manual entry ({} day(s) overdue)",
                    outcome.loan_id, outcome.days_overdue
                );
                Ok(ManualOutcome::Returned(outcome))
            }
        }
    }

    async fn borrow_in(&self, tx: &mut dyn LedgerTx, request: BorrowBook) -> AppResult<Loan> {
        if request.due_date < request.loan_date {
            return Err(LedgerError::InvalidDateRange(format!(
                "due date {} is before loan date {}",
                request.due_date, request.loan_date
            ))
            .into());
        }

        let book = tx
            .book_for_update(request.book_id)
            .await?
            .ok_or(LedgerError::BookNotFound(request.book_id))?;
        if book.status != BookStatus::Available {
            return Err(LedgerError::BookNotAvailable(book.id).into());
        }

        let borrower = tx
            .borrower_for_update(request.borrower_id)
            .await?
            .ok_or(LedgerError::BorrowerNotFound(request.borrower_id))?;
        if !borrower.is_active {
            return Err(LedgerError::BorrowerInactive(borrower.id).into());
        }

        let active = tx.count_open_loans(borrower.id).await?;
        let limit = self.policy.limit_for(&borrower.role);
        if active >= i64::from(limit) {
            return Err(LedgerError::BorrowingLimitExceeded {
                borrower_id: borrower.id,
                active,
                limit,
            }
            .into());
        }

        let loan = tx
            .insert_loan(&NewLoan {
                book_id: book.id,
                borrower_id: borrower.id,
                staff_id: request.staff_id,
                loan_date: request.loan_date,
                due_date: request.due_date,
                notes: non_empty(request.notes),
            })
            .await?;
        tx.set_book_status(book.id, BookStatus::Borrowed).await?;
        tx.record_audit(&NewAuditEntry::loan(
            request.staff_id,
            AuditAction::LoanBorrowed,
            loan.id,
            book.id,
        ))
        .await?;

        Ok(loan)
    }

    async fn return_in(&self, tx: &mut dyn LedgerTx, request: ReturnBook) -> AppResult<ReturnOutcome> {
        let book = tx
            .book_for_update(request.book_id)
            .await?
            .ok_or(LedgerError::BookNotFound(request.book_id))?;
        if book.status != BookStatus::Borrowed {
            return Err(LedgerError::BookNotBorrowed(book.id).into());
        }

        let loan = match request.loan_id {
            Some(loan_id) => {
                let loan = tx
                    .loan_for_update(loan_id)
                    .await?
                    .ok_or(LedgerError::LoanNotFound(loan_id))?;
                if loan.book_id != book.id {
                    return Err(LedgerError::LoanBookMismatch {
                        loan_id,
                        book_id: book.id,
                    }
                    .into());
                }
                if !loan.is_open() {
                    return Err(LedgerError::LoanAlreadyReturned(loan_id).into());
                }
                loan
            }
            None => match tx.latest_open_loan(book.id).await? {
                Some(loan) => loan,
                None => {
                    tracing::warn!("Book {} is borrowed but has no open loan", book.id);
                    return Err(LedgerError::OrphanedBorrowedBook(book.id).into());
                }
            },
        };

        if request.return_date < loan.loan_date {
            return Err(LedgerError::InvalidDateRange(format!(
                "return date {} is before loan date {}",
                request.return_date, loan.loan_date
            ))
            .into());
        }

        let closed = tx
            .close_loan(
                loan.id,
                &LoanReturn {
                    return_date: request.return_date,
                    days_overdue: overdue_days(loan.due_date, request.return_date),
                    condition_notes: non_empty(request.condition_notes),
                    returned_to_staff_id: request.staff_id,
                },
            )
            .await?;
        tx.set_book_status(book.id, BookStatus::Available).await?;
        tx.record_audit(&NewAuditEntry::loan(
            request.staff_id,
            AuditAction::LoanReturned,
            closed.id,
            book.id,
        ))
        .await?;

        Ok(ReturnOutcome {
            loan_id: closed.id,
            returned: true,
            days_overdue: closed.days_overdue,
        })
    }

    /// Loan history, newest first
    pub async fn history(
        &self,
        query: &LoanQuery,
        today: NaiveDate,
    ) -> AppResult<(Vec<LoanDetails>, i64)> {
        let (loans, total) = self.store.loan_history(query).await?;
        Ok((loans.into_iter().map(|l| l.as_of(today)).collect(), total))
    }

    /// Open loans, soonest due first
    pub async fn active_loans(
        &self,
        query: &PageQuery,
        today: NaiveDate,
    ) -> AppResult<(Vec<LoanDetails>, i64)> {
        let (loans, total) = self.store.active_loans(query.paging()).await?;
        Ok((loans.into_iter().map(|l| l.as_of(today)).collect(), total))
    }

    pub async fn overdue_loans(&self, today: NaiveDate) -> AppResult<Vec<LoanDetails>> {
        let loans = self.store.overdue_loans(today).await?;
        Ok(loans.into_iter().map(|l| l.as_of(today)).collect())
    }

    /// Open loans of a borrower
    pub async fn borrower_loans(
        &self,
        borrower_id: i64,
        today: NaiveDate,
    ) -> AppResult<Vec<LoanDetails>> {
        if !self.store.borrower_exists(borrower_id).await? {
            return Err(LedgerError::BorrowerNotFound(borrower_id).into());
        }
        let loans = self.store.borrower_loans(borrower_id).await?;
        Ok(loans.into_iter().map(|l| l.as_of(today)).collect())
    }

    pub async fn counts(&self, today: NaiveDate) -> AppResult<LoanCounts> {
        self.store.loan_counts(today).await
    }

    pub async fn ping(&self) -> AppResult<()> {
        self.store.ping().await
    }
}

//! In-process ledger store
//!
//! Units of work run one at a time: `begin` takes an owned lock on the
//! state and works on a copy that is written back on commit.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    error::{AppResult, LedgerError},
    models::{
        book::{Book, BookShort, BookStatus},
        loan::{Loan, LoanCounts, LoanDetails, LoanQuery, LoanReturn, NewLoan, Paging},
        user::{Borrower, BorrowerShort},
        AuditEntry, NewAuditEntry,
    },
};

use super::{LedgerStore, LedgerTx};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    books: BTreeMap<i64, Book>,
    borrowers: BTreeMap<i64, Borrower>,
    loans: BTreeMap<i64, Loan>,
    audit: Vec<AuditEntry>,
    last_loan_id: i64,
}

impl MemoryState {
    fn details(&self, loan: &Loan) -> LoanDetails {
        let book = self
            .books
            .get(&loan.book_id)
            .map(BookShort::from)
            .unwrap_or(BookShort {
                id: loan.book_id,
                title: String::new(),
                isbn: None,
            });
        let borrower = self
            .borrowers
            .get(&loan.borrower_id)
            .map(BorrowerShort::from)
            .unwrap_or(BorrowerShort {
                id: loan.borrower_id,
                name: String::new(),
            });

        LoanDetails {
            id: loan.id,
            book,
            borrower,
            staff_id: loan.staff_id,
            loan_date: loan.loan_date,
            due_date: loan.due_date,
            return_date: loan.return_date,
            notes: loan.notes.clone(),
            condition_notes: loan.condition_notes.clone(),
            days_overdue: loan.days_overdue,
            is_overdue: false,
        }
    }

    fn open_loans(&self) -> impl Iterator<Item = &Loan> {
        self.loans.values().filter(|l| l.is_open())
    }

    /// Open loans sorted by due date, then id
    fn open_by_due_date<'a>(&'a self, filter: impl Fn(&Loan) -> bool) -> Vec<&'a Loan> {
        let mut loans: Vec<&Loan> = self.open_loans().filter(|&l| filter(l)).collect();
        loans.sort_by_key(|l| (l.due_date, l.id));
        loans
    }

    fn latest_open<'a>(&'a self, filter: impl Fn(&Loan) -> bool) -> Option<&'a Loan> {
        self.open_loans()
            .filter(|&l| filter(l))
            .max_by_key(|l| (l.loan_date, l.id))
    }
}

fn page<T: Clone>(items: &[T], paging: Paging) -> Vec<T> {
    items
        .iter()
        .skip(usize::try_from(paging.offset()).unwrap_or(usize::MAX))
        .take(usize::try_from(paging.per_page).unwrap_or(usize::MAX))
        .cloned()
        .collect()
}

#[derive(Clone, Default)]
pub struct MemoryLedgerStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a catalog book
    pub async fn insert_book(&self, book: Book) {
        self.state.lock().await.books.insert(book.id, book);
    }

    /// Add or replace a directory user
    pub async fn insert_borrower(&self, borrower: Borrower) {
        self.state.lock().await.borrowers.insert(borrower.id, borrower);
    }

    pub async fn book(&self, book_id: i64) -> Option<Book> {
        self.state.lock().await.books.get(&book_id).cloned()
    }

    pub async fn loan(&self, loan_id: i64) -> Option<Loan> {
        self.state.lock().await.loans.get(&loan_id).cloned()
    }

    pub async fn loans(&self) -> Vec<Loan> {
        self.state.lock().await.loans.values().cloned().collect()
    }

    pub async fn audit_entries(&self) -> Vec<AuditEntry> {
        self.state.lock().await.audit.clone()
    }

    /// Overwrite a book status outside the ledger, e.g. to load legacy data
    pub async fn overwrite_book_status(&self, book_id: i64, status: BookStatus) {
        if let Some(book) = self.state.lock().await.books.get_mut(&book_id) {
            book.status = status;
        }
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryLedgerTx { guard, working }))
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn loan_history(&self, query: &LoanQuery) -> AppResult<(Vec<LoanDetails>, i64)> {
        let state = self.state.lock().await;
        let active_only = query.active_only.unwrap_or(false);

        let mut loans: Vec<&Loan> = state
            .loans
            .values()
            .filter(|l| query.book_id.map_or(true, |id| l.book_id == id))
            .filter(|l| query.borrower_id.map_or(true, |id| l.borrower_id == id))
            .filter(|l| !active_only || l.is_open())
            .collect();
        loans.sort_by(|a, b| (b.loan_date, b.id).cmp(&(a.loan_date, a.id)));

        let details: Vec<LoanDetails> = loans.iter().map(|l| state.details(l)).collect();
        Ok((page(&details, query.paging()), details.len() as i64))
    }

    async fn active_loans(&self, paging: Paging) -> AppResult<(Vec<LoanDetails>, i64)> {
        let state = self.state.lock().await;
        let details: Vec<LoanDetails> = state
            .open_by_due_date(|_| true)
            .into_iter()
            .map(|l| state.details(l))
            .collect();
        Ok((page(&details, paging), details.len() as i64))
    }

    async fn overdue_loans(&self, today: NaiveDate) -> AppResult<Vec<LoanDetails>> {
        let state = self.state.lock().await;
        Ok(state
            .open_by_due_date(|l| l.due_date < today)
            .into_iter()
            .map(|l| state.details(l))
            .collect())
    }

    async fn borrower_loans(&self, borrower_id: i64) -> AppResult<Vec<LoanDetails>> {
        let state = self.state.lock().await;
        Ok(state
            .open_by_due_date(|l| l.borrower_id == borrower_id)
            .into_iter()
            .map(|l| state.details(l))
            .collect())
    }

    async fn borrower_exists(&self, borrower_id: i64) -> AppResult<bool> {
        Ok(self.state.lock().await.borrowers.contains_key(&borrower_id))
    }

    async fn find_book(&self, book_id: i64) -> AppResult<Option<Book>> {
        Ok(self.state.lock().await.books.get(&book_id).cloned())
    }

    async fn find_open_loan(&self, book_id: i64) -> AppResult<Option<Loan>> {
        let state = self.state.lock().await;
        Ok(state.latest_open(|l| l.book_id == book_id).cloned())
    }

    async fn loan_counts(&self, today: NaiveDate) -> AppResult<LoanCounts> {
        let state = self.state.lock().await;
        Ok(LoanCounts {
            active: state.open_loans().count() as i64,
            overdue: state.open_loans().filter(|l| l.due_date < today).count() as i64,
            opened_today: state.loans.values().filter(|l| l.loan_date == today).count() as i64,
        })
    }
}

pub struct MemoryLedgerTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl LedgerTx for MemoryLedgerTx {
    async fn book_for_update(&mut self, book_id: i64) -> AppResult<Option<Book>> {
        Ok(self.working.books.get(&book_id).cloned())
    }

    async fn borrower_for_update(&mut self, borrower_id: i64) -> AppResult<Option<Borrower>> {
        Ok(self.working.borrowers.get(&borrower_id).cloned())
    }

    async fn count_open_loans(&mut self, borrower_id: i64) -> AppResult<i64> {
        Ok(self
            .working
            .open_loans()
            .filter(|l| l.borrower_id == borrower_id)
            .count() as i64)
    }

    async fn loan_for_update(&mut self, loan_id: i64) -> AppResult<Option<Loan>> {
        Ok(self.working.loans.get(&loan_id).cloned())
    }

    async fn latest_open_loan(&mut self, book_id: i64) -> AppResult<Option<Loan>> {
        Ok(self.working.latest_open(|l| l.book_id == book_id).cloned())
    }

    async fn open_loan_held_by(&mut self, book_id: i64, borrower_id: i64) -> AppResult<Option<Loan>> {
        Ok(self
            .working
            .latest_open(|l| l.book_id == book_id && l.borrower_id == borrower_id)
            .cloned())
    }

    async fn insert_loan(&mut self, loan: &NewLoan) -> AppResult<Loan> {
        self.working.last_loan_id += 1;
        let created = Loan {
            id: self.working.last_loan_id,
            book_id: loan.book_id,
            borrower_id: loan.borrower_id,
            staff_id: loan.staff_id,
            loan_date: loan.loan_date,
            due_date: loan.due_date,
            return_date: None,
            notes: loan.notes.clone(),
            condition_notes: None,
            returned_to_staff_id: None,
            days_overdue: 0,
        };
        self.working.loans.insert(created.id, created.clone());
        Ok(created)
    }

    async fn close_loan(&mut self, loan_id: i64, closing: &LoanReturn) -> AppResult<Loan> {
        let loan = self
            .working
            .loans
            .get_mut(&loan_id)
            .ok_or(LedgerError::LoanNotFound(loan_id))?;

        loan.return_date = Some(closing.return_date);
        loan.days_overdue = closing.days_overdue;
        if closing.condition_notes.is_some() {
            loan.condition_notes = closing.condition_notes.clone();
        }
        loan.returned_to_staff_id = closing.returned_to_staff_id;
        Ok(loan.clone())
    }

    async fn set_book_status(&mut self, book_id: i64, status: BookStatus) -> AppResult<()> {
        let book = self
            .working
            .books
            .get_mut(&book_id)
            .ok_or(LedgerError::BookNotFound(book_id))?;
        book.status = status;
        Ok(())
    }

    async fn record_audit(&mut self, entry: &NewAuditEntry) -> AppResult<()> {
        let id = self.working.audit.len() as i64 + 1;
        self.working.audit.push(AuditEntry {
            id,
            user_id: entry.user_id,
            action: entry.action,
            identifier: entry.identifier.clone(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryLedgerTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

//! PostgreSQL ledger store

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{postgres::PgRow, Pool, Postgres, Row, Transaction};

use crate::{
    error::{AppResult, LedgerError},
    models::{
        book::{Book, BookShort, BookStatus},
        loan::{Loan, LoanCounts, LoanDetails, LoanQuery, LoanReturn, NewLoan, Paging},
        user::{Borrower, BorrowerShort},
        NewAuditEntry,
    },
};

use super::{LedgerStore, LedgerTx};

const LOAN_COLUMNS: &str = "id, book_id, borrower_id, staff_id, loan_date, due_date, return_date, \
     notes, condition_notes, returned_to_staff_id, days_overdue";

const DETAILS_SELECT: &str = r#"
    SELECT l.id, l.book_id, b.title AS book_title, b.isbn AS book_isbn,
           l.borrower_id, u.name AS borrower_name, l.staff_id,
           l.loan_date, l.due_date, l.return_date, l.notes, l.condition_notes,
           l.days_overdue
    FROM loans l
    JOIN books b ON b.id = l.book_id
    JOIN users u ON u.id = l.borrower_id
"#;

fn details_from_row(row: &PgRow) -> LoanDetails {
    LoanDetails {
        id: row.get("id"),
        book: BookShort {
            id: row.get("book_id"),
            title: row.get("book_title"),
            isbn: row.get("book_isbn"),
        },
        borrower: BorrowerShort {
            id: row.get("borrower_id"),
            name: row.get("borrower_name"),
        },
        staff_id: row.get("staff_id"),
        loan_date: row.get("loan_date"),
        due_date: row.get("due_date"),
        return_date: row.get("return_date"),
        notes: row.get("notes"),
        condition_notes: row.get("condition_notes"),
        days_overdue: row.get("days_overdue"),
        is_overdue: false,
    }
}

#[derive(Clone)]
pub struct PgLedgerStore {
    pool: Pool<Postgres>,
}

impl PgLedgerStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLedgerTx { tx }))
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn loan_history(&self, query: &LoanQuery) -> AppResult<(Vec<LoanDetails>, i64)> {
        let paging = query.paging();

        let mut conditions = Vec::new();
        let mut params: Vec<i64> = Vec::new();

        if let Some(book_id) = query.book_id {
            params.push(book_id);
            conditions.push(format!("l.book_id = ${}", params.len()));
        }

        if let Some(borrower_id) = query.borrower_id {
            params.push(borrower_id);
            conditions.push(format!("l.borrower_id = ${}", params.len()));
        }

        if query.active_only.unwrap_or(false) {
            conditions.push("l.return_date IS NULL".to_string());
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_query = format!("SELECT COUNT(*) FROM loans l {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query);
        for param in &params {
            count_builder = count_builder.bind(param);
        }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_query = format!(
            "{} {} ORDER BY l.loan_date DESC, l.id DESC LIMIT {} OFFSET {}",
            DETAILS_SELECT,
            where_clause,
            paging.per_page,
            paging.offset()
        );
        let mut select_builder = sqlx::query(&select_query);
        for param in &params {
            select_builder = select_builder.bind(param);
        }
        let rows = select_builder.fetch_all(&self.pool).await?;

        Ok((rows.iter().map(details_from_row).collect(), total))
    }

    async fn active_loans(&self, paging: Paging) -> AppResult<(Vec<LoanDetails>, i64)> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM loans WHERE return_date IS NULL")
                .fetch_one(&self.pool)
                .await?;

        let rows = sqlx::query(&format!(
            "{} WHERE l.return_date IS NULL ORDER BY l.due_date ASC, l.id ASC LIMIT $1 OFFSET $2",
            DETAILS_SELECT
        ))
        .bind(paging.per_page)
        .bind(paging.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((rows.iter().map(details_from_row).collect(), total))
    }

    async fn overdue_loans(&self, today: NaiveDate) -> AppResult<Vec<LoanDetails>> {
        let rows = sqlx::query(&format!(
            "{} WHERE l.return_date IS NULL AND l.due_date < $1 ORDER BY l.due_date ASC, l.id ASC",
            DETAILS_SELECT
        ))
        .bind(today)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(details_from_row).collect())
    }

    async fn borrower_loans(&self, borrower_id: i64) -> AppResult<Vec<LoanDetails>> {
        let rows = sqlx::query(&format!(
            "{} WHERE l.borrower_id = $1 AND l.return_date IS NULL ORDER BY l.due_date ASC, l.id ASC",
            DETAILS_SELECT
        ))
        .bind(borrower_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(details_from_row).collect())
    }

    async fn borrower_exists(&self, borrower_id: i64) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(borrower_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn find_book(&self, book_id: i64) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>("SELECT id, title, isbn, status FROM books WHERE id = $1")
            .bind(book_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(book)
    }

    async fn find_open_loan(&self, book_id: i64) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(&format!(
            r#"
            SELECT {} FROM loans
            WHERE book_id = $1 AND return_date IS NULL
            ORDER BY loan_date DESC, id DESC
            LIMIT 1
            "#,
            LOAN_COLUMNS
        ))
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(loan)
    }

    async fn loan_counts(&self, today: NaiveDate) -> AppResult<LoanCounts> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) FILTER (WHERE return_date IS NULL) AS active,
                   COUNT(*) FILTER (WHERE return_date IS NULL AND due_date < $1) AS overdue,
                   COUNT(*) FILTER (WHERE loan_date = $1) AS opened_today
            FROM loans
            "#,
        )
        .bind(today)
        .fetch_one(&self.pool)
        .await?;

        Ok(LoanCounts {
            active: row.get("active"),
            overdue: row.get("overdue"),
            opened_today: row.get("opened_today"),
        })
    }
}

/// Unit of work over a Postgres transaction; dropping it rolls back
pub struct PgLedgerTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgLedgerTx {
    async fn book_for_update(&mut self, book_id: i64) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(
            "SELECT id, title, isbn, status FROM books WHERE id = $1 FOR UPDATE",
        )
        .bind(book_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(book)
    }

    async fn borrower_for_update(&mut self, borrower_id: i64) -> AppResult<Option<Borrower>> {
        let borrower = sqlx::query_as::<_, Borrower>(
            "SELECT id, name, role, is_active FROM users WHERE id = $1 FOR UPDATE",
        )
        .bind(borrower_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(borrower)
    }

    async fn count_open_loans(&mut self, borrower_id: i64) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE borrower_id = $1 AND return_date IS NULL",
        )
        .bind(borrower_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count)
    }

    async fn loan_for_update(&mut self, loan_id: i64) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(&format!(
            "SELECT {} FROM loans WHERE id = $1 FOR UPDATE",
            LOAN_COLUMNS
        ))
        .bind(loan_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(loan)
    }

    async fn latest_open_loan(&mut self, book_id: i64) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(&format!(
            r#"
            SELECT {} FROM loans
            WHERE book_id = $1 AND return_date IS NULL
            ORDER BY loan_date DESC, id DESC
            LIMIT 1
            FOR UPDATE
            "#,
            LOAN_COLUMNS
        ))
        .bind(book_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(loan)
    }

    async fn open_loan_held_by(&mut self, book_id: i64, borrower_id: i64) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(&format!(
            r#"
            SELECT {} FROM loans
            WHERE book_id = $1 AND borrower_id = $2 AND return_date IS NULL
            ORDER BY loan_date DESC, id DESC
            LIMIT 1
            FOR UPDATE
            "#,
            LOAN_COLUMNS
        ))
        .bind(book_id)
        .bind(borrower_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(loan)
    }

    async fn insert_loan(&mut self, loan: &NewLoan) -> AppResult<Loan> {
        let created = sqlx::query_as::<_, Loan>(&format!(
            r#"
            INSERT INTO loans (book_id, borrower_id, staff_id, loan_date, due_date, notes, days_overdue)
            VALUES ($1, $2, $3, $4, $5, $6, 0)
            RETURNING {}
            "#,
            LOAN_COLUMNS
        ))
        .bind(loan.book_id)
        .bind(loan.borrower_id)
        .bind(loan.staff_id)
        .bind(loan.loan_date)
        .bind(loan.due_date)
        .bind(&loan.notes)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(created)
    }

    async fn close_loan(&mut self, loan_id: i64, closing: &LoanReturn) -> AppResult<Loan> {
        let loan = sqlx::query_as::<_, Loan>(&format!(
            r#"
            UPDATE loans
            SET return_date = $1,
                days_overdue = $2,
                condition_notes = COALESCE($3, condition_notes),
                returned_to_staff_id = $4,
                updated_at = NOW()
            WHERE id = $5
            RETURNING {}
            "#,
            LOAN_COLUMNS
        ))
        .bind(closing.return_date)
        .bind(closing.days_overdue)
        .bind(&closing.condition_notes)
        .bind(closing.returned_to_staff_id)
        .bind(loan_id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or(LedgerError::LoanNotFound(loan_id))?;
        Ok(loan)
    }

    async fn set_book_status(&mut self, book_id: i64, status: BookStatus) -> AppResult<()> {
        let result = sqlx::query("UPDATE books SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(status)
            .bind(book_id)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::BookNotFound(book_id).into());
        }
        Ok(())
    }

    async fn record_audit(&mut self, entry: &NewAuditEntry) -> AppResult<()> {
        sqlx::query("INSERT INTO audit_logs (user_id, action, identifier) VALUES ($1, $2, $3)")
            .bind(entry.user_id)
            .bind(entry.action.as_str())
            .bind(&entry.identifier)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

//! Ledger tests against PostgreSQL
//!
//! Need a database in `DATABASE_URL`; run with `cargo test -- --ignored`.

use std::sync::Arc;

use chrono::NaiveDate;
use sqlx::{postgres::PgPoolOptions, PgPool};

use circulation_server::{
    models::{
        book::BookStatus,
        loan::{BorrowBook, ManualAction, ManualEntry, ReturnBook},
    },
    repository::PgLedgerStore,
    services::{LoanLedger, LoanPolicy},
    AppError, LedgerError,
};

async fn pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await
        .expect("Failed to connect to database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

async fn insert_book(pool: &PgPool, title: &str) -> i64 {
    sqlx::query_scalar("INSERT INTO books (title) VALUES ($1) RETURNING id")
        .bind(title)
        .fetch_one(pool)
        .await
        .expect("Failed to insert book")
}

async fn insert_borrower(pool: &PgPool, name: &str, role: &str) -> i64 {
    sqlx::query_scalar("INSERT INTO users (name, role) VALUES ($1, $2) RETURNING id")
        .bind(name)
        .bind(role)
        .fetch_one(pool)
        .await
        .expect("Failed to insert borrower")
}

async fn book_status(pool: &PgPool, book_id: i64) -> BookStatus {
    sqlx::query_scalar("SELECT status FROM books WHERE id = $1")
        .bind(book_id)
        .fetch_one(pool)
        .await
        .expect("Failed to read book")
}

async fn open_loans(pool: &PgPool, book_id: i64) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM loans WHERE book_id = $1 AND return_date IS NULL")
        .bind(book_id)
        .fetch_one(pool)
        .await
        .expect("Failed to count loans")
}

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 4, d).unwrap()
}

fn ledger(pool: &PgPool) -> LoanLedger {
    LoanLedger::new(Arc::new(PgLedgerStore::new(pool.clone())), LoanPolicy::default())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_pg_concurrent_borrows_of_one_book() {
    let pool = pool().await;
    let ledger = ledger(&pool);
    let book_id = insert_book(&pool, "Contended").await;

    let mut borrowers = Vec::new();
    for n in 0..6 {
        borrowers.push(insert_borrower(&pool, &format!("Reader {}", n), "elevated").await);
    }

    let attempts: Vec<_> = borrowers
        .into_iter()
        .map(|borrower_id| {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                ledger
                    .borrow(BorrowBook {
                        book_id,
                        borrower_id,
                        loan_date: date(1),
                        due_date: date(15),
                        notes: None,
                        staff_id: None,
                    })
                    .await
            })
        })
        .collect();

    let mut successes = 0;
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok(_) => successes += 1,
            Err(AppError::Ledger(LedgerError::BookNotAvailable(id))) => assert_eq!(id, book_id),
            Err(e) => panic!("unexpected error: {:?}", e),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(open_loans(&pool, book_id).await, 1);
    assert_eq!(book_status(&pool, book_id).await, BookStatus::Borrowed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_pg_manual_return_races_desk_return() {
    let pool = pool().await;
    let ledger = ledger(&pool);

    for round in 0..10 {
        let book_id = insert_book(&pool, &format!("Raced {}", round)).await;
        let borrower_id = insert_borrower(&pool, &format!("Holder {}", round), "standard").await;
        ledger
            .borrow(BorrowBook {
                book_id,
                borrower_id,
                loan_date: date(1),
                due_date: date(8),
                notes: None,
                staff_id: None,
            })
            .await
            .unwrap();

        let manual = {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                ledger
                    .manual_entry(ManualEntry {
                        action: ManualAction::Return,
                        book_id,
                        borrower_id,
                        loan_date: date(1),
                        due_date: None,
                        return_date: Some(date(10)),
                        notes: None,
                        staff_id: None,
                    })
                    .await
                    .map(|_| ())
            })
        };
        let desk = {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                ledger
                    .return_book(ReturnBook {
                        book_id,
                        return_date: date(10),
                        loan_id: None,
                        condition_notes: None,
                        staff_id: None,
                    })
                    .await
                    .map(|_| ())
            })
        };

        let results = [manual.await.unwrap(), desk.await.unwrap()];
        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1, "round {}: {:?}", round, results);
        for result in &results {
            if let Err(e) = result {
                assert!(
                    matches!(e, AppError::Ledger(LedgerError::BookNotBorrowed(_))),
                    "round {}: {:?}",
                    round,
                    e
                );
            }
        }

        assert_eq!(open_loans(&pool, book_id).await, 0);
        assert_eq!(book_status(&pool, book_id).await, BookStatus::Available);
    }
}

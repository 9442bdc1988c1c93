//! Data models for circulation

pub mod audit;
pub mod book;
pub mod loan;
pub mod user;

// Re-export commonly used types
pub use audit::{AuditAction, AuditEntry, NewAuditEntry};
pub use book::{Book, BookShort, BookStatus};
pub use loan::{BorrowBook, Loan, LoanDetails, LoanQuery, ManualEntry, ReturnBook, ReturnOutcome};
pub use user::{Borrower, BorrowerShort, BorrowingRole};

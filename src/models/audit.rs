//! Circulation audit trail

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    LoanBorrowed,
    LoanReturned,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::LoanBorrowed => "loan_borrowed",
            AuditAction::LoanReturned => "loan_returned",
        }
    }
}

/// Audit row to append
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditEntry {
    /// Staff member who performed the action
    pub user_id: Option<i64>,
    pub action: AuditAction,
    pub identifier: String,
}

impl NewAuditEntry {
    pub fn loan(user_id: Option<i64>, action: AuditAction, loan_id: i64, book_id: i64) -> Self {
        Self {
            user_id,
            action,
            identifier: format!("loan:{} book:{}", loan_id, book_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub user_id: Option<i64>,
    pub action: AuditAction,
    pub identifier: String,
    pub timestamp: DateTime<Utc>,
}

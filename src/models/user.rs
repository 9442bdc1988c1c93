//! Borrower model and borrowing roles

use serde::{Deserialize, Serialize};
use sqlx::{Decode, FromRow, Postgres};
use utoipa::ToSchema;

/// Borrowing role slug; selects the concurrent-loan limit
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BorrowingRole {
    Standard,
    Elevated,
    /// Roles configured only through `loans.role_limits`
    Other(String),
}

impl BorrowingRole {
    pub fn as_str(&self) -> &str {
        match self {
            BorrowingRole::Standard => "standard",
            BorrowingRole::Elevated => "elevated",
            BorrowingRole::Other(s) => s.as_str(),
        }
    }
}

impl std::fmt::Display for BorrowingRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for BorrowingRole {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "standard" => BorrowingRole::Standard,
            "elevated" => BorrowingRole::Elevated,
            other => BorrowingRole::Other(other.to_string()),
        }
    }
}

impl From<String> for BorrowingRole {
    fn from(s: String) -> Self {
        BorrowingRole::from(s.as_str())
    }
}

impl From<BorrowingRole> for String {
    fn from(role: BorrowingRole) -> Self {
        role.as_str().to_string()
    }
}

impl sqlx::Type<Postgres> for BorrowingRole {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for BorrowingRole {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        Ok(BorrowingRole::from(s))
    }
}

/// Borrower as read from the user directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Borrower {
    pub id: i64,
    pub name: String,
    pub role: BorrowingRole,
    pub is_active: bool,
}

impl Borrower {
    pub fn new(id: i64, name: impl Into<String>, role: BorrowingRole) -> Self {
        Self {
            id,
            name: name.into(),
            role,
            is_active: true,
        }
    }
}

/// Short borrower representation embedded in loan listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BorrowerShort {
    pub id: i64,
    pub name: String,
}

impl From<&Borrower> for BorrowerShort {
    fn from(borrower: &Borrower) -> Self {
        Self {
            id: borrower.id,
            name: borrower.name.clone(),
        }
    }
}

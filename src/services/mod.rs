//! Business logic services

pub mod loans;
pub mod policy;

use std::sync::Arc;

use crate::repository::LedgerStore;

pub use loans::LoanLedger;
pub use policy::LoanPolicy;

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub loans: LoanLedger,
}

impl Services {
    /// Create all services over the given store
    pub fn new(store: Arc<dyn LedgerStore>, policy: LoanPolicy) -> Self {
        Self {
            loans: LoanLedger::new(store, policy),
        }
    }
}

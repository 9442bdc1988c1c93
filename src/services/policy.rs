//! Borrowing limits per role

use std::collections::HashMap;

use crate::{config::LoansConfig, models::user::BorrowingRole};

/// Concurrent-loan limits, keyed by role slug
#[derive(Debug, Clone)]
pub struct LoanPolicy {
    default_limit: u32,
    role_limits: HashMap<String, u32>,
}

impl LoanPolicy {
    pub fn new(default_limit: u32, role_limits: HashMap<String, u32>) -> Self {
        Self {
            default_limit,
            role_limits: role_limits
                .into_iter()
                .map(|(role, limit)| (role.to_lowercase(), limit))
                .collect(),
        }
    }

    /// Same limit for every role
    pub fn flat(limit: u32) -> Self {
        Self::new(limit, HashMap::new())
    }

    pub fn limit_for(&self, role: &BorrowingRole) -> u32 {
        self.role_limits
            .get(role.as_str())
            .copied()
            .unwrap_or(self.default_limit)
    }
}

impl Default for LoanPolicy {
    fn default() -> Self {
        LoanPolicy::from(&LoansConfig::default())
    }
}

impl From<&LoansConfig> for LoanPolicy {
    fn from(config: &LoansConfig) -> Self {
        Self::new(config.default_limit, config.role_limits.clone())
    }
}

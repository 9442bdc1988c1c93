//! Circulation Server
//!
//! Borrow/return ledger for a small library: books move between
//! `available` and `borrowed`, loans are opened and closed with overdue
//! tracking, and everything is served as a REST JSON API.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult, LedgerError};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<services::Services>,
}

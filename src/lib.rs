//! Fleetrent Server
//!
//! Multi-tenant vehicle rental backend: clients and agencies book a vehicle
//! together with a driver, settle deposits and balances, and walk the rental
//! through its lifecycle while vehicle and driver calendars stay consistent.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}

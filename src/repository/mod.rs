//! Repository layer for storage operations
//!
//! Each aggregate has a storage trait with a PostgreSQL implementation and an
//! in-process implementation ([`memory::MemoryStore`]). Operations that must be
//! atomic (availability check + insert, payment settlement + calendar blocks,
//! return + maintenance block, cancellation + calendar release) are single
//! trait methods so each backend can run them as one unit of work.

pub mod directory;
pub mod memory;
pub mod notifications;
pub mod pricing;
pub mod rentals;
pub mod schedules;

use std::sync::Arc;

use sqlx::{Pool, Postgres};

pub use directory::DirectoryRepository;
pub use notifications::NotificationsRepository;
pub use pricing::PricingRepository;
pub use rentals::RentalsRepository;
pub use schedules::SchedulesRepository;

/// Main repository struct holding one handle per aggregate
#[derive(Clone)]
pub struct Repository {
    pub rentals: Arc<dyn RentalsRepository>,
    pub schedules: Arc<dyn SchedulesRepository>,
    pub notifications: Arc<dyn NotificationsRepository>,
    pub pricing: Arc<dyn PricingRepository>,
    pub directory: Arc<dyn DirectoryRepository>,
}

impl Repository {
    /// Create a PostgreSQL-backed repository with the given database pool
    pub fn postgres(pool: Pool<Postgres>) -> Self {
        Self {
            rentals: Arc::new(rentals::PgRentalsRepository::new(pool.clone())),
            schedules: Arc::new(schedules::PgSchedulesRepository::new(pool.clone())),
            notifications: Arc::new(notifications::PgNotificationsRepository::new(pool.clone())),
            pricing: Arc::new(pricing::PgPricingRepository::new(pool.clone())),
            directory: Arc::new(directory::PgDirectoryRepository::new(pool)),
        }
    }

    /// Create a repository where every aggregate lives in the given memory store
    pub fn memory(store: Arc<memory::MemoryStore>) -> Self {
        Self {
            rentals: store.clone(),
            schedules: store.clone(),
            notifications: store.clone(),
            pricing: store.clone(),
            directory: store,
        }
    }
}

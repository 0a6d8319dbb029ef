//! Data models for Fleetrent

pub mod directory;
pub mod enums;
pub mod notification;
pub mod payment;
pub mod pricing;
pub mod rental;
pub mod schedule;
pub mod user;

// Re-export commonly used types
pub use directory::{Agency, Organization, Vehicle};
pub use enums::{
    NotificationReason, NotificationTarget, PaymentMethod, RentalStatus, RentalType,
    ResourceType, ScheduleStatus,
};
pub use notification::{NewNotification, Notification};
pub use payment::Payment;
pub use pricing::Pricing;
pub use rental::Rental;
pub use schedule::ScheduleEntry;
pub use user::{Actor, Role, UserClaims};

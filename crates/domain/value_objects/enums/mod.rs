pub mod enrollment_statuses;
pub mod participation_statuses;
pub mod payment_statuses;
pub mod reservation_statuses;
pub mod weekdays;

pub mod class_generation;
pub mod class_payments;
pub mod enums;

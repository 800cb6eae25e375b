pub mod class_generation;
pub mod class_payments;

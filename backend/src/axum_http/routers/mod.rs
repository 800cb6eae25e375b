pub mod class_payments;
pub mod classes;

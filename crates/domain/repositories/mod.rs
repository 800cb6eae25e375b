pub mod class_participations;
pub mod classes;
pub mod enrollments;
pub mod slot_reservations;
pub mod waitlist;

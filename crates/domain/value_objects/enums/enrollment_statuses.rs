use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EnrollmentStatus {
    #[default]
    Active,
    Inactive,
}

impl Display for EnrollmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self {
            EnrollmentStatus::Active => "active",
            EnrollmentStatus::Inactive => "inactive",
        };
        write!(f, "{}", status)
    }
}

impl EnrollmentStatus {
    pub fn from_str(value: &str) -> Self {
        match value {
            "active" => EnrollmentStatus::Active,
            _ => EnrollmentStatus::Inactive,
        }
    }
}

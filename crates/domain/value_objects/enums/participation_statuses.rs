use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ParticipationStatus {
    #[default]
    Active,
    Cancelled,
}

impl Display for ParticipationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self {
            ParticipationStatus::Active => "active",
            ParticipationStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", status)
    }
}

impl ParticipationStatus {
    pub fn from_str(value: &str) -> Self {
        match value {
            "active" => ParticipationStatus::Active,
            _ => ParticipationStatus::Cancelled,
        }
    }
}

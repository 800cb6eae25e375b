use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{entities::classes::InsertClassEntity, value_objects::enums::weekdays::Weekday};

/// Scalar fields every generated class inherits unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassTemplate {
    pub name: String,
    pub club_id: Uuid,
    pub level_from: i32,
    pub level_to: i32,
    pub duration_minutes: i32,
    pub monthly_price_minor: i32,
    pub capacity: i32,
    pub valid_from: NaiveDate,
    pub valid_until: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub interval_minutes: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassMultiplication {
    pub days: Vec<Weekday>,
    pub windows: Vec<TimeWindow>,
    pub courts: Vec<i32>,
    pub trainer_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedClass {
    pub name: String,
    pub club_id: Uuid,
    pub trainer_id: Uuid,
    pub day_of_week: Weekday,
    pub start_time: NaiveTime,
    pub duration_minutes: i32,
    pub court_number: i32,
    pub level_from: i32,
    pub level_to: i32,
    pub capacity: i32,
    pub monthly_price_minor: i32,
    pub valid_from: NaiveDate,
    pub valid_until: NaiveDate,
}

impl From<GeneratedClass> for InsertClassEntity {
    fn from(value: GeneratedClass) -> Self {
        Self {
            club_id: value.club_id,
            trainer_id: value.trainer_id,
            name: value.name,
            level_from: value.level_from,
            level_to: value.level_to,
            day_of_week: value.day_of_week.to_string(),
            start_time: value.start_time,
            duration_minutes: value.duration_minutes,
            court_number: value.court_number,
            capacity: value.capacity,
            monthly_price_minor: value.monthly_price_minor,
            valid_from: value.valid_from,
            valid_until: value.valid_until,
            is_active: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimeWindowModel {
    /// `HH:MM`, 24h clock.
    pub start: String,
    pub end: String,
    pub interval_minutes: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkClassRequest {
    pub name: String,
    pub club_id: Uuid,
    pub level_from: i32,
    pub level_to: i32,
    pub duration_minutes: i32,
    pub monthly_price_minor: i32,
    pub capacity: i32,
    pub valid_from: NaiveDate,
    pub valid_until: NaiveDate,
    pub days: Vec<Weekday>,
    pub time_windows: Vec<TimeWindowModel>,
    pub courts: Vec<i32>,
    pub trainer_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct BulkClassPreviewDto {
    pub total: usize,
    pub classes: Vec<GeneratedClass>,
}

#[derive(Debug, Serialize)]
pub struct BulkClassCreatedDto {
    pub created: usize,
    pub class_ids: Vec<Uuid>,
}

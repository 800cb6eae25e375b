use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::classes;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = classes)]
pub struct ClassEntity {
    pub id: Uuid,
    pub club_id: Uuid,
    pub trainer_id: Uuid,
    pub name: String,
    pub level_from: i32,
    pub level_to: i32,
    pub day_of_week: String,
    pub start_time: NaiveTime,
    pub duration_minutes: i32,
    pub court_number: i32,
    pub capacity: i32,
    pub monthly_price_minor: i32,
    pub valid_from: NaiveDate,
    pub valid_until: NaiveDate,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = classes)]
pub struct InsertClassEntity {
    pub club_id: Uuid,
    pub trainer_id: Uuid,
    pub name: String,
    pub level_from: i32,
    pub level_to: i32,
    pub day_of_week: String,
    pub start_time: NaiveTime,
    pub duration_minutes: i32,
    pub court_number: i32,
    pub capacity: i32,
    pub monthly_price_minor: i32,
    pub valid_from: NaiveDate,
    pub valid_until: NaiveDate,
    pub is_active: bool,
}

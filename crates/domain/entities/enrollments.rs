use chrono::{DateTime, NaiveTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::enrollments;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = enrollments)]
pub struct EnrollmentEntity {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub trainer_id: Uuid,
    pub club_id: Uuid,
    pub status: String,
    pub level: String,
    pub preferred_days: Vec<String>,
    pub preferred_start_time: Option<NaiveTime>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = enrollments)]
pub struct InsertEnrollmentEntity {
    pub email: String,
    pub full_name: String,
    pub trainer_id: Uuid,
    pub club_id: Uuid,
    pub status: String,
    pub level: String,
    pub preferred_days: Vec<String>,
    pub preferred_start_time: Option<NaiveTime>,
}

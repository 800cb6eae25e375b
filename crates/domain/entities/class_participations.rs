use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::class_participations;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = class_participations)]
pub struct ClassParticipationEntity {
    pub id: Uuid,
    pub class_id: Uuid,
    pub enrollment_id: Uuid,
    pub status: String,
    pub payment_status: String,
    pub payment_verified: bool,
    pub payment_method: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub subscription_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = class_participations)]
pub struct InsertClassParticipationEntity {
    pub class_id: Uuid,
    pub enrollment_id: Uuid,
    pub status: String,
    pub payment_status: String,
    pub payment_verified: bool,
}

// `subscription_id: None` leaves an existing subscription reference untouched.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = class_participations)]
pub struct MarkParticipationPaidEntity {
    pub status: String,
    pub payment_status: String,
    pub payment_verified: bool,
    pub payment_method: String,
    pub paid_at: DateTime<Utc>,
    pub subscription_id: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

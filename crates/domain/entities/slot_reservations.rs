use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::slot_reservations;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = slot_reservations)]
pub struct SlotReservationEntity {
    pub id: Uuid,
    pub slot_id: Uuid,
    pub user_id: Uuid,
    pub status: String,
    pub payment_status: String,
    pub provider_session_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = slot_reservations)]
pub struct InsertSlotReservationEntity {
    pub slot_id: Uuid,
    pub user_id: Uuid,
    pub status: String,
    pub payment_status: String,
    pub provider_session_ref: Option<String>,
}

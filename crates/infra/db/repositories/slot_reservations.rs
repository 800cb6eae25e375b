use anyhow::{Context, Result};
use async_trait::async_trait;
use diesel::{RunQueryDsl, insert_into, prelude::*};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::slot_reservations},
};
use domain::{
    entities::slot_reservations::{InsertSlotReservationEntity, SlotReservationEntity},
    repositories::slot_reservations::SlotReservationRepository,
};

pub struct SlotReservationPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SlotReservationPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SlotReservationRepository for SlotReservationPostgres {
    async fn find_by_slot_and_user(
        &self,
        slot_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<SlotReservationEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let reservation = slot_reservations::table
            .filter(slot_reservations::slot_id.eq(slot_id))
            .filter(slot_reservations::user_id.eq(user_id))
            .select(SlotReservationEntity::as_select())
            .first::<SlotReservationEntity>(&mut conn)
            .optional()?;

        Ok(reservation)
    }

    async fn create(&self, reservation: InsertSlotReservationEntity) -> Result<Uuid> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let inserted = insert_into(slot_reservations::table)
            .values(&reservation)
            .on_conflict((slot_reservations::slot_id, slot_reservations::user_id))
            .do_nothing()
            .returning(slot_reservations::id)
            .get_result::<Uuid>(&mut conn)
            .optional()?;

        if let Some(id) = inserted {
            return Ok(id);
        }

        // Lost the race to a concurrent confirmation; hand back the winner.
        slot_reservations::table
            .filter(slot_reservations::slot_id.eq(reservation.slot_id))
            .filter(slot_reservations::user_id.eq(reservation.user_id))
            .select(slot_reservations::id)
            .first::<Uuid>(&mut conn)
            .context("slot reservation conflicted but no existing row was found")
    }
}

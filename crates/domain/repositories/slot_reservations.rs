use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::slot_reservations::{
    InsertSlotReservationEntity, SlotReservationEntity,
};

#[automock]
#[async_trait]
pub trait SlotReservationRepository {
    async fn find_by_slot_and_user(
        &self,
        slot_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<SlotReservationEntity>>;

    async fn create(&self, reservation: InsertSlotReservationEntity) -> Result<Uuid>;
}

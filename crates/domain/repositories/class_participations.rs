use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::class_participations::ClassParticipationEntity,
    value_objects::class_payments::{ClassPaymentCommit, ClassPaymentCommitResult},
};

#[automock]
#[async_trait]
pub trait ClassParticipationRepository {
    async fn find_by_class_and_enrollments(
        &self,
        class_id: Uuid,
        enrollment_ids: Vec<Uuid>,
    ) -> Result<Option<ClassParticipationEntity>>;

    /// Applies the whole write phase of a class payment atomically.
    async fn record_class_payment(
        &self,
        commit: ClassPaymentCommit,
    ) -> Result<ClassPaymentCommitResult>;
}

use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::enrollments::EnrollmentEntity;

#[automock]
#[async_trait]
pub trait EnrollmentRepository {
    /// All enrollments, in any status, for the triple; oldest first.
    async fn find_by_email_trainer_club(
        &self,
        email: &str,
        trainer_id: Uuid,
        club_id: Uuid,
    ) -> Result<Vec<EnrollmentEntity>>;
}

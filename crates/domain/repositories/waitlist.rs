use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

#[automock]
#[async_trait]
pub trait WaitlistRepository {
    /// Returns how many entries were deleted.
    async fn remove_entry(&self, class_id: Uuid, user_id: Uuid) -> Result<usize>;
}

use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::classes::{ClassEntity, InsertClassEntity};

#[automock]
#[async_trait]
pub trait ClassRepository {
    async fn find_by_id(&self, class_id: Uuid) -> Result<Option<ClassEntity>>;

    /// Inserts all rows in one statement and returns their ids in input order.
    async fn insert_many(&self, classes: Vec<InsertClassEntity>) -> Result<Vec<Uuid>>;
}

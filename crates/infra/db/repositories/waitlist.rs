use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, delete, prelude::*};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::repositories::waitlist::WaitlistRepository,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::waitlist_entries},
};

pub struct WaitlistPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl WaitlistPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl WaitlistRepository for WaitlistPostgres {
    async fn remove_entry(&self, class_id: Uuid, user_id: Uuid) -> Result<usize> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let deleted = delete(waitlist_entries::table)
            .filter(waitlist_entries::class_id.eq(class_id))
            .filter(waitlist_entries::user_id.eq(user_id))
            .execute(&mut conn)?;

        Ok(deleted)
    }
}

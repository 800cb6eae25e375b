use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, insert_into, prelude::*};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::classes},
};
use domain::{
    entities::classes::{ClassEntity, InsertClassEntity},
    repositories::classes::ClassRepository,
};

/// Postgres caps a statement at 65535 bind parameters; a class row binds 14.
const CLASS_INSERT_CHUNK_ROWS: usize = 65_535 / 14;

pub struct ClassPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl ClassPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl ClassRepository for ClassPostgres {
    async fn find_by_id(&self, class_id: Uuid) -> Result<Option<ClassEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let class = classes::table
            .filter(classes::id.eq(class_id))
            .select(ClassEntity::as_select())
            .first::<ClassEntity>(&mut conn)
            .optional()?;

        Ok(class)
    }

    async fn insert_many(&self, new_classes: Vec<InsertClassEntity>) -> Result<Vec<Uuid>> {
        if new_classes.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = Arc::clone(&self.db_pool).get()?;

        let ids = conn.transaction::<Vec<Uuid>, diesel::result::Error, _>(|tx| {
            let mut ids = Vec::with_capacity(new_classes.len());
            for chunk in new_classes.chunks(CLASS_INSERT_CHUNK_ROWS) {
                let chunk_ids = insert_into(classes::table)
                    .values(chunk)
                    .returning(classes::id)
                    .get_results::<Uuid>(tx)?;
                ids.extend(chunk_ids);
            }
            Ok(ids)
        })?;

        Ok(ids)
    }
}

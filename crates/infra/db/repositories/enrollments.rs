use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, prelude::*};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{
        postgres_connection::PgPoolSquad, schema::enrollments, sql_functions::lower,
    },
};
use domain::{entities::enrollments::EnrollmentEntity, repositories::enrollments::EnrollmentRepository};

pub struct EnrollmentPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl EnrollmentPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl EnrollmentRepository for EnrollmentPostgres {
    async fn find_by_email_trainer_club(
        &self,
        email: &str,
        trainer_id: Uuid,
        club_id: Uuid,
    ) -> Result<Vec<EnrollmentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = enrollments::table
            .filter(lower(enrollments::email).eq(email.trim().to_lowercase()))
            .filter(enrollments::trainer_id.eq(trainer_id))
            .filter(enrollments::club_id.eq(club_id))
            .order(enrollments::created_at.asc())
            .select(EnrollmentEntity::as_select())
            .load::<EnrollmentEntity>(&mut conn)?;

        Ok(results)
    }
}

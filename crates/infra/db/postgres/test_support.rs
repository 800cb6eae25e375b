use std::sync::Arc;

use diesel::{
    Connection, PgConnection, RunQueryDsl,
    connection::SimpleConnection,
    r2d2::{ConnectionManager, CustomizeConnection, Error as R2d2Error, Pool},
};
use uuid::Uuid;

use super::postgres_connection::PgPoolSquad;

const MIGRATION_UP: &str =
    include_str!("../../../migrations/2025-06-01-000000_class_payments/up.sql");

/// Wraps the single pooled connection in a test transaction and builds the schema in a
/// throwaway namespace, so nothing a test writes survives it.
#[derive(Debug)]
struct IsolatedSchema;

impl CustomizeConnection<PgConnection, R2d2Error> for IsolatedSchema {
    fn on_acquire(&self, conn: &mut PgConnection) -> Result<(), R2d2Error> {
        conn.begin_test_transaction().map_err(R2d2Error::QueryError)?;

        let schema = format!("test_{}", Uuid::new_v4().simple());
        conn.batch_execute(&format!(
            "CREATE SCHEMA {schema}; SET LOCAL search_path TO {schema}, public;"
        ))
        .map_err(R2d2Error::QueryError)?;
        conn.batch_execute(MIGRATION_UP)
            .map_err(R2d2Error::QueryError)?;

        Ok(())
    }
}

/// `None` when `DATABASE_URL` is unset; database-backed tests skip themselves then.
pub(crate) fn test_pool() -> Option<Arc<PgPoolSquad>> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").ok()?;

    let pool = Pool::builder()
        .max_size(1)
        .connection_customizer(Box::new(IsolatedSchema))
        .build(ConnectionManager::<PgConnection>::new(database_url))
        .expect("test pool against DATABASE_URL");

    Some(Arc::new(pool))
}

pub(crate) fn execute(pool: &PgPoolSquad, sql: &str) {
    let mut conn = pool.get().expect("test connection");
    diesel::sql_query(sql)
        .execute(&mut conn)
        .expect("test fixture statement");
}

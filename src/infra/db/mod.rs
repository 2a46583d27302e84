//! Postgres-backed repository implementations.

mod contents;
mod fetch_history;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;

use sqlx::{
    Postgres, QueryBuilder,
    postgres::{PgPool, PgPoolOptions},
    query,
};

use crate::{application::repos::RepoError, domain::scope::Scope};

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    /// Exact match on the scope tuple; absent parts match `NULL` only.
    fn push_scope_conditions(qb: &mut QueryBuilder<'_, Postgres>, scope: &Scope) {
        qb.push(" app = ");
        qb.push_bind(scope.app.clone());
        qb.push(" AND content_type = ");
        qb.push_bind(scope.content_type.clone());
        qb.push(" AND channel IS NOT DISTINCT FROM ");
        qb.push_bind(scope.channel.clone());
        qb.push(" AND channel_object IS NOT DISTINCT FROM ");
        qb.push_bind(scope.channel_object.clone());
    }

    fn convert_count(value: i64) -> Result<u64, RepoError> {
        value
            .try_into()
            .map_err(|_| RepoError::from_persistence("count exceeds supported range"))
    }
}

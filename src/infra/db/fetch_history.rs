use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{FetchHistoryRepo, RepoError},
    domain::{entities::FetchHistoryRecord, scope::Scope},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct FetchHistoryRow {
    id: Uuid,
    app: String,
    content_type: Option<String>,
    channel: Option<String>,
    channel_object: Option<String>,
    last_fetch_dt: OffsetDateTime,
}

impl From<FetchHistoryRow> for FetchHistoryRecord {
    fn from(row: FetchHistoryRow) -> Self {
        Self {
            id: row.id,
            app: row.app,
            content_type: row.content_type,
            channel: row.channel,
            channel_object: row.channel_object,
            last_fetch_dt: row.last_fetch_dt,
        }
    }
}

#[async_trait]
impl FetchHistoryRepo for PostgresRepositories {
    async fn latest_for_scope(
        &self,
        scope: &Scope,
    ) -> Result<Option<FetchHistoryRecord>, RepoError> {
        let row = sqlx::query_as::<_, FetchHistoryRow>(
            r#"
            SELECT id, app, content_type, channel, channel_object, last_fetch_dt
            FROM dalec_fetch_history
            WHERE app = $1
              AND content_type = $2
              AND channel IS NOT DISTINCT FROM $3
              AND channel_object IS NOT DISTINCT FROM $4
            ORDER BY last_fetch_dt DESC
            LIMIT 1
            "#,
        )
        .bind(&scope.app)
        .bind(&scope.content_type)
        .bind(scope.channel.as_deref())
        .bind(scope.channel_object.as_deref())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(FetchHistoryRecord::from))
    }

    async fn create_fetch(
        &self,
        scope: &Scope,
        fetched_at: OffsetDateTime,
    ) -> Result<FetchHistoryRecord, RepoError> {
        scope.validate()?;

        let row = sqlx::query_as::<_, FetchHistoryRow>(
            r#"
            INSERT INTO dalec_fetch_history (id, app, content_type, channel, channel_object, last_fetch_dt)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, app, content_type, channel, channel_object, last_fetch_dt
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&scope.app)
        .bind(&scope.content_type)
        .bind(scope.channel.as_deref())
        .bind(scope.channel_object.as_deref())
        .bind(fetched_at)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn touch_fetch(
        &self,
        id: Uuid,
        fetched_at: OffsetDateTime,
    ) -> Result<FetchHistoryRecord, RepoError> {
        let row = sqlx::query_as::<_, FetchHistoryRow>(
            r#"
            UPDATE dalec_fetch_history
            SET last_fetch_dt = $2
            WHERE id = $1
            RETURNING id, app, content_type, channel, channel_object, last_fetch_dt
            "#,
        )
        .bind(id)
        .bind(fetched_at)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        Ok(row.into())
    }
}

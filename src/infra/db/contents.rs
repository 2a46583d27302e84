use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{
        ContentListQuery, ContentsRepo, CreateContentParams, RepoError, UpdateContentParams,
    },
    domain::{entities::ContentRecord, items::validate_content_id, scope::Scope},
};

use super::{PostgresRepositories, map_sqlx_error};

const CONTENT_COLUMNS: &str = "id, app, content_type, channel, channel_object, content_id, \
    creation_dt, last_update_dt, content_data, channel_ref, content_ref";

#[derive(sqlx::FromRow)]
struct ContentRow {
    id: Uuid,
    app: String,
    content_type: String,
    channel: Option<String>,
    channel_object: Option<String>,
    content_id: String,
    creation_dt: OffsetDateTime,
    last_update_dt: OffsetDateTime,
    content_data: Value,
    channel_ref: Option<String>,
    content_ref: Option<String>,
}

impl From<ContentRow> for ContentRecord {
    fn from(row: ContentRow) -> Self {
        Self {
            id: row.id,
            app: row.app,
            content_type: row.content_type,
            channel: row.channel,
            channel_object: row.channel_object,
            content_id: row.content_id,
            creation_dt: row.creation_dt,
            last_update_dt: row.last_update_dt,
            content_data: row.content_data,
            channel_ref: row.channel_ref,
            content_ref: row.content_ref,
        }
    }
}

#[async_trait]
impl ContentsRepo for PostgresRepositories {
    async fn find_by_content_ids(
        &self,
        scope: &Scope,
        content_ids: &[String],
    ) -> Result<Vec<ContentRecord>, RepoError> {
        if content_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(CONTENT_COLUMNS);
        qb.push(" FROM dalec_contents WHERE");
        Self::push_scope_conditions(&mut qb, scope);
        qb.push(" AND content_id = ANY(");
        qb.push_bind(content_ids.to_vec());
        qb.push(")");

        let rows = qb
            .build_query_as::<ContentRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(ContentRecord::from).collect())
    }

    async fn create_content(
        &self,
        params: CreateContentParams,
    ) -> Result<ContentRecord, RepoError> {
        let CreateContentParams {
            scope,
            item,
            channel_ref,
            content_ref,
        } = params;
        scope.validate()?;
        validate_content_id(item.id())?;

        let content_id = item.id().to_string();
        let creation_dt = item.creation_dt();
        let last_update_dt = item.last_update_dt();

        // a concurrent process may have created the same item since the lookup
        let sql = format!(
            r#"
            INSERT INTO dalec_contents ({CONTENT_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (app, content_type, COALESCE(channel, ''), COALESCE(channel_object, ''), content_id)
            DO UPDATE SET
                creation_dt = EXCLUDED.creation_dt,
                last_update_dt = EXCLUDED.last_update_dt,
                content_data = EXCLUDED.content_data
            RETURNING {CONTENT_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, ContentRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(scope.app)
            .bind(scope.content_type)
            .bind(scope.channel)
            .bind(scope.channel_object)
            .bind(content_id)
            .bind(creation_dt)
            .bind(last_update_dt)
            .bind(item.into_value())
            .bind(channel_ref)
            .bind(content_ref)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_content(
        &self,
        params: UpdateContentParams,
    ) -> Result<ContentRecord, RepoError> {
        let sql = format!(
            r#"
            UPDATE dalec_contents
            SET content_data = $2,
                creation_dt = COALESCE($3, creation_dt),
                last_update_dt = COALESCE($4, last_update_dt)
            WHERE id = $1
            RETURNING {CONTENT_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, ContentRow>(&sql)
            .bind(params.id)
            .bind(params.content_data)
            .bind(params.creation_dt)
            .bind(params.last_update_dt)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?
            .ok_or(RepoError::NotFound)?;

        Ok(row.into())
    }

    async fn ids_by_recency(&self, scope: &Scope) -> Result<Vec<Uuid>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT id FROM dalec_contents WHERE");
        Self::push_scope_conditions(&mut qb, scope);
        qb.push(" ORDER BY last_update_dt DESC, id DESC");

        qb.build_query_scalar::<Uuid>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn delete_contents(&self, ids: &[Uuid]) -> Result<u64, RepoError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query("DELETE FROM dalec_contents WHERE id = ANY($1)")
            .bind(ids.to_vec())
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn count_in_scope(&self, scope: &Scope) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM dalec_contents WHERE");
        Self::push_scope_conditions(&mut qb, scope);

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }

    async fn list_contents(
        &self,
        query: &ContentListQuery,
    ) -> Result<Vec<ContentRecord>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(CONTENT_COLUMNS);
        qb.push(" FROM dalec_contents WHERE app = ");
        qb.push_bind(query.app.clone());
        qb.push(" AND content_type = ");
        qb.push_bind(query.content_type.clone());
        qb.push(" AND channel IS NOT DISTINCT FROM ");
        qb.push_bind(query.channel.clone());

        if query.channel_objects.is_empty() {
            qb.push(" AND channel_object IS NULL");
        } else {
            qb.push(" AND channel_object = ANY(");
            qb.push_bind(query.channel_objects.clone());
            qb.push(")");
        }

        qb.push(" ORDER BY ");
        if let Some(ordering) = query.ordering.as_ref() {
            qb.push("content_data -> ");
            qb.push_bind(ordering.field.clone());
            qb.push(if ordering.descending {
                " DESC NULLS LAST, "
            } else {
                " ASC NULLS LAST, "
            });
        }
        qb.push("last_update_dt DESC, id DESC LIMIT ");
        qb.push_bind(i64::try_from(query.limit).unwrap_or(i64::MAX));

        let rows = qb
            .build_query_as::<ContentRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(ContentRecord::from).collect())
    }
}

//! In-process storage for contents and fetch history.
//!
//! Used when a storage model is set to `memory`, and by tests.

use std::{
    cmp::Ordering,
    collections::HashMap,
    sync::RwLock,
};

use async_trait::async_trait;
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{
        ContentListQuery, ContentOrdering, ContentsRepo, CreateContentParams, FetchHistoryRepo,
        RepoError, UpdateContentParams,
    },
    domain::{
        entities::{ContentRecord, FetchHistoryRecord},
        items::validate_content_id,
        scope::Scope,
    },
    util::lock,
};

const LOCK_OWNER: &str = "infra::memory";

#[derive(Default)]
pub struct MemoryRepositories {
    contents: RwLock<HashMap<Uuid, ContentRecord>>,
    history: RwLock<HashMap<Uuid, FetchHistoryRecord>>,
}

impl MemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content_count(&self) -> usize {
        lock::read(&self.contents, LOCK_OWNER, "content_count").len()
    }

    pub fn history_count(&self) -> usize {
        lock::read(&self.history, LOCK_OWNER, "history_count").len()
    }

    /// Every stored record of `scope`, newest first.
    pub fn contents_in_scope(&self, scope: &Scope) -> Vec<ContentRecord> {
        let mut records: Vec<ContentRecord> =
            lock::read(&self.contents, LOCK_OWNER, "contents_in_scope")
                .values()
                .filter(|record| record.in_scope(scope))
                .cloned()
                .collect();
        records.sort_by(by_recency);
        records
    }
}

#[async_trait]
impl ContentsRepo for MemoryRepositories {
    async fn find_by_content_ids(
        &self,
        scope: &Scope,
        content_ids: &[String],
    ) -> Result<Vec<ContentRecord>, RepoError> {
        Ok(lock::read(&self.contents, LOCK_OWNER, "find_by_content_ids")
            .values()
            .filter(|record| record.in_scope(scope) && content_ids.contains(&record.content_id))
            .cloned()
            .collect())
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

        let mut contents = lock::write(&self.contents, LOCK_OWNER, "create_content");
        // same scope and content id: overwrite the payload and dates, keep the row
        if let Some(existing) = contents
            .values_mut()
            .find(|record| record.in_scope(&scope) && record.content_id == item.id())
        {
            existing.creation_dt = item.creation_dt();
            existing.last_update_dt = item.last_update_dt();
            existing.content_data = item.into_value();
            return Ok(existing.clone());
        }

        let record = ContentRecord {
            id: Uuid::new_v4(),
            content_id: item.id().to_string(),
            creation_dt: item.creation_dt(),
            last_update_dt: item.last_update_dt(),
            content_data: item.into_value(),
            app: scope.app,
            content_type: scope.content_type,
            channel: scope.channel,
            channel_object: scope.channel_object,
            channel_ref,
            content_ref,
        };
        contents.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_content(
        &self,
        params: UpdateContentParams,
    ) -> Result<ContentRecord, RepoError> {
        let mut contents = lock::write(&self.contents, LOCK_OWNER, "update_content");
        let record = contents.get_mut(&params.id).ok_or(RepoError::NotFound)?;

        record.content_data = params.content_data;
        if let Some(creation_dt) = params.creation_dt {
            record.creation_dt = creation_dt;
        }
        if let Some(last_update_dt) = params.last_update_dt {
            record.last_update_dt = last_update_dt;
        }
        Ok(record.clone())
    }

    async fn ids_by_recency(&self, scope: &Scope) -> Result<Vec<Uuid>, RepoError> {
        Ok(self
            .contents_in_scope(scope)
            .into_iter()
            .map(|record| record.id)
            .collect())
    }

    async fn delete_contents(&self, ids: &[Uuid]) -> Result<u64, RepoError> {
        let mut contents = lock::write(&self.contents, LOCK_OWNER, "delete_contents");
        let deleted = ids.iter().filter(|id| contents.remove(*id).is_some()).count();
        Ok(deleted as u64)
    }

    async fn count_in_scope(&self, scope: &Scope) -> Result<u64, RepoError> {
        let contents = lock::read(&self.contents, LOCK_OWNER, "count_in_scope");
        Ok(contents.values().filter(|record| record.in_scope(scope)).count() as u64)
    }

    async fn list_contents(
        &self,
        query: &ContentListQuery,
    ) -> Result<Vec<ContentRecord>, RepoError> {
        let mut records: Vec<ContentRecord> =
            lock::read(&self.contents, LOCK_OWNER, "list_contents")
                .values()
                .filter(|record| matches_query(record, query))
                .cloned()
                .collect();

        match query.ordering.as_ref() {
            Some(ordering) => records.sort_by(|a, b| {
                by_payload_field(a, b, ordering).then_with(|| by_recency(a, b))
            }),
            None => records.sort_by(by_recency),
        }
        records.truncate(query.limit);
        Ok(records)
    }
}

#[async_trait]
impl FetchHistoryRepo for MemoryRepositories {
    async fn latest_for_scope(
        &self,
        scope: &Scope,
    ) -> Result<Option<FetchHistoryRecord>, RepoError> {
        Ok(lock::read(&self.history, LOCK_OWNER, "latest_for_scope")
            .values()
            .filter(|record| record.in_scope(scope))
            .max_by_key(|record| record.last_fetch_dt)
            .cloned())
    }

    async fn create_fetch(
        &self,
        scope: &Scope,
        fetched_at: OffsetDateTime,
    ) -> Result<FetchHistoryRecord, RepoError> {
        scope.validate()?;
        let record = FetchHistoryRecord {
            id: Uuid::new_v4(),
            app: scope.app.clone(),
            content_type: Some(scope.content_type.clone()),
            channel: scope.channel.clone(),
            channel_object: scope.channel_object.clone(),
            last_fetch_dt: fetched_at,
        };

        lock::write(&self.history, LOCK_OWNER, "create_fetch").insert(record.id, record.clone());
        Ok(record)
    }

    async fn touch_fetch(
        &self,
        id: Uuid,
        fetched_at: OffsetDateTime,
    ) -> Result<FetchHistoryRecord, RepoError> {
        let mut history = lock::write(&self.history, LOCK_OWNER, "touch_fetch");
        let record = history.get_mut(&id).ok_or(RepoError::NotFound)?;
        record.last_fetch_dt = fetched_at;
        Ok(record.clone())
    }
}

fn matches_query(record: &ContentRecord, query: &ContentListQuery) -> bool {
    if record.app != query.app
        || record.content_type != query.content_type
        || record.channel != query.channel
    {
        return false;
    }
    match record.channel_object.as_ref() {
        None => query.channel_objects.is_empty(),
        Some(object) => query.channel_objects.contains(object),
    }
}

fn by_recency(a: &ContentRecord, b: &ContentRecord) -> Ordering {
    b.last_update_dt
        .cmp(&a.last_update_dt)
        .then_with(|| b.id.cmp(&a.id))
}

/// Records missing the field sort last in both directions.
fn by_payload_field(a: &ContentRecord, b: &ContentRecord, ordering: &ContentOrdering) -> Ordering {
    let left = a.content_data.get(&ordering.field);
    let right = b.content_data.get(&ordering.field);
    match (left, right) {
        (Some(left), Some(right)) => {
            let order = compare_json(left, right);
            if ordering.descending {
                order.reverse()
            } else {
                order
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

// Cross-type order follows jsonb: null < string < number < boolean < array < object.
fn compare_json(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::String(left), Value::String(right)) => left.cmp(right),
        (Value::Number(left), Value::Number(right)) => left
            .as_f64()
            .partial_cmp(&right.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::Bool(left), Value::Bool(right)) => left.cmp(right),
        _ => json_rank(left).cmp(&json_rank(right)),
    }
}

fn json_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::String(_) => 1,
        Value::Number(_) => 2,
        Value::Bool(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::macros::datetime;

    use crate::domain::items::ContentItem;

    use super::*;

    fn item(id: &str, updated: OffsetDateTime, iid: Value) -> ContentItem {
        ContentItem::new(id, updated, updated).with_field("iid", iid)
    }

    async fn seed(repo: &MemoryRepositories, scope: &Scope, items: Vec<ContentItem>) {
        for item in items {
            repo.create_content(CreateContentParams::new(scope.clone(), item))
                .await
                .expect("create");
        }
    }

    fn query(scope: &Scope, ordering: Option<&str>, limit: usize) -> ContentListQuery {
        ContentListQuery {
            app: scope.app.clone(),
            content_type: scope.content_type.clone(),
            channel: scope.channel.clone(),
            channel_objects: scope.channel_object.iter().cloned().collect(),
            ordering: ordering.map(|raw| ContentOrdering::parse(raw).expect("ordering")),
            limit,
        }
    }

    #[tokio::test]
    async fn listing_orders_by_payload_field() {
        let repo = MemoryRepositories::new();
        let scope = Scope::new("gitlab", "issue");
        seed(
            &repo,
            &scope,
            vec![
                item("a", datetime!(2024-01-01 00:00 UTC), json!(3)),
                item("b", datetime!(2024-01-03 00:00 UTC), json!(1)),
                item("c", datetime!(2024-01-02 00:00 UTC), json!(2)),
                ContentItem::new("d", datetime!(2024-01-04 00:00 UTC), datetime!(2024-01-04 00:00 UTC)),
            ],
        )
        .await;

        let ids = |records: Vec<ContentRecord>| {
            records
                .into_iter()
                .map(|record| record.content_id)
                .collect::<Vec<_>>()
        };

        let ascending = repo
            .list_contents(&query(&scope, Some("iid"), 10))
            .await
            .expect("list");
        assert_eq!(ids(ascending), ["b", "c", "a", "d"]);

        let descending = repo
            .list_contents(&query(&scope, Some("-iid"), 2))
            .await
            .expect("list");
        assert_eq!(ids(descending), ["a", "c"]);

        let recent = repo
            .list_contents(&query(&scope, None, 10))
            .await
            .expect("list");
        assert_eq!(ids(recent), ["d", "b", "c", "a"]);
    }

    #[tokio::test]
    async fn listing_never_mixes_scopes() {
        let repo = MemoryRepositories::new();
        let at = datetime!(2024-01-01 00:00 UTC);
        let bare = Scope::new("gitlab", "issue");
        let project = Scope::new("gitlab", "issue").with_channel("project");
        let first = project.clone().with_channel_object("1");
        let second = project.clone().with_channel_object("2");

        seed(&repo, &bare, vec![item("bare", at, json!(0))]).await;
        seed(&repo, &project, vec![item("project", at, json!(0))]).await;
        seed(&repo, &first, vec![item("first", at, json!(0))]).await;
        seed(&repo, &second, vec![item("second", at, json!(0))]).await;

        let listed = repo.list_contents(&query(&bare, None, 10)).await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].content_id, "bare");

        let listed = repo
            .list_contents(&query(&project, None, 10))
            .await
            .expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].content_id, "project");

        let mut both = query(&project, None, 10);
        both.channel_objects = vec!["1".into(), "2".into()];
        let listed = repo.list_contents(&both).await.expect("list");
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn history_lookup_is_null_aware() {
        let repo = MemoryRepositories::new();
        let bare = Scope::new("gitlab", "issue");
        let with_object = bare.clone().with_channel_object("7");

        repo.create_fetch(&with_object, datetime!(2024-01-01 00:00 UTC))
            .await
            .expect("create");
        assert!(repo.latest_for_scope(&bare).await.expect("lookup").is_none());

        let created = repo
            .create_fetch(&bare, datetime!(2024-01-01 00:00 UTC))
            .await
            .expect("create");
        repo.touch_fetch(created.id, datetime!(2024-02-01 00:00 UTC))
            .await
            .expect("touch");

        let latest = repo
            .latest_for_scope(&bare)
            .await
            .expect("lookup")
            .expect("present");
        assert_eq!(latest.id, created.id);
        assert_eq!(latest.last_fetch_dt, datetime!(2024-02-01 00:00 UTC));
    }

    #[tokio::test]
    async fn oversized_scope_is_a_validation_error() {
        let repo = MemoryRepositories::new();
        let scope = Scope::new("gitlab", "issue").with_channel_object("x".repeat(51));
        let at = datetime!(2024-01-01 00:00 UTC);

        let err = repo
            .create_content(CreateContentParams::new(scope.clone(), ContentItem::new("1", at, at)))
            .await
            .expect_err("too long");
        assert!(matches!(err, RepoError::Validation { .. }));

        let err = repo.create_fetch(&scope, at).await.expect_err("too long");
        assert!(matches!(err, RepoError::Validation { .. }));
        assert_eq!(repo.content_count(), 0);
    }

    #[tokio::test]
    async fn creating_a_known_content_id_overwrites_it() {
        let repo = MemoryRepositories::new();
        let scope = Scope::new("gitlab", "issue").with_channel("project");
        let first = datetime!(2024-01-01 00:00 UTC);
        let second = datetime!(2024-01-02 00:00 UTC);

        let created = repo
            .create_content(CreateContentParams::new(scope.clone(), item("1", first, json!(1))))
            .await
            .expect("create");
        let again = repo
            .create_content(CreateContentParams::new(scope.clone(), item("1", second, json!(2))))
            .await
            .expect("upsert");

        assert_eq!(again.id, created.id);
        assert_eq!(again.last_update_dt, second);
        assert_eq!(again.content_data["iid"], json!(2));
        assert_eq!(repo.content_count(), 1);

        let other_scope = Scope::new("gitlab", "issue");
        repo.create_content(CreateContentParams::new(other_scope, item("1", first, json!(1))))
            .await
            .expect("other scope");
        assert_eq!(repo.content_count(), 2);
    }

    #[tokio::test]
    async fn updates_touch_only_supplied_fields() {
        let repo = MemoryRepositories::new();
        let scope = Scope::new("gitlab", "issue");
        let at = datetime!(2024-01-01 00:00 UTC);
        seed(&repo, &scope, vec![item("1", at, json!(1))]).await;
        let record = repo.contents_in_scope(&scope).remove(0);

        let updated = repo
            .update_content(UpdateContentParams {
                id: record.id,
                content_data: json!({"id": "1"}),
                creation_dt: None,
                last_update_dt: Some(datetime!(2024-03-01 00:00 UTC)),
            })
            .await
            .expect("update");

        assert_eq!(updated.creation_dt, at);
        assert_eq!(updated.last_update_dt, datetime!(2024-03-01 00:00 UTC));

        let missing = repo
            .update_content(UpdateContentParams {
                id: Uuid::new_v4(),
                content_data: json!({}),
                creation_dt: None,
                last_update_dt: None,
            })
            .await;
        assert!(matches!(missing, Err(RepoError::NotFound)));
    }
}

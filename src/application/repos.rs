//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::{
    entities::{ContentRecord, FetchHistoryRecord},
    error::DomainError,
    items::ContentItem,
    scope::Scope,
};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("record rejected: {message}")]
    Validation { message: String },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<DomainError> for RepoError {
    fn from(err: DomainError) -> Self {
        Self::Validation {
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreateContentParams {
    pub scope: Scope,
    pub item: ContentItem,
    pub channel_ref: Option<String>,
    pub content_ref: Option<String>,
}

impl CreateContentParams {
    pub fn new(scope: Scope, item: ContentItem) -> Self {
        Self {
            scope,
            item,
            channel_ref: None,
            content_ref: None,
        }
    }
}

/// Partial update; `None` timestamps are left as stored.
#[derive(Debug, Clone)]
pub struct UpdateContentParams {
    pub id: Uuid,
    pub content_data: Value,
    pub creation_dt: Option<OffsetDateTime>,
    pub last_update_dt: Option<OffsetDateTime>,
}

/// Payload field ordering, `-field` meaning descending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentOrdering {
    pub field: String,
    pub descending: bool,
}

impl ContentOrdering {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let raw = raw.trim();
        let (field, descending) = match raw.strip_prefix('-') {
            Some(field) => (field, true),
            None => (raw, false),
        };
        if field.is_empty() {
            return Err(DomainError::validation("ordering field must not be empty"));
        }
        if !field
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        {
            return Err(DomainError::validation(format!(
                "ordering field `{field}` may only contain letters, digits and underscores"
            )));
        }
        Ok(Self {
            field: field.to_string(),
            descending,
        })
    }
}

/// Read query over one or several scopes sharing `(app, content_type, channel)`.
///
/// An empty `channel_objects` selects records without a channel object.
#[derive(Debug, Clone)]
pub struct ContentListQuery {
    pub app: String,
    pub content_type: String,
    pub channel: Option<String>,
    pub channel_objects: Vec<String>,
    pub ordering: Option<ContentOrdering>,
    pub limit: usize,
}

#[async_trait]
pub trait ContentsRepo: Send + Sync {
    /// Records of exactly `scope` whose content id is in `content_ids`.
    async fn find_by_content_ids(
        &self,
        scope: &Scope,
        content_ids: &[String],
    ) -> Result<Vec<ContentRecord>, RepoError>;

    async fn create_content(
        &self,
        params: CreateContentParams,
    ) -> Result<ContentRecord, RepoError>;

    async fn update_content(
        &self,
        params: UpdateContentParams,
    ) -> Result<ContentRecord, RepoError>;

    /// Primary keys of the scope, newest `last_update_dt` first, id as tie-break.
    async fn ids_by_recency(&self, scope: &Scope) -> Result<Vec<Uuid>, RepoError>;

    async fn delete_contents(&self, ids: &[Uuid]) -> Result<u64, RepoError>;

    async fn count_in_scope(&self, scope: &Scope) -> Result<u64, RepoError>;

    async fn list_contents(
        &self,
        query: &ContentListQuery,
    ) -> Result<Vec<ContentRecord>, RepoError>;
}

#[async_trait]
pub trait FetchHistoryRepo: Send + Sync {
    /// Most recent record matching `scope` exactly (absent parts match null only).
    async fn latest_for_scope(
        &self,
        scope: &Scope,
    ) -> Result<Option<FetchHistoryRecord>, RepoError>;

    async fn create_fetch(
        &self,
        scope: &Scope,
        fetched_at: OffsetDateTime,
    ) -> Result<FetchHistoryRecord, RepoError>;

    async fn touch_fetch(
        &self,
        id: Uuid,
        fetched_at: OffsetDateTime,
    ) -> Result<FetchHistoryRecord, RepoError>;
}

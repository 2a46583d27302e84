use std::sync::Arc;

use thiserror::Error;

use crate::{
    application::repos::{ContentListQuery, ContentOrdering, ContentsRepo, RepoError},
    config::{ContentSettings, SettingsError},
    domain::{entities::ContentRecord, error::DomainError},
};

#[derive(Debug, Error)]
pub enum ListingError {
    #[error("invalid ordering: {0}")]
    InvalidOrdering(#[source] DomainError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Cached records requested by a widget.
#[derive(Debug, Clone, Default)]
pub struct ListingRequest {
    pub app: String,
    pub content_type: String,
    pub channel: Option<String>,
    pub channel_objects: Vec<String>,
    pub ordered_by: Option<String>,
}

/// Reads cached records of one or several channel objects, capped at the retention count.
#[derive(Clone)]
pub struct ContentListingService {
    contents: Arc<dyn ContentsRepo>,
    settings: Arc<ContentSettings>,
}

impl ContentListingService {
    pub fn new(contents: Arc<dyn ContentsRepo>, settings: Arc<ContentSettings>) -> Self {
        Self { contents, settings }
    }

    pub async fn list(&self, request: &ListingRequest) -> Result<Vec<ContentRecord>, ListingError> {
        let ordering = request
            .ordered_by
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .map(ContentOrdering::parse)
            .transpose()
            .map_err(ListingError::InvalidOrdering)?;
        let limit = self
            .settings
            .nb_contents_kept_for(&request.app, &request.content_type)?;

        let query = ContentListQuery {
            app: request.app.clone(),
            content_type: request.content_type.clone(),
            channel: request.channel.clone(),
            channel_objects: request.channel_objects.clone(),
            ordering,
            limit,
        };
        Ok(self.contents.list_contents(&query).await?)
    }
}

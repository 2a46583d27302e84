use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::{
    application::repos::{ContentsRepo, RepoError},
    config::{ContentSettings, SettingsError},
    domain::scope::Scope,
};

#[derive(Debug, Error)]
pub enum PruneError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Keeps the `NB_CONTENTS_KEPT` most recently updated records of a scope.
#[derive(Clone)]
pub struct RetentionPruner {
    contents: Arc<dyn ContentsRepo>,
    settings: Arc<ContentSettings>,
}

impl RetentionPruner {
    pub fn new(contents: Arc<dyn ContentsRepo>, settings: Arc<ContentSettings>) -> Self {
        Self { contents, settings }
    }

    /// Returns the number of deleted records.
    pub async fn prune(&self, scope: &Scope) -> Result<u64, PruneError> {
        let keep = self
            .settings
            .nb_contents_kept_for(&scope.app, &scope.content_type)?;
        let ids = self.contents.ids_by_recency(scope).await?;
        if ids.len() <= keep {
            return Ok(0);
        }

        let deleted = self.contents.delete_contents(&ids[keep..]).await?;
        debug!(
            target = "dalec::pruner",
            scope = %scope,
            keep,
            deleted,
            "pruned old contents"
        );
        Ok(deleted)
    }
}

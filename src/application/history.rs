use std::sync::Arc;

use time::OffsetDateTime;
use tracing::debug;

use crate::{
    application::repos::{FetchHistoryRepo, RepoError},
    domain::{entities::FetchHistoryRecord, scope::Scope},
};

/// Records the last successful fetch of each scope.
#[derive(Clone)]
pub struct FetchHistoryTracker {
    repo: Arc<dyn FetchHistoryRepo>,
}

impl FetchHistoryTracker {
    pub fn new(repo: Arc<dyn FetchHistoryRepo>) -> Self {
        Self { repo }
    }

    pub async fn get_last_fetch(
        &self,
        scope: &Scope,
    ) -> Result<Option<FetchHistoryRecord>, RepoError> {
        self.repo.latest_for_scope(scope).await
    }

    /// Stamps `scope` as fetched now. Without `existing` the current record is looked up first.
    pub async fn touch(
        &self,
        scope: &Scope,
        existing: Option<&FetchHistoryRecord>,
    ) -> Result<FetchHistoryRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let current = match existing {
            Some(record) => Some(record.id),
            None => self.repo.latest_for_scope(scope).await?.map(|record| record.id),
        };

        match current {
            Some(id) => {
                debug!(target = "dalec::history", scope = %scope, "fetch history bumped");
                self.repo.touch_fetch(id, now).await
            }
            None => {
                debug!(target = "dalec::history", scope = %scope, "fetch history created");
                self.repo.create_fetch(scope, now).await
            }
        }
    }
}

//! TTL-gated refresh of cached contents.
//!
//! One refresh of a scope fetches from the provider, updates records whose
//! payload changed, creates the unseen ones and prunes the scope when
//! something was created.

use std::{sync::Arc, time::Instant};

use metrics::{counter, histogram};
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn};

use crate::{
    application::{
        history::FetchHistoryTracker,
        locks::ScopeLocks,
        provider::{FetchRequest, ProviderError},
        pruner::{PruneError, RetentionPruner},
        registry::{ProviderRegistry, RegistryError},
        repos::{
            ContentsRepo, CreateContentParams, FetchHistoryRepo, RepoError, UpdateContentParams,
        },
    },
    config::{ContentSettings, SettingsError},
    domain::{entities::ContentRecord, error::DomainError, items::ContentItem, scope::Scope},
};

pub const METRIC_REFRESH_TOTAL: &str = "dalec_refresh_total";
pub const METRIC_REFRESH_SKIPPED_TOTAL: &str = "dalec_refresh_skipped_total";
pub const METRIC_CONTENTS_CREATED_TOTAL: &str = "dalec_contents_created_total";
pub const METRIC_CONTENTS_UPDATED_TOTAL: &str = "dalec_contents_updated_total";
pub const METRIC_CONTENTS_PRUNED_TOTAL: &str = "dalec_contents_pruned_total";
pub const METRIC_PROVIDER_FETCH_MS: &str = "dalec_provider_fetch_ms";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshCounts {
    pub created: u64,
    pub updated: u64,
    pub deleted: u64,
}

impl RefreshCounts {
    pub fn new(created: u64, updated: u64, deleted: u64) -> Self {
        Self {
            created,
            updated,
            deleted,
        }
    }

    pub fn changed(&self) -> bool {
        self.created > 0 || self.updated > 0 || self.deleted > 0
    }
}

/// `Fresh` means the TTL gate short-circuited; it is distinct from `Applied` with zero counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Fresh,
    Applied(RefreshCounts),
}

impl RefreshOutcome {
    pub fn changed(&self) -> bool {
        match self {
            RefreshOutcome::Fresh => false,
            RefreshOutcome::Applied(counts) => counts.changed(),
        }
    }

    pub fn counts(&self) -> Option<RefreshCounts> {
        match self {
            RefreshOutcome::Fresh => None,
            RefreshOutcome::Applied(counts) => Some(*counts),
        }
    }
}

#[derive(Debug, Error)]
pub enum RefreshFailure {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<PruneError> for RefreshFailure {
    fn from(err: PruneError) -> Self {
        match err {
            PruneError::Settings(err) => RefreshFailure::Settings(err),
            PruneError::Repo(err) => RefreshFailure::Repo(err),
        }
    }
}

#[derive(Debug, Error)]
#[error("refresh of `{scope}` failed")]
pub struct RefreshError {
    pub scope: Scope,
    #[source]
    pub failure: RefreshFailure,
}

/// What to do with the remaining scopes of a batch once one fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BatchPolicy {
    #[default]
    FailFast,
    ContinueOnError,
}

/// Several channel objects of one `(app, content_type, channel)`.
#[derive(Debug, Clone)]
pub struct BatchRefresh {
    pub app: String,
    pub content_type: String,
    pub channel: Option<String>,
    pub channel_objects: Vec<String>,
    pub force: bool,
    pub policy: BatchPolicy,
}

impl BatchRefresh {
    pub fn new(app: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            content_type: content_type.into(),
            channel: None,
            channel_objects: Vec::new(),
            force: false,
            policy: BatchPolicy::default(),
        }
    }

    pub fn channel(mut self, channel: Option<String>) -> Self {
        self.channel = channel;
        self
    }

    pub fn channel_objects(mut self, channel_objects: impl IntoIterator<Item = String>) -> Self {
        self.channel_objects = channel_objects.into_iter().collect();
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn policy(mut self, policy: BatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// One scope per channel object, or a single scope without one.
    pub fn scopes(&self) -> Vec<Scope> {
        let base = Scope::from_parts(
            self.app.clone(),
            self.content_type.clone(),
            self.channel.clone(),
            None,
        );
        if self.channel_objects.is_empty() {
            return vec![base];
        }
        self.channel_objects
            .iter()
            .map(|object| base.clone().with_channel_object(object.clone()))
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub outcomes: Vec<(Scope, RefreshOutcome)>,
    pub failures: Vec<RefreshError>,
}

impl BatchOutcome {
    pub fn changed(&self) -> bool {
        self.outcomes.iter().any(|(_, outcome)| outcome.changed())
    }

    pub fn totals(&self) -> RefreshCounts {
        self.outcomes
            .iter()
            .filter_map(|(_, outcome)| outcome.counts())
            .fold(RefreshCounts::default(), |acc, counts| RefreshCounts {
                created: acc.created + counts.created,
                updated: acc.updated + counts.updated,
                deleted: acc.deleted + counts.deleted,
            })
    }
}

#[derive(Clone)]
pub struct RefreshEngine {
    registry: Arc<ProviderRegistry>,
    contents: Arc<dyn ContentsRepo>,
    history: FetchHistoryTracker,
    pruner: RetentionPruner,
    settings: Arc<ContentSettings>,
    locks: ScopeLocks,
}

impl RefreshEngine {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        contents: Arc<dyn ContentsRepo>,
        history: Arc<dyn FetchHistoryRepo>,
        settings: Arc<ContentSettings>,
    ) -> Self {
        Self {
            registry,
            pruner: RetentionPruner::new(Arc::clone(&contents), Arc::clone(&settings)),
            history: FetchHistoryTracker::new(history),
            contents,
            settings,
            locks: ScopeLocks::new(),
        }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &Arc<ContentSettings> {
        &self.settings
    }

    pub fn history(&self) -> &FetchHistoryTracker {
        &self.history
    }

    #[instrument(level = "debug", skip(self, scope), fields(scope = %scope))]
    pub async fn refresh(&self, scope: &Scope, force: bool) -> Result<RefreshOutcome, RefreshError> {
        self.refresh_locked(scope, force)
            .await
            .map_err(|failure| RefreshError {
                scope: scope.clone(),
                failure,
            })
    }

    /// Refreshes every scope of `batch` in order.
    pub async fn refresh_batch(&self, batch: &BatchRefresh) -> Result<BatchOutcome, RefreshError> {
        let mut result = BatchOutcome::default();
        for scope in batch.scopes() {
            match self.refresh(&scope, batch.force).await {
                Ok(outcome) => result.outcomes.push((scope, outcome)),
                Err(err) if batch.policy == BatchPolicy::ContinueOnError => {
                    warn!(
                        target = "dalec::refresh",
                        scope = %err.scope,
                        error = %err.failure,
                        "refresh failed, continuing with the next scope"
                    );
                    result.failures.push(err);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(result)
    }

    async fn refresh_locked(
        &self,
        scope: &Scope,
        force: bool,
    ) -> Result<RefreshOutcome, RefreshFailure> {
        let _guard = self.locks.acquire(scope).await;
        counter!(METRIC_REFRESH_TOTAL, "app" => scope.app.clone()).increment(1);

        let last_fetch = if force {
            None
        } else {
            self.history.get_last_fetch(scope).await?
        };

        if let Some(last_fetch) = last_fetch.as_ref() {
            let ttl = self.settings.ttl_for(&scope.app, &scope.content_type)?;
            if last_fetch.is_fresh(OffsetDateTime::now_utc(), ttl) {
                counter!(METRIC_REFRESH_SKIPPED_TOTAL, "app" => scope.app.clone()).increment(1);
                debug!(
                    target = "dalec::refresh",
                    scope = %scope,
                    ttl_secs = ttl.as_secs(),
                    "contents still fresh"
                );
                return Ok(RefreshOutcome::Fresh);
            }
        }

        let limit = self
            .settings
            .nb_contents_kept_for(&scope.app, &scope.content_type)?;
        let provider = self.registry.get(&scope.app, true)?;

        let started = Instant::now();
        let fetched = provider.fetch(FetchRequest::for_scope(scope, limit)).await;
        histogram!(METRIC_PROVIDER_FETCH_MS, "app" => scope.app.clone())
            .record(started.elapsed().as_secs_f64() * 1000.0);
        let mut fetched = fetched?;

        if let Some((key, item)) = fetched.iter().find(|(key, item)| key.as_str() != item.id()) {
            return Err(ProviderError::invalid_item(
                &scope.app,
                DomainError::validation(format!("item `{}` is keyed as `{key}`", item.id())),
            )
            .into());
        }

        self.history.touch(scope, last_fetch.as_ref()).await?;

        if fetched.is_empty() {
            debug!(target = "dalec::refresh", scope = %scope, "provider returned no contents");
            return Ok(RefreshOutcome::Applied(RefreshCounts::default()));
        }

        let content_ids: Vec<String> = fetched.keys().cloned().collect();
        let existing = self
            .contents
            .find_by_content_ids(scope, &content_ids)
            .await?;

        let mut counts = RefreshCounts::default();
        for record in existing {
            let Some(item) = fetched.remove(&record.content_id) else {
                continue;
            };
            if self.apply_update(&record, item).await? {
                counts.updated += 1;
            }
        }

        for item in fetched.into_values() {
            self.contents
                .create_content(CreateContentParams::new(scope.clone(), item))
                .await?;
            counts.created += 1;
        }

        if counts.created > 0 {
            counts.deleted = self.pruner.prune(scope).await?;
        }

        counter!(METRIC_CONTENTS_CREATED_TOTAL, "app" => scope.app.clone())
            .increment(counts.created);
        counter!(METRIC_CONTENTS_UPDATED_TOTAL, "app" => scope.app.clone())
            .increment(counts.updated);
        counter!(METRIC_CONTENTS_PRUNED_TOTAL, "app" => scope.app.clone())
            .increment(counts.deleted);

        info!(
            target = "dalec::refresh",
            scope = %scope,
            created = counts.created,
            updated = counts.updated,
            deleted = counts.deleted,
            "contents refreshed"
        );

        Ok(RefreshOutcome::Applied(counts))
    }

    /// Writes `item` over `record` when the payloads differ; returns whether it did.
    async fn apply_update(
        &self,
        record: &ContentRecord,
        item: ContentItem,
    ) -> Result<bool, RepoError> {
        let creation_dt = item.creation_dt();
        let last_update_dt = item.last_update_dt();
        let content_data = item.into_value();
        if record.content_data == content_data {
            return Ok(false);
        }

        self.contents
            .update_content(UpdateContentParams {
                id: record.id,
                content_data,
                creation_dt: (record.creation_dt != creation_dt).then_some(creation_dt),
                last_update_dt: (record.last_update_dt != last_update_dt)
                    .then_some(last_update_dt),
            })
            .await?;
        Ok(true)
    }
}

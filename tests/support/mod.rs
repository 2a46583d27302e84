#![allow(dead_code)]

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use dalec::{
    application::{
        provider::{FetchRequest, Provider, ProviderError},
        refresh::RefreshEngine,
        registry::ProviderRegistry,
    },
    config::ContentSettings,
    domain::items::{ContentItem, FetchedContents, index_items},
    infra::memory::MemoryRepositories,
};
use time::{OffsetDateTime, macros::datetime};

pub const STUB_APP: &str = "stub";

/// Provider answering with a mutable list of items.
pub struct ScriptedProvider {
    items: Mutex<Vec<ContentItem>>,
    calls: AtomicUsize,
    failing_object: Mutex<Option<String>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new(items: Vec<ContentItem>) -> Self {
        Self {
            items: Mutex::new(items),
            calls: AtomicUsize::new(0),
            failing_object: Mutex::new(None),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fetches for `channel_object` (or without one, for `""`) fail upstream.
    pub fn failing_for(self, channel_object: &str) -> Self {
        *self.failing_object.lock().expect("lock") = Some(channel_object.to_string());
        self
    }

    pub fn set_items(&self, items: Vec<ContentItem>) {
        *self.items.lock().expect("lock") = items;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn app(&self) -> &str {
        STUB_APP
    }

    async fn fetch(&self, request: FetchRequest<'_>) -> Result<FetchedContents, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let failing = self.failing_object.lock().expect("lock").clone();
        if failing.as_deref() == Some(request.channel_object.unwrap_or_default()) {
            return Err(ProviderError::upstream(STUB_APP, "source unavailable"));
        }

        let items = self.items.lock().expect("lock").clone();
        Ok(index_items(items.into_iter().take(request.limit)))
    }
}

pub fn base_dt() -> OffsetDateTime {
    datetime!(2024-05-01 08:00 UTC)
}

/// `count` items with ids `{offset}..`, newer ids updated later.
pub fn items(offset: usize, count: usize) -> Vec<ContentItem> {
    (offset..offset + count)
        .map(|index| {
            let at = base_dt() + time::Duration::minutes(index as i64);
            ContentItem::new(index.to_string(), base_dt(), at)
                .with_field("iid", index as i64)
                .with_field("title", format!("item {index}"))
        })
        .collect()
}

pub struct Harness {
    pub engine: RefreshEngine,
    pub repo: Arc<MemoryRepositories>,
    pub provider: Arc<ScriptedProvider>,
}

pub fn harness(provider: ScriptedProvider, settings: ContentSettings) -> Harness {
    let provider = Arc::new(provider);
    let repo = Arc::new(MemoryRepositories::new());
    let registry = Arc::new(ProviderRegistry::new());
    registry
        .register(provider.clone(), false)
        .expect("register stub provider");

    let engine = RefreshEngine::new(registry, repo.clone(), repo.clone(), Arc::new(settings));
    Harness {
        engine,
        repo,
        provider,
    }
}

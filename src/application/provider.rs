//! Contract implemented by every external content source.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{error::DomainError, items::FetchedContents, scope::Scope};

/// Arguments of one provider fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest<'a> {
    pub limit: usize,
    pub content_type: &'a str,
    pub channel: Option<&'a str>,
    pub channel_object: Option<&'a str>,
}

impl<'a> FetchRequest<'a> {
    pub fn for_scope(scope: &'a Scope, limit: usize) -> Self {
        Self {
            limit,
            content_type: &scope.content_type,
            channel: scope.channel(),
            channel_object: scope.channel_object(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider `{app}` cannot serve {detail}")]
    UnsupportedScope { app: String, detail: String },
    #[error("provider `{app}` does not implement fetching")]
    NotImplemented { app: String },
    #[error("provider `{app}` returned an invalid item")]
    InvalidItem {
        app: String,
        #[source]
        source: DomainError,
    },
    #[error("upstream request of provider `{app}` failed: {message}")]
    Upstream { app: String, message: String },
}

impl ProviderError {
    pub fn unsupported(app: &str, detail: impl Into<String>) -> Self {
        Self::UnsupportedScope {
            app: app.to_string(),
            detail: detail.into(),
        }
    }

    pub fn upstream(app: &str, message: impl Into<String>) -> Self {
        Self::Upstream {
            app: app.to_string(),
            message: message.into(),
        }
    }

    pub fn invalid_item(app: &str, source: DomainError) -> Self {
        Self::InvalidItem {
            app: app.to_string(),
            source,
        }
    }
}

/// An external source bound to one `app` name.
#[async_trait]
pub trait Provider: Send + Sync {
    fn app(&self) -> &str;

    /// Identity used to make re-registration of the same provider idempotent.
    fn kind(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns at most `request.limit` items keyed by content id.
    ///
    /// Unsupported `content_type`/`channel`/`channel_object` combinations
    /// must fail with [`ProviderError::UnsupportedScope`].
    async fn fetch(&self, request: FetchRequest<'_>) -> Result<FetchedContents, ProviderError> {
        let _ = request;
        Err(ProviderError::NotImplemented {
            app: self.app().to_string(),
        })
    }
}

//! Mapping from app names to provider instances, with lazy loaders.

use std::{
    collections::{BTreeSet, HashMap},
    sync::{Arc, RwLock},
};

use thiserror::Error;
use tracing::{debug, info};

use crate::{application::provider::Provider, util::lock};

const LOCK_OWNER: &str = "application::registry";

/// Builds a provider on first use of its app name.
pub type ProviderLoader = Arc<dyn Fn() -> Result<Arc<dyn Provider>, String> + Send + Sync>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("cannot register provider for `{app}`: {reason}")]
    Registration { app: String, reason: String },
    #[error("no provider registered for app `{app}`")]
    ProviderNotFound { app: String },
    #[error("no provider registered for app `{app}` and autoload failed: {reason}")]
    AutoloadFailed { app: String, reason: String },
}

impl RegistryError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RegistryError::ProviderNotFound { .. } | RegistryError::AutoloadFailed { .. }
        )
    }
}

#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Arc<dyn Provider>>>,
    loaders: RwLock<HashMap<String, ProviderLoader>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `provider` to its app name.
    ///
    /// Without `override_existing`, registering the same instance or another
    /// instance of the same type again is a no-op and a different provider is
    /// rejected. With it, `provider` always replaces the current binding.
    pub fn register(
        &self,
        provider: Arc<dyn Provider>,
        override_existing: bool,
    ) -> Result<(), RegistryError> {
        let app = provider.app().trim().to_string();
        if app.is_empty() {
            return Err(RegistryError::Registration {
                app,
                reason: "provider declares an empty app name".to_string(),
            });
        }

        let mut providers = lock::write(&self.providers, LOCK_OWNER, "register");
        if let Some(current) = providers.get(&app).filter(|_| !override_existing) {
            if Arc::ptr_eq(current, &provider) || current.kind() == provider.kind() {
                return Ok(());
            }
            return Err(RegistryError::Registration {
                reason: format!("`{}` is already registered for this app", current.kind()),
                app,
            });
        }

        info!(
            target = "dalec::registry",
            app = %app,
            provider = provider.kind(),
            "provider registered"
        );
        providers.insert(app, provider);
        Ok(())
    }

    pub fn unregister(&self, app: &str) -> Option<Arc<dyn Provider>> {
        lock::write(&self.providers, LOCK_OWNER, "unregister").remove(app.trim())
    }

    pub fn add_loader(&self, app: impl Into<String>, loader: ProviderLoader) {
        lock::write(&self.loaders, LOCK_OWNER, "add_loader").insert(app.into(), loader);
    }

    pub fn with_loader(self, app: impl Into<String>, loader: ProviderLoader) -> Self {
        self.add_loader(app, loader);
        self
    }

    /// Looks up the provider of `app`, running its loader once when `autoload` is set.
    pub fn get(&self, app: &str, autoload: bool) -> Result<Arc<dyn Provider>, RegistryError> {
        let app = app.trim();
        if let Some(provider) = lock::read(&self.providers, LOCK_OWNER, "get").get(app) {
            return Ok(Arc::clone(provider));
        }

        if !autoload {
            return Err(RegistryError::ProviderNotFound {
                app: app.to_string(),
            });
        }

        let loader = lock::read(&self.loaders, LOCK_OWNER, "get_loader")
            .get(app)
            .cloned()
            .ok_or_else(|| RegistryError::AutoloadFailed {
                app: app.to_string(),
                reason: "no loader installed".to_string(),
            })?;

        debug!(target = "dalec::registry", app, "autoloading provider");
        let provider = loader().map_err(|reason| RegistryError::AutoloadFailed {
            app: app.to_string(),
            reason,
        })?;
        self.register(provider, false)?;
        self.get(app, false)
    }

    pub fn list_registered(&self) -> BTreeSet<String> {
        lock::read(&self.providers, LOCK_OWNER, "list_registered")
            .keys()
            .cloned()
            .collect()
    }

    pub fn list_loaders(&self) -> BTreeSet<String> {
        lock::read(&self.loaders, LOCK_OWNER, "list_loaders")
            .keys()
            .cloned()
            .collect()
    }
}

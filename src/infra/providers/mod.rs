//! Providers shipped with the binary.

pub mod example;

pub use example::ExampleProvider;

use std::sync::Arc;

use crate::{
    application::{
        provider::Provider,
        registry::{ProviderRegistry, RegistryError},
    },
    config::ProviderSettings,
};

/// Registers every bundled provider right away.
pub fn register_builtin(
    registry: &ProviderRegistry,
    settings: &ProviderSettings,
) -> Result<(), RegistryError> {
    let provider = ExampleProvider::new(settings).map_err(|err| RegistryError::Registration {
        app: example::APP.to_string(),
        reason: err.to_string(),
    })?;
    registry.register(Arc::new(provider), false)
}

/// Installs loaders so bundled providers are built on first use.
pub fn install_loaders(registry: &ProviderRegistry, settings: &ProviderSettings) {
    let settings = settings.clone();
    registry.add_loader(
        example::APP,
        Arc::new(move || -> Result<Arc<dyn Provider>, String> {
            let provider = ExampleProvider::new(&settings).map_err(|err| err.to_string())?;
            Ok(Arc::new(provider))
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loaders_build_the_example_provider_lazily() {
        let registry = ProviderRegistry::new();
        install_loaders(&registry, &ProviderSettings::default());

        assert!(registry.list_registered().is_empty());
        assert!(registry.list_loaders().contains(example::APP));

        let provider = registry.get(example::APP, true).expect("autoloaded");
        assert_eq!(provider.app(), example::APP);
    }

    #[test]
    fn builtin_registration_is_repeatable() {
        let registry = ProviderRegistry::new();
        let settings = ProviderSettings::default();
        register_builtin(&registry, &settings).expect("first");
        register_builtin(&registry, &settings).expect("same provider type");
        assert_eq!(registry.list_registered().len(), 1);
    }
}

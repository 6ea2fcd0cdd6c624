//! Provider registry.
//!
//! Providers are registered once while the process starts and only read
//! afterwards. The table sits behind an `RwLock` so that late registration
//! stays sound, but no provider can ever be removed.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, PoisonError, RwLock, RwLockReadGuard};

use tracing::debug;

use super::Provider;
use crate::config::{ConfigSource, ProviderConfig};
use crate::error::ProvisionError;

/// Builds a provider bound to a configuration scope.
pub type ProviderConstructor = Arc<dyn Fn(ProviderConfig) -> Box<dyn Provider> + Send + Sync>;

/// Mapping from provider names to constructors.
#[derive(Default)]
pub struct Registry {
    constructors: RwLock<HashMap<String, ProviderConstructor>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, ProviderConstructor>> {
        self.constructors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `constructor` under `name`.
    ///
    /// # Errors
    ///
    /// Returns `ProvisionError::DuplicateProvider` if `name` is taken.
    pub fn register<F>(&self, name: impl Into<String>, constructor: F) -> Result<(), ProvisionError>
    where
        F: Fn(ProviderConfig) -> Box<dyn Provider> + Send + Sync + 'static,
    {
        let name = name.into();
        let mut constructors = self
            .constructors
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if constructors.contains_key(&name) {
            return Err(ProvisionError::DuplicateProvider(name));
        }
        debug!("registered provider: {}", name);
        constructors.insert(name, Arc::new(constructor));
        Ok(())
    }

    /// Resolves a provider by name.
    ///
    /// A registered provider name resolves directly. Any other name is
    /// treated as a named instance and must be configured with
    /// `iaas:custom:<name>:provider` pointing at a registered provider.
    ///
    /// # Errors
    ///
    /// Returns `ProvisionError::NotFound` for unknown names.
    pub fn get(
        &self,
        name: &str,
        source: Arc<dyn ConfigSource>,
    ) -> Result<Box<dyn Provider>, ProvisionError> {
        let direct = self.read().get(name).cloned();
        if let Some(constructor) = direct {
            return Ok(constructor(ProviderConfig::new(name, name, source)));
        }

        let base = match source.get_config_string(&format!("iaas:custom:{}:provider", name)) {
            Ok(base) => base,
            Err(e) if e.is_not_found() => return Err(ProvisionError::not_found("provider", name)),
            Err(e) => return Err(e),
        };
        let constructor = self
            .read()
            .get(&base)
            .cloned()
            .ok_or_else(|| ProvisionError::not_found("provider", base.as_str()))?;
        debug!("resolved provider instance {} to {}", name, base);
        Ok(constructor(ProviderConfig::new(base, name, source)))
    }

    /// Returns true if `name` is a registered provider.
    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Returns the registered provider names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the provider to use when the caller names none.
    ///
    /// Uses `iaas:default` when configured, otherwise the only registered
    /// provider if there is exactly one.
    pub fn default_provider_name(&self, source: &dyn ConfigSource) -> Result<String, ProvisionError> {
        match source.get_config_string("iaas:default") {
            Ok(name) => return Ok(name),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        match self.names().as_slice() {
            [only] => Ok(only.clone()),
            _ => Err(ProvisionError::MissingConfig {
                key: "provider".to_string(),
            }),
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("providers", &self.names())
            .finish()
    }
}

static GLOBAL: LazyLock<Registry> = LazyLock::new(|| {
    let registry = Registry::new();
    if let Err(e) = crate::dockermachine::register(&registry) {
        tracing::error!("failed to register built-in provider: {}", e);
    }
    registry
});

/// Returns the process-wide registry with the built-in providers registered.
pub fn global() -> &'static Registry {
    &GLOBAL
}

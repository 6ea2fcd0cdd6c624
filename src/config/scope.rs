//! Per-instance view over the configuration.

use std::fmt;
use std::sync::Arc;

use super::{ConfigNode, ConfigSource};
use crate::error::ProvisionError;

/// Configuration scope of one provider instance.
///
/// A provider registered as `dockermachine` reads its settings from
/// `iaas:dockermachine:<key>`. A named instance of it (configured under
/// `iaas:custom:<instance>`) reads `iaas:custom:<instance>:<key>` first and
/// falls back to the provider-wide value.
#[derive(Clone)]
pub struct ProviderConfig {
    provider: String,
    instance: String,
    source: Arc<dyn ConfigSource>,
}

impl ProviderConfig {
    pub fn new(
        provider: impl Into<String>,
        instance: impl Into<String>,
        source: Arc<dyn ConfigSource>,
    ) -> Self {
        Self {
            provider: provider.into(),
            instance: instance.into(),
            source,
        }
    }

    /// Name the provider implementation is registered under.
    pub fn provider_name(&self) -> &str {
        &self.provider
    }

    /// Name of this instance; equal to the provider name unless the instance
    /// is configured under `iaas:custom`.
    pub fn instance_name(&self) -> &str {
        &self.instance
    }

    fn scoped_keys(&self, key: &str) -> Vec<String> {
        let mut keys = Vec::with_capacity(2);
        if self.instance != self.provider {
            keys.push(format!("iaas:custom:{}:{}", self.instance, key));
        }
        keys.push(format!("iaas:{}:{}", self.provider, key));
        keys
    }

    /// Like [`get_config`](ConfigSource::get_config), mapping absence to `None`.
    pub fn optional_config(&self, key: &str) -> Result<Option<ConfigNode>, ProvisionError> {
        match self.get_config(key) {
            Ok(node) => Ok(Some(node)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Like [`get_config_string`](ConfigSource::get_config_string), mapping
    /// absence to `None`.
    pub fn optional_string(&self, key: &str) -> Result<Option<String>, ProvisionError> {
        match self.get_config_string(key) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl ConfigSource for ProviderConfig {
    fn get_config(&self, key: &str) -> Result<ConfigNode, ProvisionError> {
        for scoped in self.scoped_keys(key) {
            match self.source.get_config(&scoped) {
                Ok(node) => return Ok(node),
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            }
        }
        Err(ProvisionError::not_found("config key", key))
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("instance", &self.instance)
            .finish_non_exhaustive()
    }
}

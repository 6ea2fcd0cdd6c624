//! Call parameter over configuration precedence.

use super::ConfigSource;
use crate::error::ProvisionError;
use crate::iaas::Params;

/// Resolves named options for one provisioning call.
///
/// An explicit call parameter always wins over the provider configuration.
/// Absence is reported as `None` for optional lookups and as
/// `ProvisionError::MissingConfig` for mandatory ones; a configured value of
/// the wrong type is an error in both cases.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    params: &'a Params,
    config: &'a dyn ConfigSource,
}

impl<'a> Resolver<'a> {
    pub fn new(params: &'a Params, config: &'a dyn ConfigSource) -> Self {
        Self { params, config }
    }

    /// Resolves `key`, which has the same name as parameter and configuration key.
    pub fn optional(&self, key: &str) -> Result<Option<String>, ProvisionError> {
        self.optional_as(key, key)
    }

    /// Resolves the parameter `param`, falling back to the configuration key `config_key`.
    pub fn optional_as(
        &self,
        param: &str,
        config_key: &str,
    ) -> Result<Option<String>, ProvisionError> {
        if let Some(value) = self.params.get(param) {
            return Ok(Some(value.clone()));
        }
        match self.config.get_config_string(config_key) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Like [`optional_as`](Self::optional_as), failing with `MissingConfig`
    /// naming `param` when neither source has a value.
    pub fn required_as(&self, param: &str, config_key: &str) -> Result<String, ProvisionError> {
        self.optional_as(param, config_key)?
            .ok_or_else(|| ProvisionError::MissingConfig {
                key: param.to_string(),
            })
    }
}

//! Provider abstraction for machine provisioning.
//!
//! A [`Provider`] creates and destroys machines on one virtualization or
//! cloud backend. Providers are looked up by name through the
//! [`registry`] and read their settings through a
//! [`ProviderConfig`](crate::config::ProviderConfig) scope.

pub mod registry;
pub mod user_data;

use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub use registry::{ProviderConstructor, Registry};
pub use user_data::{ConfigUserData, PendingUserData, UserDataSource};

/// Call parameters of a provisioning request.
pub type Params = BTreeMap<String, String>;

/// A provisioned compute instance.
///
/// Ownership passes to the caller; nothing in this crate stores machines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    /// Driver-assigned identifier.
    pub id: String,
    /// Display name, also the host name for docker-machine drivers.
    pub name: String,
    /// Provider instance that created the machine.
    #[serde(default)]
    pub provider: String,
    /// Driver that backs the machine.
    #[serde(default)]
    pub driver: String,
    /// Network address the container engine listens on.
    #[serde(default)]
    pub address: String,
    /// Opaque driver-specific connection metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_data: BTreeMap<String, String>,
    /// Parameters the machine was created with, kept for audit.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub creation_params: Params,
}

/// A pluggable machine provisioning backend.
pub trait Provider: Send + Sync {
    /// Instance name this provider was resolved under.
    fn name(&self) -> &str;

    /// Creates a machine from the given call parameters.
    fn create_machine(&self, params: Params) -> Result<Machine>;

    /// Destroys a machine previously returned by [`create_machine`](Self::create_machine).
    fn delete_machine(&self, machine: &Machine) -> Result<()>;

    /// Static usage text listing the parameters the provider understands.
    fn describe(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_machine_yaml_skips_empty_maps() {
        let machine = Machine {
            id: "web-1".to_string(),
            name: "web-1".to_string(),
            provider: "dockermachine".to_string(),
            driver: "virtualbox".to_string(),
            address: "192.168.99.100".to_string(),
            ..Default::default()
        };
        let yaml = serde_yaml::to_string(&machine).unwrap();
        assert!(!yaml.contains("custom_data"));
        assert!(!yaml.contains("creation_params"));

        let parsed: Machine = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, machine);
    }

    #[test]
    fn test_machine_yaml_minimal() {
        let parsed: Machine = serde_yaml::from_str("id: m1\nname: m1\n").unwrap();
        assert_eq!(parsed.name, "m1");
        assert!(parsed.provider.is_empty());
        assert!(parsed.creation_params.is_empty());
    }
}

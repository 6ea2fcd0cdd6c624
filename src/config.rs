//! Configuration loading and lookup.
//!
//! The configuration is a single YAML document. Keys are addressed with
//! colon-separated paths, and providers see it through a
//! [`ProviderConfig`] scope:
//!
//! ```yaml
//! iaas:
//!   default: dockermachine
//!   dockermachine:
//!     ca-path: /etc/rsmachine/certs
//!     driver:
//!       name: virtualbox
//!       options:
//!         virtualbox-memory: 2048
//!   custom:
//!     ec2-west:
//!       provider: dockermachine
//!       driver:
//!         name: amazonec2
//! ```

mod node;
mod resolve;
mod scope;

use std::fmt;
use std::fs::File;
use std::io::BufReader;

use camino::Utf8Path;

use crate::error::ProvisionError;

pub use node::ConfigNode;
pub use resolve::Resolver;
pub use scope::ProviderConfig;

/// Read access to configuration values by colon-separated key.
pub trait ConfigSource: fmt::Debug + Send + Sync {
    /// Returns the node stored under `key`.
    ///
    /// Fails with `ProvisionError::NotFound` when the key is absent or null.
    fn get_config(&self, key: &str) -> Result<ConfigNode, ProvisionError>;

    /// Returns the string stored under `key`.
    ///
    /// Fails with `NotFound` when absent and `InvalidConfig` when the value
    /// is not a string.
    fn get_config_string(&self, key: &str) -> Result<String, ProvisionError> {
        let node = self.get_config(key)?;
        node.str_value(key).map(str::to_string)
    }
}

/// A parsed configuration document.
#[derive(Debug, Clone, Default)]
pub struct Config {
    root: ConfigNode,
}

impl Config {
    /// Parses a configuration document from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ProvisionError> {
        let root: ConfigNode = serde_yaml::from_str(yaml)
            .map_err(|e| ProvisionError::Config(format!("failed to parse yaml: {}", e)))?;
        Self::from_root(root)
    }

    fn from_root(root: ConfigNode) -> Result<Self, ProvisionError> {
        match root {
            ConfigNode::Map(_) | ConfigNode::Null => Ok(Self { root }),
            other => Err(ProvisionError::Config(format!(
                "top level must be a mapping, found {}",
                other.type_name()
            ))),
        }
    }

    /// Returns the root node.
    pub fn root(&self) -> &ConfigNode {
        &self.root
    }
}

impl ConfigSource for Config {
    fn get_config(&self, key: &str) -> Result<ConfigNode, ProvisionError> {
        match self.root.lookup(key) {
            Some(node) if !node.is_null() => Ok(node.clone()),
            _ => Err(ProvisionError::not_found("config key", key)),
        }
    }
}

/// Loads a configuration document from a YAML file.
pub fn load_config(path: &Utf8Path) -> Result<Config, ProvisionError> {
    let file = File::open(path).map_err(|e| ProvisionError::io(path.as_str(), e))?;
    let reader = BufReader::new(file);
    let root: ConfigNode = serde_yaml::from_reader(reader)
        .map_err(|e| ProvisionError::Config(format!("failed to parse yaml: {}: {}", path, e)))?;
    Config::from_root(root)
}

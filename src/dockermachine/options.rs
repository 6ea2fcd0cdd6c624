//! Driver option merging.
//!
//! The final option set handed to a driver is built from three layers,
//! each overriding the previous one key by key:
//!
//! 1. the built-in defaults of the driver ([`DriverKind::defaults`])
//! 2. the `driver:options` block of the provider configuration
//! 3. the explicit call parameters

use std::fmt;

use strum::{AsRefStr, Display, EnumIter, EnumString};
use tracing::debug;

use crate::config::ConfigNode;
use crate::error::ProvisionError;
use crate::iaas::Params;

/// Configuration key of the custom options block.
pub const OPTIONS_KEY: &str = "driver:options";

/// A scalar driver option value.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl TryFrom<&ConfigNode> for OptionValue {
    type Error = &'static str;

    /// Converts scalar nodes; returns the node's type name otherwise.
    fn try_from(node: &ConfigNode) -> Result<Self, Self::Error> {
        match node {
            ConfigNode::String(s) => Ok(Self::String(s.clone())),
            ConfigNode::Integer(i) => Ok(Self::Integer(*i)),
            ConfigNode::Float(x) => Ok(Self::Float(*x)),
            ConfigNode::Bool(b) => Ok(Self::Bool(*b)),
            other => Err(other.type_name()),
        }
    }
}

/// Driver options in insertion order.
///
/// Overwriting a key keeps its original position, so the order reflects
/// where each option was first introduced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriverOptions {
    entries: Vec<(String, OptionValue)>,
}

impl DriverOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to `value`, replacing any previous value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl<K, V> FromIterator<(K, V)> for DriverOptions
where
    K: Into<String>,
    V: Into<OptionValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut options = Self::new();
        for (k, v) in iter {
            options.insert(k, v);
        }
        options
    }
}

/// Drivers with a built-in default option set.
///
/// Any other driver name is passed through to docker-machine (plugin
/// drivers) and starts from an empty option set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum DriverKind {
    Virtualbox,
    Amazonec2,
    Google,
    Digitalocean,
    Openstack,
    Generic,
}

impl DriverKind {
    /// Returns the default options of this driver.
    pub fn defaults(self) -> DriverOptions {
        match self {
            Self::Virtualbox => DriverOptions::from_iter([
                ("virtualbox-cpu-count", OptionValue::Integer(1)),
                ("virtualbox-memory", OptionValue::Integer(1024)),
                ("virtualbox-disk-size", OptionValue::Integer(20000)),
                ("virtualbox-hostonly-cidr", OptionValue::from("192.168.99.1/24")),
            ]),
            Self::Amazonec2 => DriverOptions::from_iter([
                ("amazonec2-region", OptionValue::from("us-east-1")),
                ("amazonec2-instance-type", OptionValue::from("t2.micro")),
                ("amazonec2-root-size", OptionValue::Integer(16)),
                ("amazonec2-ssh-user", OptionValue::from("ubuntu")),
                ("amazonec2-security-group", OptionValue::from("docker-machine")),
            ]),
            Self::Google => DriverOptions::from_iter([
                ("google-zone", OptionValue::from("us-central1-a")),
                ("google-machine-type", OptionValue::from("n1-standard-1")),
                ("google-disk-size", OptionValue::Integer(10)),
                ("google-username", OptionValue::from("docker-user")),
            ]),
            Self::Digitalocean => DriverOptions::from_iter([
                ("digitalocean-region", OptionValue::from("nyc3")),
                ("digitalocean-size", OptionValue::from("s-1vcpu-1gb")),
                ("digitalocean-image", OptionValue::from("ubuntu-16-04-x64")),
                ("digitalocean-ssh-user", OptionValue::from("root")),
            ]),
            Self::Openstack => DriverOptions::from_iter([
                ("openstack-ssh-user", OptionValue::from("root")),
                ("openstack-ssh-port", OptionValue::Integer(22)),
                ("openstack-active-timeout", OptionValue::Integer(200)),
            ]),
            Self::Generic => DriverOptions::from_iter([
                ("generic-ssh-user", OptionValue::from("root")),
                ("generic-ssh-port", OptionValue::Integer(22)),
            ]),
        }
    }
}

/// Returns the built-in default options for a driver name.
pub fn default_options_for_driver(driver_name: &str) -> DriverOptions {
    match driver_name.parse::<DriverKind>() {
        Ok(kind) => kind.defaults(),
        Err(_) => {
            debug!("no built-in defaults for driver {}", driver_name);
            DriverOptions::new()
        }
    }
}

/// Merges defaults, the custom options block and call parameters.
///
/// `custom` must be a mapping or null. Entries with non-string keys are
/// dropped; entries whose value is not a scalar are rejected. This function
/// has no side effects.
pub fn build_driver_options<'a>(
    defaults: DriverOptions,
    custom: Option<&ConfigNode>,
    params: impl IntoIterator<Item = (&'a String, &'a String)>,
) -> Result<DriverOptions, ProvisionError> {
    let mut options = defaults;

    if let Some(custom) = custom.filter(|node| !node.is_null()) {
        for (key, value) in custom.entries(OPTIONS_KEY)? {
            let ConfigNode::String(key) = key else {
                debug!("ignoring {} entry with {} key", OPTIONS_KEY, key.type_name());
                continue;
            };
            let value = OptionValue::try_from(value).map_err(|found| ProvisionError::InvalidConfig {
                key: format!("{}:{}", OPTIONS_KEY, key),
                message: format!("expected a scalar value, found {}", found),
            })?;
            options.insert(key.clone(), value);
        }
    }

    for (key, value) in params {
        options.insert(key.clone(), value.clone());
    }

    Ok(options)
}

/// Builds the options for `driver_name`, starting from its built-in defaults.
pub fn build_for_driver(
    driver_name: &str,
    custom: Option<&ConfigNode>,
    params: &Params,
) -> Result<DriverOptions, ProvisionError> {
    build_driver_options(default_options_for_driver(driver_name), custom, params)
}

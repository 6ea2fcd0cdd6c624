//! Typed configuration tree.

use serde::{Deserialize, Deserializer};

use crate::error::ProvisionError;

/// A node of the configuration tree.
///
/// Mapping keys keep their YAML type so that callers can decide what to do
/// with non-string keys; entries keep their document order.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ConfigNode {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<ConfigNode>),
    Map(Vec<(ConfigNode, ConfigNode)>),
}

impl ConfigNode {
    /// Returns a short name of the node's type for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "mapping",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns true for booleans, numbers and strings.
    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Bool(_) | Self::Integer(_) | Self::Float(_) | Self::String(_))
    }

    /// Looks up a direct child of a mapping by string key.
    pub fn get(&self, key: &str) -> Option<&ConfigNode> {
        let Self::Map(entries) = self else {
            return None;
        };
        entries.iter().find_map(|(k, v)| match k {
            Self::String(name) if name == key => Some(v),
            _ => None,
        })
    }

    /// Looks up a descendant by a colon-separated path (`iaas:dockermachine:ca-path`).
    pub fn lookup(&self, path: &str) -> Option<&ConfigNode> {
        path.split(':').try_fold(self, |node, segment| node.get(segment))
    }

    /// Returns the string value, failing with a description naming `key`
    /// when the node is of another type.
    pub fn str_value(&self, key: &str) -> Result<&str, ProvisionError> {
        match self {
            Self::String(value) => Ok(value),
            other => Err(type_mismatch(key, "string", other)),
        }
    }

    /// Returns a non-negative integer value.
    pub fn u64_value(&self, key: &str) -> Result<u64, ProvisionError> {
        match self {
            Self::Integer(value) => u64::try_from(*value).map_err(|_| ProvisionError::InvalidConfig {
                key: key.to_string(),
                message: format!("expected a non-negative integer, found {}", value),
            }),
            other => Err(type_mismatch(key, "integer", other)),
        }
    }

    /// Returns the entries of a mapping.
    pub fn entries(&self, key: &str) -> Result<&[(ConfigNode, ConfigNode)], ProvisionError> {
        match self {
            Self::Map(entries) => Ok(entries),
            other => Err(type_mismatch(key, "mapping", other)),
        }
    }
}

fn type_mismatch(key: &str, expected: &str, found: &ConfigNode) -> ProvisionError {
    ProvisionError::InvalidConfig {
        key: key.to_string(),
        message: format!("expected a {}, found {}", expected, found.type_name()),
    }
}

impl From<serde_yaml::Value> for ConfigNode {
    fn from(value: serde_yaml::Value) -> Self {
        use serde_yaml::Value;

        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                // u64 values above i64::MAX and real numbers
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Self::String(s),
            Value::Sequence(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Mapping(mapping) => Self::Map(
                mapping
                    .into_iter()
                    .map(|(k, v)| (Self::from(k), Self::from(v)))
                    .collect(),
            ),
            Value::Tagged(tagged) => Self::from(tagged.value),
        }
    }
}

impl<'de> Deserialize<'de> for ConfigNode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        serde_yaml::Value::deserialize(deserializer).map(Self::from)
    }
}

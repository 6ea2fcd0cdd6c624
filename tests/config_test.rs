mod helpers;

use std::sync::Arc;

use anyhow::Result;
use camino::Utf8Path;
use rsmachine::ProvisionError;
use rsmachine::config::{ConfigSource, ProviderConfig, Resolver, load_config};

use helpers::{config, params};

const CONFIG: &str = "
iaas:
  default: dockermachine
  dockermachine:
    ca-path: /etc/rsmachine/ca
    docker-install-url: https://get.docker.com
    driver:
      name: virtualbox
      options:
        virtualbox-memory: 2048
  custom:
    aws-east:
      provider: dockermachine
      driver:
        name: amazonec2
";

#[test]
fn test_load_config_from_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("rsmachine.yaml");
    std::fs::write(&path, CONFIG)?;

    let config = load_config(Utf8Path::from_path(&path).unwrap())?;

    assert_eq!(config.get_config_string("iaas:default")?, "dockermachine");
    assert_eq!(
        config.get_config_string("iaas:dockermachine:driver:name")?,
        "virtualbox"
    );
    Ok(())
}

#[test]
fn test_load_config_missing_file() {
    let err = load_config(Utf8Path::new("/nonexistent/rsmachine.yaml")).unwrap_err();
    assert!(matches!(err, ProvisionError::Io { .. }), "unexpected error: {}", err);
}

#[test]
fn test_load_config_invalid_yaml() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("broken.yaml");
    std::fs::write(&path, "iaas: [unterminated\n")?;

    let err = load_config(Utf8Path::from_path(&path).unwrap()).unwrap_err();
    assert!(matches!(err, ProvisionError::Config(_)), "unexpected error: {}", err);
    Ok(())
}

#[test]
fn test_instance_scope_falls_back_to_provider() -> Result<()> {
    let scope = ProviderConfig::new("dockermachine", "aws-east", config(CONFIG));

    assert_eq!(scope.get_config_string("driver:name")?, "amazonec2");
    assert_eq!(scope.get_config_string("ca-path")?, "/etc/rsmachine/ca");
    assert!(scope.optional_string("insecure-registry")?.is_none());
    Ok(())
}

#[test]
fn test_resolver_param_wins_over_config() -> Result<()> {
    let scope = ProviderConfig::new("dockermachine", "dockermachine", config(CONFIG));
    let call = params(&[("docker-install-url", "https://mirror.example/install.sh")]);
    let resolver = Resolver::new(&call, &scope);

    assert_eq!(
        resolver.optional("docker-install-url")?.as_deref(),
        Some("https://mirror.example/install.sh")
    );
    assert_eq!(resolver.required_as("driver", "driver:name")?, "virtualbox");
    assert_eq!(resolver.optional("insecure-registry")?, None);
    Ok(())
}

#[test]
fn test_resolver_type_mismatch_is_not_absence() {
    let scope = ProviderConfig::new("dockermachine", "dockermachine", config(CONFIG));
    let call = params(&[]);
    let resolver = Resolver::new(&call, &scope);

    let err = resolver.optional_as("options", "driver:options").unwrap_err();
    assert!(matches!(err, ProvisionError::InvalidConfig { .. }), "unexpected error: {}", err);
}

#[test]
fn test_resolver_missing_mandatory_value() {
    let source: Arc<dyn ConfigSource> = config("{}");
    let scope = ProviderConfig::new("dockermachine", "dockermachine", source);
    let call = params(&[]);

    let err = Resolver::new(&call, &scope)
        .required_as("driver", "driver:name")
        .unwrap_err();
    assert_eq!(err.to_string(), "driver is mandatory");
}

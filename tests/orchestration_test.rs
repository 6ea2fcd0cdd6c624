mod helpers;

use std::sync::Arc;

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use rsmachine::aggregate::AggregatedError;
use rsmachine::cli::{CreateArgs, DeleteArgs, DescribeArgs, LogLevel, ProviderArgs};
use rsmachine::dockermachine::{DockerMachineProvider, PROVIDER_NAME};
use rsmachine::iaas::{Machine, Provider, Registry};
use rsmachine::{load_machine, run_create, run_delete, run_describe, run_providers};

use helpers::{DeleteOutcome, DriverCalls, MockDriverFactory};

const CONFIG: &str = "
iaas:
  default: dockermachine
  dockermachine:
    driver:
      name: virtualbox
";

fn registry(factory: MockDriverFactory) -> (Registry, Arc<DriverCalls>) {
    let (factory, calls) = factory.build();
    let registry = Registry::new();
    registry
        .register(PROVIDER_NAME, move |config| -> Box<dyn Provider> {
            Box::new(DockerMachineProvider::with_driver_factory(config, factory.clone()))
        })
        .unwrap();
    (registry, calls)
}

fn write_config(dir: &Utf8Path) -> Result<Utf8PathBuf> {
    let path = dir.join("rsmachine.yaml");
    std::fs::write(&path, CONFIG)?;
    Ok(path)
}

fn provider_args(config: Utf8PathBuf) -> ProviderArgs {
    ProviderArgs {
        config,
        provider: None,
    }
}

fn write_machine(dir: &Utf8Path, name: &str) -> Result<Utf8PathBuf> {
    let path = dir.join(format!("{}.yaml", name));
    let machine = Machine {
        id: name.to_string(),
        name: name.to_string(),
        ..Default::default()
    };
    std::fs::write(&path, serde_yaml::to_string(&machine)?)?;
    Ok(path)
}

#[test]
fn run_create_prints_machine_record() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let dir = Utf8Path::from_path(dir.path()).unwrap();
    let (registry, calls) = registry(MockDriverFactory::new());
    let opts = CreateArgs {
        provider: provider_args(write_config(dir)?),
        params: vec![("pool".to_string(), "web".to_string())],
        output: None,
        log_level: LogLevel::Error,
    };

    let mut out = Vec::new();
    let machine = run_create(&opts, &registry, &mut out)?;

    let printed: Machine = serde_yaml::from_slice(&out)?;
    assert_eq!(printed, machine);
    assert_eq!(machine.driver, "virtualbox");
    assert_eq!(machine.creation_params["driver"], "virtualbox");
    assert_eq!(calls.constructed(), 1);
    Ok(())
}

#[test]
fn run_create_writes_output_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let dir = Utf8Path::from_path(dir.path()).unwrap();
    let (registry, _calls) = registry(MockDriverFactory::new());
    let output = dir.join("machine.yaml");
    let opts = CreateArgs {
        provider: provider_args(write_config(dir)?),
        params: vec![("name".to_string(), "db-01".to_string())],
        output: Some(output.clone()),
        log_level: LogLevel::Error,
    };

    let mut out = Vec::new();
    run_create(&opts, &registry, &mut out)?;

    assert!(out.is_empty());
    let machine = load_machine(&output)?;
    assert_eq!(machine.name, "db-01");
    assert_eq!(machine.provider, "dockermachine");
    Ok(())
}

#[test]
fn run_create_unknown_provider() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let dir = Utf8Path::from_path(dir.path()).unwrap();
    let (registry, calls) = registry(MockDriverFactory::new());
    let opts = CreateArgs {
        provider: ProviderArgs {
            config: write_config(dir)?,
            provider: Some("openstack".to_string()),
        },
        params: Vec::new(),
        output: None,
        log_level: LogLevel::Error,
    };

    let err = run_create(&opts, &registry, &mut Vec::<u8>::new()).unwrap_err();

    assert!(format!("{:#}", err).contains("provider not found: openstack"));
    assert_eq!(calls.constructed(), 0);
    Ok(())
}

#[test]
fn run_delete_deletes_every_machine() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let dir = Utf8Path::from_path(dir.path()).unwrap();
    let (registry, calls) = registry(MockDriverFactory::new());
    let opts = DeleteArgs {
        provider: provider_args(write_config(dir)?),
        machines: vec![write_machine(dir, "web-1")?, write_machine(dir, "web-2")?],
        log_level: LogLevel::Error,
    };

    run_delete(&opts, &registry)?;

    let deleted: Vec<String> = calls.deletes.lock().unwrap().iter().map(|m| m.name.clone()).collect();
    assert_eq!(deleted, ["web-1", "web-2"]);
    Ok(())
}

#[test]
fn run_delete_aggregates_failures() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let dir = Utf8Path::from_path(dir.path()).unwrap();
    let (registry, calls) = registry(MockDriverFactory::new().delete(DeleteOutcome::NotFound));
    let opts = DeleteArgs {
        provider: provider_args(write_config(dir)?),
        machines: vec![
            write_machine(dir, "web-1")?,
            dir.join("missing.yaml"),
            write_machine(dir, "web-2")?,
        ],
        log_level: LogLevel::Error,
    };

    let err = run_delete(&opts, &registry).unwrap_err();

    let aggregated = err.downcast_ref::<AggregatedError>().unwrap();
    assert_eq!(aggregated.causes().len(), 3);
    let causes: Vec<String> = aggregated.causes().iter().map(|c| format!("{:#}", c)).collect();
    assert!(causes[0].starts_with("failed to delete machine web-1: machine not found"));
    assert!(causes[1].contains("missing.yaml"));
    assert!(causes[2].starts_with("failed to delete machine web-2: machine not found"));
    assert_eq!(calls.delete_count(), 2);
    Ok(())
}

#[test]
fn run_delete_single_failure_is_not_wrapped() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let dir = Utf8Path::from_path(dir.path()).unwrap();
    let (registry, _calls) = registry(MockDriverFactory::new().delete(DeleteOutcome::NotFound));
    let opts = DeleteArgs {
        provider: provider_args(write_config(dir)?),
        machines: vec![write_machine(dir, "web-1")?],
        log_level: LogLevel::Error,
    };

    let err = run_delete(&opts, &registry).unwrap_err();

    assert!(err.downcast_ref::<AggregatedError>().is_none());
    assert_eq!(format!("{:#}", err), "failed to delete machine web-1: machine not found: web-1");
    Ok(())
}

#[test]
fn run_describe_and_providers() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let dir = Utf8Path::from_path(dir.path()).unwrap();
    let (registry, _calls) = registry(MockDriverFactory::new());

    let mut out = Vec::new();
    run_describe(
        &DescribeArgs {
            provider: provider_args(write_config(dir)?),
            log_level: LogLevel::Error,
        },
        &registry,
        &mut out,
    )?;
    let text = String::from_utf8(out)?;
    assert!(text.contains("driver=<driver>"));
    assert!(text.contains("insecure-registry=<insecure-registry>"));

    let mut out = Vec::new();
    run_providers(&registry, &mut out)?;
    assert_eq!(String::from_utf8(out)?, "dockermachine\n");
    Ok(())
}

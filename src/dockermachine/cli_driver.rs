//! docker-machine command-line driver.
//!
//! Drives the `docker-machine` binary through a [`CommandExecutor`]:
//!
//! - existence: `docker-machine inspect <name>`
//! - create: `docker-machine [global flags] create --driver <d> [engine flags] --<opt>=<value>... <name>`
//! - address: `docker-machine ip <name>`
//! - metadata: `docker-machine inspect --format '{{json .Driver}}' <name>`
//! - delete: `docker-machine rm -f -y <name>`
//!
//! All output goes to the client's [`OutputBuffer`].

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use super::api::{CreateFailure, CreateMachineOpts, DriverClientConfig, DriverFactory, MachineDriver};
use super::args::CommandArgsBuilder;
use crate::error::ProvisionError;
use crate::executor::{CommandExecutor, CommandSpec, ExecutionResult};
use crate::iaas::Machine;

/// Name of the docker-machine binary looked up in `PATH`.
pub const DOCKER_MACHINE: &str = "docker-machine";

/// Driver metadata fields never copied into a machine record.
const SENSITIVE_FIELDS: &[&str] = &["secret", "token", "password", "accesskey"];

/// Message docker-machine prints for unknown hosts.
const HOST_NOT_FOUND: &str = "does not exist";

/// Message docker-machine prints when a create names a known host.
const HOST_EXISTS: &str = "already exists";

/// A docker-machine client serving one provisioning call.
pub struct DockerMachineCli {
    executor: Arc<dyn CommandExecutor>,
    config: DriverClientConfig,
    closed: bool,
}

impl DockerMachineCli {
    pub fn new(executor: Arc<dyn CommandExecutor>, config: DriverClientConfig) -> Self {
        Self {
            executor,
            config,
            closed: false,
        }
    }

    /// Returns a factory opening clients that share `executor`.
    pub fn factory(executor: Arc<dyn CommandExecutor>) -> DriverFactory {
        Arc::new(move |config| {
            let client: Box<dyn MachineDriver> =
                Box::new(DockerMachineCli::new(Arc::clone(&executor), config));
            Ok(client)
        })
    }

    /// Starts an argument list with the global flags.
    fn base_args(&self) -> CommandArgsBuilder {
        let mut builder = CommandArgsBuilder::new();
        if let Some(storage) = &self.config.storage_path {
            builder.push_flag_path("-s", storage);
        }
        if let Some(ca_path) = &self.config.ca_path {
            builder.push_flag_path("--tls-ca-cert", &ca_path.join("ca.pem"));
            builder.push_flag_path("--tls-ca-key", &ca_path.join("ca-key.pem"));
        }
        builder
    }

    fn create_args(&self, opts: &CreateMachineOpts) -> Vec<String> {
        let mut builder = self.base_args();
        builder.push_arg("create");
        builder.push_flag_value("--driver", &opts.driver_name);
        builder.push_opt_flag_value(
            "--engine-install-url",
            opts.docker_engine_install_url.as_deref(),
        );
        builder.push_opt_flag_value("--engine-insecure-registry", opts.insecure_registry.as_deref());
        builder.push_driver_options(&opts.options);
        builder.push_arg(opts.name.as_str());
        builder.into_args()
    }

    fn subcommand_args(&self, subcommand: &[&str], name: &str) -> Vec<String> {
        let mut builder = self.base_args();
        for arg in subcommand {
            builder.push_arg(*arg);
        }
        builder.push_arg(name);
        builder.into_args()
    }

    fn run(&self, args: Vec<String>) -> Result<(CommandSpec, ExecutionResult)> {
        if self.closed {
            bail!("docker-machine client is already closed");
        }
        let spec = CommandSpec::new(DOCKER_MACHINE, args)
            .with_timeout(self.config.timeout)
            .with_output(self.config.output.clone());
        debug!("running {}", spec.display());
        let result = self.executor.execute(&spec)?;
        Ok((spec, result))
    }

    /// Runs a command and returns its stdout, failing on a non-zero exit.
    fn run_checked(&self, args: Vec<String>) -> Result<String> {
        let (spec, result) = self.run(args)?;
        if !result.success() {
            return Err(command_failure(&spec, &result).into());
        }
        Ok(result.stdout)
    }

    /// Whether the store holds a host named `name`.
    fn machine_exists(&self, name: &str) -> Result<bool> {
        let (_, result) = self
            .run(self.subcommand_args(&["inspect"], name))
            .with_context(|| format!("failed to check whether machine {} exists", name))?;
        Ok(result.success())
    }

    fn describe_machine(&self, opts: &CreateMachineOpts) -> Result<Machine> {
        let address = self
            .run_checked(self.subcommand_args(&["ip"], &opts.name))
            .context("failed to read machine address")?;
        let driver_json = self
            .run_checked(self.subcommand_args(&["inspect", "--format", "{{json .Driver}}"], &opts.name))
            .context("failed to inspect machine")?;

        let mut machine = bare_machine(opts);
        machine.address = address.trim().to_string();
        machine.custom_data = parse_driver_data(&driver_json)?;
        Ok(machine)
    }
}

/// A machine record holding only what the caller asked for.
fn bare_machine(opts: &CreateMachineOpts) -> Machine {
    Machine {
        id: opts.name.clone(),
        name: opts.name.clone(),
        driver: opts.driver_name.clone(),
        ..Default::default()
    }
}

fn command_failure(spec: &CommandSpec, result: &ExecutionResult) -> ProvisionError {
    let detail = result
        .stderr
        .lines()
        .chain(result.stdout.lines())
        .rfind(|line| !line.trim().is_empty())
        .map(str::trim);
    let status = match detail {
        Some(detail) => format!("{}: {}", result.status_display(), detail),
        None => result.status_display(),
    };
    ProvisionError::Execution {
        command: spec.display(),
        status,
    }
}

fn mentions(result: &ExecutionResult, message: &str) -> bool {
    result.stderr.contains(message) || result.stdout.contains(message)
}

fn is_sensitive(field: &str) -> bool {
    let field = field.to_ascii_lowercase();
    SENSITIVE_FIELDS.iter().any(|s| field.contains(s))
}

/// Flattens the scalar fields of `inspect`'s driver JSON into strings.
fn parse_driver_data(json: &str) -> Result<BTreeMap<String, String>> {
    let fields: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(json.trim()).context("failed to decode driver metadata")?;
    let data = fields
        .into_iter()
        .filter(|(key, _)| !is_sensitive(key))
        .filter_map(|(key, value)| match value {
            serde_json::Value::String(s) => Some((key, s)),
            serde_json::Value::Number(n) => Some((key, n.to_string())),
            serde_json::Value::Bool(b) => Some((key, b.to_string())),
            _ => None,
        })
        .collect();
    Ok(data)
}

impl MachineDriver for DockerMachineCli {
    fn create_machine(&mut self, opts: &CreateMachineOpts) -> Result<Machine, CreateFailure> {
        info!("creating machine {} with driver {}", opts.name, opts.driver_name);
        if self.machine_exists(&opts.name).map_err(CreateFailure::new)? {
            return Err(CreateFailure::new(ProvisionError::already_exists(
                "machine",
                opts.name.as_str(),
            )));
        }

        let error: anyhow::Error = match self.run(self.create_args(opts)) {
            Ok((_, result)) if result.success() => {
                return self
                    .describe_machine(opts)
                    .map_err(|error| CreateFailure::partial(error, bare_machine(opts)));
            }
            // another caller took the name after the existence check
            Ok((spec, result)) if mentions(&result, HOST_EXISTS) => {
                return Err(CreateFailure::new(command_failure(&spec, &result)));
            }
            Ok((spec, result)) => command_failure(&spec, &result).into(),
            Err(error) => error,
        };

        // The host was absent before this create ran.
        match self.machine_exists(&opts.name) {
            Ok(true) => {
                warn!("machine {} was left behind by the failed create", opts.name);
                Err(CreateFailure::partial(error, bare_machine(opts)))
            }
            Ok(false) => Err(CreateFailure::new(error)),
            Err(e) => {
                warn!("{:#}", e);
                Err(CreateFailure::new(error))
            }
        }
    }

    fn delete_machine(&mut self, machine: &Machine) -> Result<()> {
        let name = if machine.name.is_empty() {
            machine.id.as_str()
        } else {
            machine.name.as_str()
        };
        info!("removing machine {}", name);
        let (spec, result) = self.run(self.subcommand_args(&["rm", "-f", "-y"], name))?;
        if result.success() {
            return Ok(());
        }
        if mentions(&result, HOST_NOT_FOUND) {
            return Err(ProvisionError::not_found("machine", name).into());
        }
        Err(command_failure(&spec, &result).into())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

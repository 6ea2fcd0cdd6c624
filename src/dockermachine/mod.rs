//! docker-machine provider.
//!
//! Creates machines through a [`MachineDriver`] client (by default the
//! `docker-machine` binary). One provisioning call goes through these steps:
//!
//! 1. resolve the driver, engine settings and machine name
//! 2. merge the driver options ([`options`])
//! 3. write the user-data file when the driver takes one
//! 4. open a client, create the machine, and close the client again
//!
//! When the create fails after the backend already allocated something, the
//! leftover machine is deleted once before the error is returned.

mod api;
mod args;
mod cli_driver;
pub mod options;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use camino::Utf8PathBuf;
use regex::Regex;
use tracing::{debug, info, warn};

pub use api::{CreateFailure, CreateMachineOpts, DriverClientConfig, DriverFactory, MachineDriver};
pub use cli_driver::{DOCKER_MACHINE, DockerMachineCli};
pub use options::{DriverKind, DriverOptions, OptionValue};

use crate::aggregate::AggregatedError;
use crate::config::{ProviderConfig, Resolver};
use crate::error::ProvisionError;
use crate::executor::{OutputBuffer, RealCommandExecutor};
use crate::iaas::{ConfigUserData, Machine, Params, PendingUserData, Provider, Registry, UserDataSource};

/// Name the provider is registered under.
pub const PROVIDER_NAME: &str = "dockermachine";

const DRIVER_PARAM: &str = "driver";
const NAME_PARAM: &str = "name";
const POOL_PARAM: &str = "pool";
const INSTALL_URL_PARAM: &str = "docker-install-url";
const INSECURE_REGISTRY_PARAM: &str = "insecure-registry";

/// Parameters consumed by the workflow itself and never passed on as
/// driver options.
const RESERVED_PARAMS: &[&str] = &[
    DRIVER_PARAM,
    NAME_PARAM,
    POOL_PARAM,
    INSTALL_URL_PARAM,
    INSECURE_REGISTRY_PARAM,
];

const MACHINE_NAME_PATTERN: &str = r"^[a-zA-Z0-9][a-zA-Z0-9.-]*$";

const DESCRIPTION: &str = "\
DockerMachine provider required params:
  driver=<driver>                         Driver to be used by docker-machine. Can be set on the provider configuration (driver:name).

Optional params:
  name=<name>                             Hostname for the created machine. Defaults to <pool>-<random id>.
  pool=<pool>                             Pool the machine belongs to, used as the generated name prefix.
  docker-install-url=<docker-install-url> Remote script to be used for docker installation. Defaults to: https://get.docker.com. Can be set on the provider configuration.
  insecure-registry=<insecure-registry>   Registry to be added as insecure-registry to the docker engine. Can be set on the provider configuration.
  <driver option>=<value>                 Any other param is passed to the driver as --<driver option> <value>.

Provider configuration:
  driver:name                             Default driver.
  driver:options                          Mapping of driver options applied before the params.
  driver:user-data-file-param             Driver option that receives the path of the user-data file.
  driver:timeout                          Timeout in seconds for each docker-machine command.
  ca-path                                 Directory holding ca.pem and ca-key.pem.
  storage-path                            docker-machine storage directory.
  user-data                               Local path or file:// URL of the user-data script.
";

/// Registers the provider in `registry`.
pub fn register(registry: &Registry) -> Result<(), ProvisionError> {
    registry.register(PROVIDER_NAME, |config| -> Box<dyn Provider> {
        Box::new(DockerMachineProvider::new(config))
    })
}

/// Returns 16 random bytes, hex encoded.
pub fn generate_random_id() -> Result<String> {
    let mut id = [0u8; 16];
    getrandom::fill(&mut id).map_err(|e| anyhow!("failed to generate random id: {}", e))?;
    Ok(hex::encode(id))
}

/// Returns a fresh machine name, prefixed with `pool` when there is one.
pub fn generate_machine_name(pool: Option<&str>) -> Result<String> {
    let id = generate_random_id()?;
    Ok(match pool {
        Some(pool) if !pool.is_empty() => format!("{}-{}", pool, id),
        _ => id,
    })
}

fn validate_machine_name(name: &str) -> Result<(), ProvisionError> {
    let pattern = Regex::new(MACHINE_NAME_PATTERN).map_err(|e| ProvisionError::InvalidParam {
        key: NAME_PARAM.to_string(),
        message: e.to_string(),
    })?;
    if pattern.is_match(name) {
        Ok(())
    } else {
        Err(ProvisionError::InvalidParam {
            key: NAME_PARAM.to_string(),
            message: format!("{:?} is not a valid host name", name),
        })
    }
}

/// An open driver client, closed when dropped.
///
/// Whatever the client wrote to its output buffer is logged at debug level
/// after closing.
struct DriverSession {
    client: Box<dyn MachineDriver>,
    output: OutputBuffer,
}

impl DriverSession {
    fn open(factory: &DriverFactory, config: DriverClientConfig) -> Result<Self> {
        let output = config.output.clone();
        let client = factory(config).context("failed to open docker-machine client")?;
        Ok(Self { client, output })
    }

    fn client(&mut self) -> &mut dyn MachineDriver {
        self.client.as_mut()
    }
}

impl Drop for DriverSession {
    fn drop(&mut self) {
        if let Err(e) = self.client.close() {
            warn!("failed to close docker-machine client: {:#}", e);
        }
        if !self.output.is_empty() {
            debug!("docker-machine output:\n{}", self.output.contents());
        }
    }
}

/// Provider creating machines with docker-machine drivers.
pub struct DockerMachineProvider {
    config: ProviderConfig,
    driver_factory: DriverFactory,
    user_data: Arc<dyn UserDataSource>,
}

impl DockerMachineProvider {
    /// Creates a provider driving the `docker-machine` binary.
    pub fn new(config: ProviderConfig) -> Self {
        Self::with_driver_factory(config, DockerMachineCli::factory(Arc::new(RealCommandExecutor)))
    }

    /// Creates a provider opening its clients through `driver_factory`.
    pub fn with_driver_factory(config: ProviderConfig, driver_factory: DriverFactory) -> Self {
        let user_data = Arc::new(ConfigUserData::new(config.clone()));
        Self {
            config,
            driver_factory,
            user_data,
        }
    }

    /// Replaces the source of the user-data payload.
    pub fn with_user_data_source(mut self, source: Arc<dyn UserDataSource>) -> Self {
        self.user_data = source;
        self
    }

    fn client_config(&self) -> Result<DriverClientConfig, ProvisionError> {
        let ca_path = self.config.optional_string("ca-path")?.map(Utf8PathBuf::from);
        let storage_path = self
            .config
            .optional_string("storage-path")?
            .map(Utf8PathBuf::from);
        let timeout = match self.config.optional_config("driver:timeout")? {
            Some(node) => match node.u64_value("driver:timeout")? {
                0 => {
                    return Err(ProvisionError::InvalidConfig {
                        key: "driver:timeout".to_string(),
                        message: "must be greater than zero".to_string(),
                    });
                }
                seconds => Some(Duration::from_secs(seconds)),
            },
            None => None,
        };
        Ok(DriverClientConfig {
            ca_path,
            storage_path,
            timeout,
            output: OutputBuffer::new(),
        })
    }
}

impl std::fmt::Debug for DockerMachineProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockerMachineProvider")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Provider for DockerMachineProvider {
    fn name(&self) -> &str {
        self.config.instance_name()
    }

    fn create_machine(&self, mut params: Params) -> Result<Machine> {
        let driver_from_params = params.contains_key(DRIVER_PARAM);
        let driver_name = Resolver::new(&params, &self.config).required_as(DRIVER_PARAM, "driver:name")?;
        if !driver_from_params {
            params.insert(DRIVER_PARAM.to_string(), driver_name.clone());
        }

        let resolver = Resolver::new(&params, &self.config);
        let docker_engine_install_url = resolver.optional(INSTALL_URL_PARAM)?;
        let insecure_registry = resolver.optional(INSECURE_REGISTRY_PARAM)?;
        let client_config = self.client_config()?;

        let machine_name = match params.remove(NAME_PARAM) {
            Some(name) => {
                validate_machine_name(&name)?;
                name
            }
            None => generate_machine_name(params.get(POOL_PARAM).map(String::as_str))?,
        };

        let custom_options = self.config.optional_config(options::OPTIONS_KEY)?;
        let mut driver_options = options::build_driver_options(
            options::default_options_for_driver(&driver_name),
            custom_options.as_ref(),
            params
                .iter()
                .filter(|(key, _)| !RESERVED_PARAMS.contains(&key.as_str())),
        )?;

        let user_data_param = self.config.optional_string("driver:user-data-file-param")?;
        let user_data = match &user_data_param {
            Some(param) => {
                let pending = PendingUserData::create(self.user_data.as_ref())?;
                let path = pending.path().to_str().ok_or_else(|| {
                    anyhow!("userdata file path is not valid UTF-8: {}", pending.path().display())
                })?;
                driver_options.insert(param.clone(), path);
                params.remove(param);
                Some(pending)
            }
            None => None,
        };

        let opts = CreateMachineOpts {
            name: machine_name,
            driver_name,
            options: driver_options,
            insecure_registry,
            docker_engine_install_url,
        };

        let mut session = DriverSession::open(&self.driver_factory, client_config)?;
        info!("creating machine {} (driver {})", opts.name, opts.driver_name);
        let result = match session.client().create_machine(&opts) {
            Ok(mut machine) => {
                if machine.name.is_empty() {
                    machine.name = opts.name.clone();
                }
                if machine.id.is_empty() {
                    machine.id = machine.name.clone();
                }
                if machine.driver.is_empty() {
                    machine.driver = opts.driver_name.clone();
                }
                machine.provider = self.config.instance_name().to_string();
                machine.creation_params = params;
                info!("created machine {} at {}", machine.name, machine.address);
                Ok(machine)
            }
            Err(CreateFailure {
                error,
                machine: None,
            }) => Err(error),
            Err(CreateFailure {
                error,
                machine: Some(partial),
            }) => {
                warn!("failed to create machine {}, removing it: {:#}", opts.name, error);
                match session.client().delete_machine(&partial) {
                    Ok(()) => Err(error),
                    Err(cleanup) => Err(AggregatedError::combine(
                        error,
                        [cleanup.context("failed to remove machine after error")],
                    )),
                }
            }
        };
        drop(session);
        drop(user_data);
        result
    }

    fn delete_machine(&self, machine: &Machine) -> Result<()> {
        let mut session = DriverSession::open(&self.driver_factory, self.client_config()?)?;
        info!("deleting machine {}", machine.name);
        session.client().delete_machine(machine)
    }

    fn describe(&self) -> &str {
        DESCRIPTION
    }
}

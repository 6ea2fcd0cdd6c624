//! Machine driver capability used by the docker-machine provider.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use camino::Utf8PathBuf;

use super::options::DriverOptions;
use crate::executor::OutputBuffer;
use crate::iaas::Machine;

/// Settings for one driver client.
#[derive(Debug, Clone, Default)]
pub struct DriverClientConfig {
    /// Directory holding `ca.pem` and `ca-key.pem` used to sign engine certificates.
    pub ca_path: Option<Utf8PathBuf>,
    /// docker-machine storage directory; the tool's default when unset.
    pub storage_path: Option<Utf8PathBuf>,
    /// Upper bound for each backend operation.
    pub timeout: Option<Duration>,
    /// Sink for diagnostic output produced while the client is open.
    pub output: OutputBuffer,
}

/// Everything a driver needs to create one machine.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateMachineOpts {
    pub name: String,
    pub driver_name: String,
    pub options: DriverOptions,
    pub insecure_registry: Option<String>,
    pub docker_engine_install_url: Option<String>,
}

/// A failed create.
///
/// `machine` is set when the backend got far enough to leave a resource
/// behind that has to be deleted.
pub struct CreateFailure {
    pub error: anyhow::Error,
    pub machine: Option<Machine>,
}

impl CreateFailure {
    /// A failure that left nothing behind.
    pub fn new(error: impl Into<anyhow::Error>) -> Self {
        Self {
            error: error.into(),
            machine: None,
        }
    }

    /// A failure that left `machine` behind.
    pub fn partial(error: impl Into<anyhow::Error>, machine: Machine) -> Self {
        Self {
            error: error.into(),
            machine: Some(machine),
        }
    }
}

impl fmt::Debug for CreateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateFailure")
            .field("error", &format_args!("{:#}", self.error))
            .field("machine", &self.machine.as_ref().map(|m| &m.name))
            .finish()
    }
}

/// A client of a machine driver backend.
///
/// A client serves a single call and is not shared between threads.
pub trait MachineDriver {
    /// Creates a machine.
    fn create_machine(&mut self, opts: &CreateMachineOpts) -> Result<Machine, CreateFailure>;

    /// Deletes a machine.
    fn delete_machine(&mut self, machine: &Machine) -> Result<()>;

    /// Releases the backend session.
    fn close(&mut self) -> Result<()>;
}

/// Opens driver clients.
pub type DriverFactory =
    Arc<dyn Fn(DriverClientConfig) -> Result<Box<dyn MachineDriver>> + Send + Sync>;

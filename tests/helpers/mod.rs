use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use rsmachine::ProvisionError;
use rsmachine::config::{Config, ConfigSource, ProviderConfig};
use rsmachine::dockermachine::{
    CreateFailure, CreateMachineOpts, DockerMachineProvider, DriverClientConfig, DriverFactory,
    MachineDriver, PROVIDER_NAME,
};
use rsmachine::executor::{CommandExecutor, CommandSpec, ExecutionResult};
use rsmachine::iaas::{Machine, Params};

/// Parses a YAML configuration document.
#[allow(dead_code)]
pub fn config(yaml: &str) -> Arc<dyn ConfigSource> {
    Arc::new(Config::from_yaml_str(yaml).expect("test configuration should parse"))
}

/// Configuration scope of the docker-machine provider over `yaml`.
#[allow(dead_code)]
pub fn provider_config(yaml: &str) -> ProviderConfig {
    ProviderConfig::new(PROVIDER_NAME, PROVIDER_NAME, config(yaml))
}

/// Builds call parameters from string pairs.
#[allow(dead_code)]
pub fn params(pairs: &[(&str, &str)]) -> Params {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// How the mock driver answers a create call.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub enum CreateOutcome {
    Succeed,
    Fail(String),
    /// Fails after a machine was allocated.
    FailPartial(String),
}

/// How the mock driver answers a delete call.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub enum DeleteOutcome {
    Succeed,
    Fail(String),
    NotFound,
}

/// Everything the mock driver observed, shared by all clients of one factory.
#[derive(Debug, Default)]
pub struct DriverCalls {
    pub constructed: AtomicUsize,
    pub closed: AtomicUsize,
    pub creates: Mutex<Vec<CreateMachineOpts>>,
    pub deletes: Mutex<Vec<Machine>>,
    pub client_configs: Mutex<Vec<DriverClientConfig>>,
    /// Content of the user-data file while create ran, per call.
    pub user_data_seen: Mutex<Vec<Option<String>>>,
}

#[allow(dead_code)]
impl DriverCalls {
    pub fn constructed(&self) -> usize {
        self.constructed.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn create_count(&self) -> usize {
        self.creates.lock().unwrap().len()
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.lock().unwrap().len()
    }

    pub fn last_create(&self) -> CreateMachineOpts {
        self.creates
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("create should have been called")
    }
}

struct MockDriver {
    calls: Arc<DriverCalls>,
    create: CreateOutcome,
    delete: DeleteOutcome,
    user_data_param: Option<String>,
}

impl MockDriver {
    fn allocated(opts: &CreateMachineOpts) -> Machine {
        Machine {
            id: format!("id-{}", opts.name),
            name: opts.name.clone(),
            driver: opts.driver_name.clone(),
            address: "192.168.99.100".to_string(),
            ..Default::default()
        }
    }
}

impl MachineDriver for MockDriver {
    fn create_machine(&mut self, opts: &CreateMachineOpts) -> Result<Machine, CreateFailure> {
        self.calls.creates.lock().unwrap().push(opts.clone());
        if let Some(param) = &self.user_data_param {
            let content = opts
                .options
                .get(param)
                .and_then(|path| std::fs::read_to_string(path.to_string()).ok());
            self.calls.user_data_seen.lock().unwrap().push(content);
        }
        match &self.create {
            CreateOutcome::Succeed => Ok(Self::allocated(opts)),
            CreateOutcome::Fail(message) => Err(CreateFailure::new(anyhow::anyhow!(message.clone()))),
            CreateOutcome::FailPartial(message) => Err(CreateFailure::partial(
                anyhow::anyhow!(message.clone()),
                Self::allocated(opts),
            )),
        }
    }

    fn delete_machine(&mut self, machine: &Machine) -> Result<()> {
        self.calls.deletes.lock().unwrap().push(machine.clone());
        match &self.delete {
            DeleteOutcome::Succeed => Ok(()),
            DeleteOutcome::Fail(message) => Err(anyhow::anyhow!(message.clone())),
            DeleteOutcome::NotFound => Err(ProvisionError::NotFound {
                kind: "machine",
                name: machine.name.clone(),
            }
            .into()),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.calls.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Builder for a factory of recording mock drivers.
#[derive(Debug, Clone)]
pub struct MockDriverFactory {
    create: CreateOutcome,
    delete: DeleteOutcome,
    user_data_param: Option<String>,
}

#[allow(dead_code)]
impl MockDriverFactory {
    pub fn new() -> Self {
        Self {
            create: CreateOutcome::Succeed,
            delete: DeleteOutcome::Succeed,
            user_data_param: None,
        }
    }

    pub fn create(mut self, outcome: CreateOutcome) -> Self {
        self.create = outcome;
        self
    }

    pub fn delete(mut self, outcome: DeleteOutcome) -> Self {
        self.delete = outcome;
        self
    }

    /// Records the content of the file named by this driver option during create.
    pub fn watch_user_data(mut self, param: &str) -> Self {
        self.user_data_param = Some(param.to_string());
        self
    }

    pub fn build(self) -> (DriverFactory, Arc<DriverCalls>) {
        let calls = Arc::new(DriverCalls::default());
        let shared = Arc::clone(&calls);
        let factory: DriverFactory = Arc::new(move |config| {
            shared.constructed.fetch_add(1, Ordering::SeqCst);
            shared.client_configs.lock().unwrap().push(config);
            let driver: Box<dyn MachineDriver> = Box::new(MockDriver {
                calls: Arc::clone(&shared),
                create: self.create.clone(),
                delete: self.delete.clone(),
                user_data_param: self.user_data_param.clone(),
            });
            Ok(driver)
        });
        (factory, calls)
    }
}

/// A docker-machine provider over `yaml` backed by mock drivers.
#[allow(dead_code)]
pub fn mock_provider(yaml: &str, factory: MockDriverFactory) -> (DockerMachineProvider, Arc<DriverCalls>) {
    let (factory, calls) = factory.build();
    (
        DockerMachineProvider::with_driver_factory(provider_config(yaml), factory),
        calls,
    )
}

/// Builds an execution result with the given exit code.
#[allow(dead_code)]
pub fn exit(code: i32, stdout: &str, stderr: &str) -> ExecutionResult {
    ExecutionResult {
        status: Some(ExitStatus::from_raw(code << 8)),
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
    }
}

type Responder = Box<dyn Fn(&CommandSpec) -> Result<ExecutionResult> + Send + Sync>;

/// Executor answering through a closure and recording every command.
pub struct ScriptedExecutor {
    responder: Responder,
    pub calls: Mutex<Vec<CommandSpec>>,
}

#[allow(dead_code)]
impl ScriptedExecutor {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&CommandSpec) -> Result<ExecutionResult> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Recorded argument lists, in call order.
    pub fn args(&self) -> Vec<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|spec| spec.args.clone())
            .collect()
    }
}

impl CommandExecutor for ScriptedExecutor {
    fn execute(&self, spec: &CommandSpec) -> Result<ExecutionResult> {
        self.calls.lock().unwrap().push(spec.clone());
        (self.responder)(spec)
    }
}

/// Whether the command asks `inspect` for driver metadata rather than existence.
#[allow(dead_code)]
pub fn is_metadata_query(spec: &CommandSpec) -> bool {
    spec.args.iter().any(|arg| arg == "--format")
}

/// Returns the docker-machine subcommand of an argument list.
#[allow(dead_code)]
pub fn subcommand(spec: &CommandSpec) -> &str {
    const SUBCOMMANDS: &[&str] = &["create", "ip", "inspect", "rm"];
    spec.args
        .iter()
        .map(String::as_str)
        .find(|arg| SUBCOMMANDS.contains(arg))
        .unwrap_or("")
}

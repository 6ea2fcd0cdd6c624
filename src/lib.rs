pub mod aggregate;
pub mod cli;
pub mod config;
pub mod dockermachine;
pub mod error;
pub mod executor;
pub mod iaas;

pub use error::ProvisionError;

use std::fs;
use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use camino::Utf8Path;
use clap::CommandFactory;
use tracing::info;
use tracing_subscriber::{FmtSubscriber, filter::LevelFilter};

use crate::aggregate::ErrorAggregator;
use crate::config::ConfigSource;
use crate::iaas::{Machine, Params, Provider, Registry};

pub fn init_logging(log_level: cli::LogLevel) -> Result<()> {
    let filter = match log_level {
        cli::LogLevel::Trace => LevelFilter::TRACE,
        cli::LogLevel::Debug => LevelFilter::DEBUG,
        cli::LogLevel::Info => LevelFilter::INFO,
        cli::LogLevel::Warn => LevelFilter::WARN,
        cli::LogLevel::Error => LevelFilter::ERROR,
    };

    tracing::subscriber::set_global_default(
        FmtSubscriber::builder()
            .with_max_level(filter)
            .with_writer(std::io::stderr)
            .finish(),
    )
    .context("failed to set global default tracing subscriber")
}

/// Loads the configuration and resolves the selected provider.
fn load_provider(args: &cli::ProviderArgs, registry: &Registry) -> Result<Box<dyn Provider>> {
    let config = config::load_config(&args.config)
        .with_context(|| format!("failed to load configuration from {}", args.config))?;
    let source: Arc<dyn ConfigSource> = Arc::new(config);

    let name = match &args.provider {
        Some(name) => name.clone(),
        None => registry
            .default_provider_name(source.as_ref())
            .context("no provider selected")?,
    };
    registry
        .get(&name, source)
        .with_context(|| format!("failed to resolve provider {}", name))
}

/// Reads a machine record written by [`run_create`].
pub fn load_machine(path: &Utf8Path) -> Result<Machine> {
    let content = fs::read_to_string(path)
        .map_err(|e| ProvisionError::io(format!("failed to read machine record {}", path), e))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse machine record {}", path))
}

pub fn run_create(opts: &cli::CreateArgs, registry: &Registry, out: &mut dyn Write) -> Result<Machine> {
    let provider = load_provider(&opts.provider, registry)?;
    let params: Params = opts.params.iter().cloned().collect();

    let machine = provider
        .create_machine(params)
        .with_context(|| format!("failed to create machine with provider {}", provider.name()))?;

    let record = serde_yaml::to_string(&machine).context("failed to encode machine record")?;
    match &opts.output {
        Some(path) => {
            fs::write(path, &record)
                .map_err(|e| ProvisionError::io(format!("failed to write machine record {}", path), e))?;
            info!("machine record written to {}", path);
        }
        None => out
            .write_all(record.as_bytes())
            .context("failed to write machine record")?,
    }
    Ok(machine)
}

/// Deletes every listed machine, reporting all failures together.
pub fn run_delete(opts: &cli::DeleteArgs, registry: &Registry) -> Result<()> {
    let provider = load_provider(&opts.provider, registry)?;

    let mut errors = ErrorAggregator::new();
    for path in &opts.machines {
        let deleted = load_machine(path).and_then(|machine| {
            provider
                .delete_machine(&machine)
                .with_context(|| format!("failed to delete machine {}", machine.name))
                .map(|()| machine)
        });
        if let Some(machine) = errors.record(deleted) {
            info!("deleted machine {}", machine.name);
        }
    }
    errors.into_result()
}

pub fn run_describe(opts: &cli::DescribeArgs, registry: &Registry, out: &mut dyn Write) -> Result<()> {
    let provider = load_provider(&opts.provider, registry)?;
    out.write_all(provider.describe().as_bytes())
        .context("failed to write provider description")
}

pub fn run_providers(registry: &Registry, out: &mut dyn Write) -> Result<()> {
    for name in registry.names() {
        writeln!(out, "{}", name).context("failed to write provider list")?;
    }
    Ok(())
}

pub fn run_completions(opts: &cli::CompletionsArgs, out: &mut dyn Write) -> Result<()> {
    let mut cmd = cli::Cli::command();
    clap_complete::generate(opts.shell, &mut cmd, env!("CARGO_PKG_NAME"), out);
    Ok(())
}

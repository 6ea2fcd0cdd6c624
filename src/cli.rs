use anyhow::{Result, bail};
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = env!("CARGO_PKG_DESCRIPTION"),
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a machine and print its record as YAML
    Create(CreateArgs),

    /// Delete machines described by YAML records
    Delete(DeleteArgs),

    /// Show the parameters a provider understands
    Describe(DescribeArgs),

    /// List the registered providers
    Providers(ProvidersArgs),

    /// Generate shell completion scripts
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct ProviderArgs {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "rsmachine.yaml")]
    pub config: Utf8PathBuf,

    /// Provider or provider instance to use; defaults to `iaas:default`
    #[arg(short = 'P', long)]
    pub provider: Option<String>,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[command(flatten)]
    pub provider: ProviderArgs,

    /// Creation parameter as key=value; may be repeated
    #[arg(short, long = "param", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub params: Vec<(String, String)>,

    /// Write the machine record to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<Utf8PathBuf>,

    /// Set the log level
    #[arg(short, long, default_value = "info")]
    pub log_level: LogLevel,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    #[command(flatten)]
    pub provider: ProviderArgs,

    /// Machine records written by `create`
    #[arg(required = true)]
    pub machines: Vec<Utf8PathBuf>,

    /// Set the log level
    #[arg(short, long, default_value = "info")]
    pub log_level: LogLevel,
}

#[derive(Args, Debug)]
pub struct DescribeArgs {
    #[command(flatten)]
    pub provider: ProviderArgs,

    /// Set the log level
    #[arg(short, long, default_value = "info")]
    pub log_level: LogLevel,
}

#[derive(Args, Debug)]
pub struct ProvidersArgs {
    /// Set the log level
    #[arg(short, long, default_value = "info")]
    pub log_level: LogLevel,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,

    /// Set the log level
    #[arg(short, long, default_value = "info")]
    pub log_level: LogLevel,
}

/// Represents log levels for controlling the verbosity of logging output.
///
/// This enum maps directly to the log levels used by the `tracing` crate.
/// For example, specifying `--log-level debug` also shows the output
/// docker-machine produced while a machine was created.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Commands {
    /// Returns the log level requested for this command.
    pub fn log_level(&self) -> LogLevel {
        match self {
            Commands::Create(opts) => opts.log_level,
            Commands::Delete(opts) => opts.log_level,
            Commands::Describe(opts) => opts.log_level,
            Commands::Providers(opts) => opts.log_level,
            Commands::Completions(opts) => opts.log_level,
        }
    }
}

/// Parses a `key=value` creation parameter.
///
/// Only the first `=` separates; the value may contain more of them.
pub fn parse_key_value(arg: &str) -> Result<(String, String)> {
    let Some((key, value)) = arg.split_once('=') else {
        bail!("expected KEY=VALUE, got {:?}", arg);
    };
    if key.is_empty() {
        bail!("parameter name must not be empty: {:?}", arg);
    }
    Ok((key.to_string(), value.to_string()))
}

pub fn parse_args() -> Result<Cli> {
    Ok(Cli::parse())
}

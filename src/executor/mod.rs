//! Command execution abstraction for rsmachine.
//!
//! This module provides:
//! - [`CommandSpec`]: Specification for commands to execute
//! - [`ExecutionResult`]: Result of command execution, with captured output
//! - [`OutputBuffer`]: Shared sink collecting diagnostic output across commands
//! - [`CommandExecutor`]: Trait for command execution strategies
//! - [`RealCommandExecutor`]: Production implementation using `std::process::Command`

mod pipe;
mod real;

use std::io;
use std::process::ExitStatus;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::Result;

pub use real::RealCommandExecutor;

/// Formats string arguments into a space-separated, debug-quoted string.
pub(crate) fn format_command_args(args: &[String]) -> String {
    args.iter()
        .map(|a| format!("{:?}", a))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Shared, append-only buffer of diagnostic output.
///
/// Clones share the same buffer, so a caller can hand one clone to a
/// driver client and read everything it wrote once the client is closed.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns everything written so far, lossily decoded as UTF-8.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.lock()).into_owned()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Appends one line, adding the trailing newline.
    pub fn append_line(&self, line: &str) {
        let mut buf = self.lock();
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
    }
}

impl io::Write for OutputBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.lock().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Specification for a command to be executed
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// The command to execute (e.g., "docker-machine")
    pub command: String,
    /// Command arguments
    pub args: Vec<String>,
    /// Kill the command if it runs longer than this
    pub timeout: Option<Duration>,
    /// Sink receiving every stdout and stderr line
    pub output: Option<OutputBuffer>,
}

impl CommandSpec {
    /// Creates a new CommandSpec with command and args
    #[must_use]
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            timeout: None,
            output: None,
        }
    }

    /// Sets the timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the output sink
    #[must_use]
    pub fn with_output(mut self, output: OutputBuffer) -> Self {
        self.output = Some(output);
        self
    }

    /// Renders the command line for messages.
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, format_command_args(&self.args))
        }
    }
}

/// Result of command execution
#[derive(Debug, Default)]
pub struct ExecutionResult {
    /// Exit status of the command
    pub status: Option<ExitStatus>,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl ExecutionResult {
    /// Returns true if the command exited successfully.
    pub fn success(&self) -> bool {
        self.status.is_some_and(|s| s.success())
    }

    /// Returns the exit code if available
    pub fn code(&self) -> Option<i32> {
        self.status.and_then(|s| s.code())
    }

    /// Describes the exit status for error messages.
    pub fn status_display(&self) -> String {
        self.status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown (no status available)".to_string())
    }
}

/// Trait for command execution.
///
/// Implementations must be `Send + Sync` so one executor can be shared by
/// concurrent provisioning calls through `Arc<dyn CommandExecutor>`.
pub trait CommandExecutor: Send + Sync {
    /// Executes a command with the given specification.
    ///
    /// A command that runs and exits unsuccessfully is not an error; check
    /// [`ExecutionResult::success`].
    fn execute(&self, spec: &CommandSpec) -> Result<ExecutionResult>;
}

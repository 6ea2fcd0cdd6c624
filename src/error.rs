//! Domain-specific error types for rsmachine.
//!
//! This module defines `ProvisionError`, a `thiserror`-based enum that
//! provides typed error variants for the provisioning failure modes. Public
//! API functions return `Result<T, ProvisionError>` for programmatic error
//! handling, while trait boundaries (providers, machine drivers) use
//! `anyhow::Result`.
//!
//! `ProvisionError` implements `Into<anyhow::Error>`, so the `?` operator
//! converts it automatically, and callers can recover the typed variant with
//! `downcast_ref::<ProvisionError>()`.

use std::io;

/// Formats an IO error kind into a human-readable message.
///
/// Provides consistent messages for common IO error kinds (e.g.,
/// "I/O error: not found") instead of the OS-level messages (e.g.,
/// "No such file or directory (os error 2)"). Unrecognized kinds fall back
/// to the OS-level message.
pub(crate) fn io_error_kind_message(err: &io::Error) -> String {
    match err.kind() {
        io::ErrorKind::NotFound => "I/O error: not found".to_string(),
        io::ErrorKind::PermissionDenied => "I/O error: permission denied".to_string(),
        io::ErrorKind::IsADirectory => "I/O error: is a directory".to_string(),
        _ => format!("I/O error: {}", err),
    }
}

/// Domain-specific error type for rsmachine.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ProvisionError {
    /// A mandatory key is absent from both the call parameters and the
    /// provider configuration.
    #[error("{key} is mandatory")]
    MissingConfig {
        /// Name of the missing key, as the caller knows it (e.g. `driver`).
        key: String,
    },

    /// A configuration value is present but has the wrong shape.
    #[error("invalid configuration for {key}: {message}")]
    InvalidConfig { key: String, message: String },

    /// A call parameter is present but malformed.
    #[error("invalid parameter {key}: {message}")]
    InvalidParam { key: String, message: String },

    /// A configuration file could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// A named entity does not exist (provider, configuration key, machine).
    #[error("{kind} not found: {name}")]
    NotFound {
        /// What was looked up (e.g. "provider", "config key", "machine").
        kind: &'static str,
        name: String,
    },

    /// A named entity exists where a new one was to be created.
    #[error("{kind} already exists: {name}")]
    AlreadyExists { kind: &'static str, name: String },

    /// A provider name was registered twice.
    #[error("provider already registered: {0}")]
    DuplicateProvider(String),

    /// A command exited unsuccessfully or could not be driven to completion.
    #[error("command execution failed: {command}: {status}")]
    Execution {
        /// The command that was executed.
        command: String,
        /// Exit status, signal, or a description of the internal failure.
        status: String,
    },

    /// A command could not be located in `PATH`.
    #[error("command not found in PATH: {command}")]
    CommandNotFound {
        command: String,
        #[source]
        source: which::Error,
    },

    /// A command did not finish within the configured timeout.
    #[error("command timed out after {seconds}s: {command}")]
    Timeout { command: String, seconds: u64 },

    /// An I/O operation failed with contextual information.
    #[error("{context}: {message}")]
    Io {
        /// What was being done when the error occurred, usually including a path.
        context: String,
        /// Derived from [`io_error_kind_message`].
        message: String,
        #[source]
        source: std::io::Error,
    },
}

impl ProvisionError {
    /// Creates an `Io` variant with the `message` field derived from `source`.
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            message: io_error_kind_message(&source),
            source,
        }
    }

    /// Creates a `NotFound` variant.
    pub(crate) fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    /// Creates an `AlreadyExists` variant.
    pub(crate) fn already_exists(kind: &'static str, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind,
            name: name.into(),
        }
    }

    /// Returns true for the `NotFound` variant.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

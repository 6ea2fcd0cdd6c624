//! Bootstrap payload delivered to new machines.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;
use url::Url;

use crate::config::ProviderConfig;
use crate::error::ProvisionError;

/// Payload used when no `user-data` location is configured.
pub const DEFAULT_USER_DATA: &str = r#"#!/bin/sh
set -e
curl -fsSL https://get.docker.com/ | sh
"#;

/// File name prefix of pending user-data files.
pub const USER_DATA_PREFIX: &str = "rsmachine-userdata-";

/// Source of the bootstrap payload.
pub trait UserDataSource: Send + Sync {
    /// Returns the rendered payload.
    fn read_user_data(&self) -> Result<String>;
}

/// Reads the payload from the provider configuration.
///
/// The `user-data` key holds a local path or a `file://` URL. Without it
/// the [`DEFAULT_USER_DATA`] script is used.
#[derive(Debug, Clone)]
pub struct ConfigUserData {
    config: ProviderConfig,
}

impl ConfigUserData {
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }
}

/// Turns a configured user-data location into a local path.
fn user_data_path(location: &str) -> Result<PathBuf, ProvisionError> {
    let invalid = |message: String| ProvisionError::InvalidConfig {
        key: "user-data".to_string(),
        message,
    };
    match Url::parse(location) {
        Ok(url) if url.scheme() == "file" => url
            .to_file_path()
            .map_err(|()| invalid(format!("not a local file URL: {}", location))),
        Ok(url) if matches!(url.scheme(), "http" | "https") => Err(invalid(format!(
            "remote user-data is not supported: {}",
            location
        ))),
        // single letter schemes are Windows drive prefixes
        Ok(url) if url.scheme().len() > 1 => Err(invalid(format!(
            "unsupported user-data scheme '{}': {}",
            url.scheme(),
            location
        ))),
        _ => Ok(PathBuf::from(location)),
    }
}

impl UserDataSource for ConfigUserData {
    fn read_user_data(&self) -> Result<String> {
        let Some(location) = self.config.optional_string("user-data")? else {
            debug!("no user-data configured, using the default payload");
            return Ok(DEFAULT_USER_DATA.to_string());
        };
        let path = user_data_path(&location)?;
        let content = fs::read_to_string(&path)
            .map_err(|e| ProvisionError::io(path.display().to_string(), e))?;
        debug!("read {} bytes of user-data from {}", content.len(), path.display());
        Ok(content)
    }
}

/// A uniquely-named temporary file holding the payload for one call.
///
/// The file is removed when the guard drops, whatever the outcome of the
/// call that used it.
#[derive(Debug)]
pub struct PendingUserData {
    path: PathBuf,
}

impl PendingUserData {
    /// Creates the file and writes the payload read from `source` into it.
    ///
    /// Each step's failure is reported with the step named. The file is
    /// already guarded when reading or writing fails.
    pub fn create(source: &dyn UserDataSource) -> Result<Self> {
        Self::create_in(&std::env::temp_dir(), source)
    }

    /// Like [`create`](Self::create), placing the file in `dir`.
    pub fn create_in(dir: &Path, source: &dyn UserDataSource) -> Result<Self> {
        let (mut file, temp_path) = tempfile::Builder::new()
            .prefix(USER_DATA_PREFIX)
            .tempfile_in(dir)
            .context("failed to create userdata file")?
            .into_parts();
        let path = temp_path.keep().context("failed to create userdata file")?;
        let pending = Self { path };

        let user_data = source.read_user_data().context("failed to read userdata")?;
        file.write_all(user_data.as_bytes())
            .and_then(|()| file.flush())
            .context("failed to write local userdata file")?;

        debug!("wrote user-data to {}", pending.path.display());
        Ok(pending)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PendingUserData {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("removed user-data file: {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("user-data file already removed: {}", self.path.display());
            }
            Err(e) => {
                tracing::error!("failed to remove user-data file {}: {}", self.path.display(), e);
            }
        }
    }
}

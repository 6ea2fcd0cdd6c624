//! Command argument builder for docker-machine invocations.

use camino::Utf8Path;

use super::options::{DriverOptions, OptionValue};

/// Builder for assembling docker-machine command arguments.
#[derive(Debug, Default)]
pub struct CommandArgsBuilder {
    args: Vec<String>,
}

impl CommandArgsBuilder {
    /// Create a new, empty builder.
    pub fn new() -> Self {
        Self { args: Vec::new() }
    }

    /// Append a raw argument to the builder.
    pub fn push_arg(&mut self, arg: impl Into<String>) {
        self.args.push(arg.into());
    }

    /// Append a flag with no value.
    pub fn push_flag(&mut self, flag: &str) {
        self.args.push(flag.to_string());
    }

    /// Append a flag and its value as separate arguments if the value is not empty.
    pub fn push_flag_value(&mut self, flag: &str, value: &str) {
        if value.is_empty() {
            return;
        }
        self.args.push(flag.to_string());
        self.args.push(value.to_string());
    }

    /// Append a flag with value if one is present.
    pub fn push_opt_flag_value(&mut self, flag: &str, value: Option<&str>) {
        if let Some(value) = value {
            self.push_flag_value(flag, value);
        }
    }

    /// Append a flag with a path value.
    pub fn push_flag_path(&mut self, flag: &str, path: &Utf8Path) {
        self.push_flag_value(flag, path.as_str());
    }

    /// Append one driver option as a single `--<key>=<value>` argument.
    ///
    /// Booleans are switches: `true` renders the bare flag and `false`
    /// renders nothing. Empty values are skipped.
    pub fn push_driver_option(&mut self, key: &str, value: &OptionValue) {
        match value {
            OptionValue::Bool(true) => self.push_flag(&format!("--{}", key)),
            OptionValue::Bool(false) => {}
            other => {
                let value = other.to_string();
                if !value.is_empty() {
                    self.args.push(format!("--{}={}", key, value));
                }
            }
        }
    }

    /// Append every driver option in order.
    pub fn push_driver_options(&mut self, options: &DriverOptions) {
        for (key, value) in options.iter() {
            self.push_driver_option(key, value);
        }
    }

    /// Return the collected arguments.
    pub fn into_args(self) -> Vec<String> {
        self.args
    }
}

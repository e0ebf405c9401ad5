//! Main CLI parser and top-level argument handling.

use clap::{Args, Parser, Subcommand};
use unsub_core::config::env_keys;
use unsub_core::{BackendConfig, ConfigError, HealthMonitorConfig};

/// Command-line interface for running and watching the Unsubscriber backend.
#[derive(Parser, Debug)]
#[command(name = "unsub")]
#[command(about = "Run and watch the Unsubscriber backend service")]
#[command(version)]
pub struct Cli {
    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the backend and monitor it until Ctrl-C or a critical failure
    Run(BackendArgs),

    /// Start the backend once, print its status as JSON and stop it
    Status(BackendArgs),
}

/// Overrides for values otherwise read from `UNSUB_*` environment variables.
#[derive(Args, Debug, Default, Clone)]
pub struct BackendArgs {
    /// Backend executable
    #[arg(long, value_name = "PATH")]
    pub executable: Option<String>,

    /// Extra argument passed to the backend verbatim (repeatable, replaces `UNSUB_BACKEND_ARGS`)
    #[arg(long = "arg", value_name = "ARG", allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// Working directory for the backend (default: the executable's directory)
    #[arg(long = "dir", value_name = "DIR")]
    pub working_dir: Option<String>,

    /// Time allowed for the port announcement and readiness
    #[arg(long, value_name = "MS")]
    pub startup_timeout_ms: Option<u64>,

    /// Time between health checks
    #[arg(long, value_name = "MS")]
    pub health_interval_ms: Option<u64>,

    /// Consecutive failed health checks before giving up
    #[arg(long, value_name = "N")]
    pub failure_threshold: Option<u32>,
}

impl BackendArgs {
    /// Backend configuration from these flags, falling back to the environment.
    pub fn backend_config(&self) -> Result<BackendConfig, ConfigError> {
        self.backend_config_from(|key| std::env::var(key).ok())
    }

    /// Health monitor policy from these flags, falling back to the environment.
    pub fn monitor_config(&self) -> Result<HealthMonitorConfig, ConfigError> {
        self.monitor_config_from(|key| std::env::var(key).ok())
    }

    pub fn backend_config_from(
        &self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<BackendConfig, ConfigError> {
        let mut config = BackendConfig::from_lookup(|key| self.flag(key).or_else(|| env(key)))?;
        // Flag arguments are passed through verbatim, spaces and empties included
        if !self.args.is_empty() {
            config.args.clone_from(&self.args);
        }
        Ok(config)
    }

    pub fn monitor_config_from(
        &self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<HealthMonitorConfig, ConfigError> {
        HealthMonitorConfig::from_lookup(|key| self.flag(key).or_else(|| env(key)))
    }

    /// The flag value standing in for environment variable `key`, if given.
    fn flag(&self, key: &str) -> Option<String> {
        match key {
            env_keys::EXECUTABLE => self.executable.clone(),
            env_keys::WORKING_DIR => self.working_dir.clone(),
            env_keys::STARTUP_TIMEOUT_MS => self.startup_timeout_ms.map(|v| v.to_string()),
            env_keys::HEALTH_INTERVAL_MS => self.health_interval_ms.map(|v| v.to_string()),
            env_keys::FAILURE_THRESHOLD => self.failure_threshold.map(|v| v.to_string()),
            _ => None,
        }
    }
}

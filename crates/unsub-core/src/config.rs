//! Backend supervision and health monitoring configuration.
//!
//! These are plain value types with defaults. Values can be read from the
//! process environment (`UNSUB_*` variables, durations in milliseconds) or
//! from any key lookup, which keeps parsing testable without touching the
//! real environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

/// Default time allowed for the backend to announce its port and become healthy.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Default path of the backend health endpoint.
pub const DEFAULT_HEALTH_PATH: &str = "/health";

/// Default delay between readiness probes during startup.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_millis(250);

/// Default per-request timeout for readiness probes.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(2_000);

/// Default time a backend gets to exit after a graceful termination signal.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_millis(5_000);

/// Default number of backend output lines kept for display.
pub const DEFAULT_LOG_BUFFER_LINES: usize = 1_000;

/// Default interval between periodic health checks.
pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_millis(5_000);

/// Default per-request timeout for periodic health checks.
pub const DEFAULT_HEALTH_CHECK_TIMEOUT: Duration = Duration::from_millis(3_000);

/// Default number of consecutive failed checks before the backend is declared dead.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Environment variable names.
pub mod env_keys {
    pub const EXECUTABLE: &str = "UNSUB_BACKEND_EXECUTABLE";
    pub const ARGS: &str = "UNSUB_BACKEND_ARGS";
    pub const WORKING_DIR: &str = "UNSUB_BACKEND_DIR";
    pub const STARTUP_TIMEOUT_MS: &str = "UNSUB_STARTUP_TIMEOUT_MS";
    pub const HEALTH_PATH: &str = "UNSUB_HEALTH_PATH";
    pub const PROBE_INTERVAL_MS: &str = "UNSUB_PROBE_INTERVAL_MS";
    pub const PROBE_TIMEOUT_MS: &str = "UNSUB_PROBE_TIMEOUT_MS";
    pub const SHUTDOWN_GRACE_MS: &str = "UNSUB_SHUTDOWN_GRACE_MS";
    pub const LOG_BUFFER_LINES: &str = "UNSUB_LOG_BUFFER_LINES";
    pub const HEALTH_INTERVAL_MS: &str = "UNSUB_HEALTH_INTERVAL_MS";
    pub const HEALTH_CHECK_TIMEOUT_MS: &str = "UNSUB_HEALTH_CHECK_TIMEOUT_MS";
    pub const FAILURE_THRESHOLD: &str = "UNSUB_FAILURE_THRESHOLD";
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required value was not provided.
    #[error("{key} is not set")]
    Missing { key: &'static str },

    /// A value was provided but could not be used.
    #[error("{key} has invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// How to launch and supervise the backend process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// Backend executable.
    pub executable: PathBuf,
    /// Extra arguments passed to the executable.
    pub args: Vec<String>,
    /// Working directory. Falls back to the executable's directory.
    pub working_dir: Option<PathBuf>,
    /// Overall budget for port announcement plus readiness.
    pub startup_timeout: Duration,
    /// Health endpoint path, starting with `/`.
    pub health_path: String,
    /// Delay between readiness probes.
    pub probe_interval: Duration,
    /// Per-request readiness probe timeout.
    pub probe_timeout: Duration,
    /// Grace period between the graceful and the forced termination signal.
    pub shutdown_grace: Duration,
    /// Number of output lines kept in the backend log buffer.
    pub log_buffer_lines: usize,
}

impl BackendConfig {
    /// Create a configuration for `executable` with default timings.
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            args: Vec::new(),
            working_dir: None,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            health_path: DEFAULT_HEALTH_PATH.to_string(),
            probe_interval: DEFAULT_PROBE_INTERVAL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            log_buffer_lines: DEFAULT_LOG_BUFFER_LINES,
        }
    }

    /// Builder-style argument list.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Builder-style working directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let executable = lookup(env_keys::EXECUTABLE)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing {
                key: env_keys::EXECUTABLE,
            })?;

        let mut config = Self::new(executable.trim());

        if let Some(args) = lookup(env_keys::ARGS) {
            config.args = args.split_whitespace().map(str::to_string).collect();
        }
        if let Some(dir) = lookup(env_keys::WORKING_DIR).filter(|v| !v.trim().is_empty()) {
            config.working_dir = Some(PathBuf::from(dir.trim()));
        }
        if let Some(path) = lookup(env_keys::HEALTH_PATH) {
            config.health_path = path.trim().to_string();
        }

        read_millis(&lookup, env_keys::STARTUP_TIMEOUT_MS, &mut config.startup_timeout)?;
        read_millis(&lookup, env_keys::PROBE_INTERVAL_MS, &mut config.probe_interval)?;
        read_millis(&lookup, env_keys::PROBE_TIMEOUT_MS, &mut config.probe_timeout)?;
        read_millis(&lookup, env_keys::SHUTDOWN_GRACE_MS, &mut config.shutdown_grace)?;
        read_number(&lookup, env_keys::LOG_BUFFER_LINES, &mut config.log_buffer_lines)?;

        config.validate()?;
        debug!(executable = %config.executable.display(), "Loaded backend configuration");
        Ok(config)
    }

    /// Directory the backend is started in.
    ///
    /// The explicit working directory wins; otherwise the directory that
    /// contains the executable, if the path has one.
    pub fn effective_working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref().or_else(|| {
            self.executable
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
        })
    }

    /// Check invariants that the supervisor relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.executable.as_os_str().is_empty() {
            return Err(ConfigError::Missing {
                key: env_keys::EXECUTABLE,
            });
        }
        if !self.health_path.starts_with('/') {
            return Err(ConfigError::invalid(
                env_keys::HEALTH_PATH,
                &self.health_path,
                "must start with '/'",
            ));
        }
        non_zero(env_keys::STARTUP_TIMEOUT_MS, self.startup_timeout)?;
        non_zero(env_keys::PROBE_INTERVAL_MS, self.probe_interval)?;
        non_zero(env_keys::PROBE_TIMEOUT_MS, self.probe_timeout)?;
        if self.log_buffer_lines == 0 {
            return Err(ConfigError::invalid(
                env_keys::LOG_BUFFER_LINES,
                "0",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Periodic health monitoring policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthMonitorConfig {
    /// Time between checks.
    pub check_interval: Duration,
    /// Per-check request timeout.
    pub check_timeout: Duration,
    /// Consecutive failures that escalate to a critical failure.
    pub failure_threshold: u32,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            check_interval: DEFAULT_HEALTH_INTERVAL,
            check_timeout: DEFAULT_HEALTH_CHECK_TIMEOUT,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        }
    }
}

impl HealthMonitorConfig {
    /// Read the policy from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the policy from an arbitrary key lookup; unset keys keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        read_millis(&lookup, env_keys::HEALTH_INTERVAL_MS, &mut config.check_interval)?;
        read_millis(
            &lookup,
            env_keys::HEALTH_CHECK_TIMEOUT_MS,
            &mut config.check_timeout,
        )?;
        read_number(&lookup, env_keys::FAILURE_THRESHOLD, &mut config.failure_threshold)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        non_zero(env_keys::HEALTH_INTERVAL_MS, self.check_interval)?;
        non_zero(env_keys::HEALTH_CHECK_TIMEOUT_MS, self.check_timeout)?;
        if self.failure_threshold == 0 {
            return Err(ConfigError::invalid(
                env_keys::FAILURE_THRESHOLD,
                "0",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}

fn read_millis(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    target: &mut Duration,
) -> Result<(), ConfigError> {
    let mut millis: u64 = 0;
    if read_number(lookup, key, &mut millis)? {
        *target = Duration::from_millis(millis);
    }
    Ok(())
}

fn read_number<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    target: &mut T,
) -> Result<bool, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(false);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(false);
    }
    *target = trimmed
        .parse()
        .map_err(|e: T::Err| ConfigError::invalid(key, trimmed, e.to_string()))?;
    Ok(true)
}

fn non_zero(key: &'static str, value: Duration) -> Result<(), ConfigError> {
    if value.is_zero() {
        return Err(ConfigError::invalid(key, "0", "must be greater than zero"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_backend_defaults() {
        let config = BackendConfig::new("/opt/unsub/backend/run");
        assert_eq!(config.startup_timeout, Duration::from_secs(30));
        assert_eq!(config.health_path, "/health");
        assert_eq!(config.shutdown_grace, Duration::from_secs(5));
        assert!(config.probe_timeout <= Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_executable() {
        let err = BackendConfig::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Missing {
                key: env_keys::EXECUTABLE
            }
        );
    }

    #[test]
    fn test_overrides_from_lookup() {
        let config = BackendConfig::from_lookup(lookup(&[
            (env_keys::EXECUTABLE, "/srv/backend/main"),
            (env_keys::ARGS, "--debug  --quiet"),
            (env_keys::STARTUP_TIMEOUT_MS, "1500"),
            (env_keys::SHUTDOWN_GRACE_MS, " 200 "),
        ]))
        .unwrap();

        assert_eq!(config.args, vec!["--debug", "--quiet"]);
        assert_eq!(config.startup_timeout, Duration::from_millis(1500));
        assert_eq!(config.shutdown_grace, Duration::from_millis(200));
        assert_eq!(config.probe_interval, DEFAULT_PROBE_INTERVAL);
    }

    #[test]
    fn test_invalid_number_is_reported() {
        let err = BackendConfig::from_lookup(lookup(&[
            (env_keys::EXECUTABLE, "backend"),
            (env_keys::STARTUP_TIMEOUT_MS, "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: env_keys::STARTUP_TIMEOUT_MS,
                ..
            }
        ));
    }

    #[test]
    fn test_health_path_must_be_absolute() {
        let err = BackendConfig::from_lookup(lookup(&[
            (env_keys::EXECUTABLE, "backend"),
            (env_keys::HEALTH_PATH, "health"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("must start with '/'"));
    }

    #[test]
    fn test_working_dir_falls_back_to_executable_parent() {
        let config = BackendConfig::new("/opt/unsub/backend/run");
        assert_eq!(
            config.effective_working_dir(),
            Some(Path::new("/opt/unsub/backend"))
        );

        let bare = BackendConfig::new("backend");
        assert_eq!(bare.effective_working_dir(), None);

        let explicit = BackendConfig::new("/opt/unsub/backend/run").with_working_dir("/tmp");
        assert_eq!(explicit.effective_working_dir(), Some(Path::new("/tmp")));
    }

    #[test]
    fn test_monitor_policy() {
        let config = HealthMonitorConfig::from_lookup(lookup(&[(
            env_keys::FAILURE_THRESHOLD,
            "5",
        )]))
        .unwrap();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.check_interval, Duration::from_secs(5));

        let err = HealthMonitorConfig::from_lookup(lookup(&[(env_keys::FAILURE_THRESHOLD, "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}

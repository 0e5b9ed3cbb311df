use super::duration::parse_duration_string;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/warden/warden.yaml";
pub const DEFAULT_SERVICES_DIR: &str = "/etc/warden/services";
pub const DEFAULT_SOCKET_PATH: &str = "/run/warden.sock";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// When a service's `Provides` tags count as started during boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvidesPolicy {
    /// As soon as a start was attempted, whatever its result
    #[default]
    Attempted,
    /// Only once the service reached `Started`
    Confirmed,
}

/// Daemon settings, read from `warden.yaml`.
///
/// ```yaml
/// services_dir: /etc/warden/services
/// socket_path: /run/warden.sock
/// dependency_poll_interval: 2s
/// dependency_poll_attempts: 60
/// provides_policy: attempted
/// stop_grace_period: 10s
/// log_file: /var/log/warden.log
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub services_dir: PathBuf,
    pub socket_path: PathBuf,
    pub dependency_poll_interval: String,
    pub dependency_poll_attempts: u32,
    pub provides_policy: ProvidesPolicy,
    pub stop_grace_period: String,
    pub log_file: Option<PathBuf>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            services_dir: PathBuf::from(DEFAULT_SERVICES_DIR),
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            dependency_poll_interval: "2s".to_string(),
            dependency_poll_attempts: 60,
            provides_policy: ProvidesPolicy::Attempted,
            stop_grace_period: "10s".to_string(),
            log_file: None,
        }
    }
}

impl DaemonConfig {
    /// Load settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("No daemon config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(Error::Config(format!(
                    "Failed to read config file '{}': {}",
                    path.display(),
                    e
                )))
            }
        };
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to an empty mapping
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("dependency_poll_interval", &self.dependency_poll_interval),
            ("stop_grace_period", &self.stop_grace_period),
        ] {
            if parse_duration_string(value).is_none() {
                return Err(Error::Config(format!(
                    "invalid {} '{}'. Use formats like '500ms', '2s', '1m'",
                    field, value
                )));
            }
        }
        if self.dependency_poll_interval().is_zero() {
            return Err(Error::Config(
                "dependency_poll_interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn dependency_poll_interval(&self) -> Duration {
        parse_duration_string(&self.dependency_poll_interval).unwrap_or(DEFAULT_POLL_INTERVAL)
    }

    /// How long a launcher unit waits for its needs before starting anyway.
    pub fn dependency_wait_budget(&self) -> Duration {
        self.dependency_poll_interval()
            .saturating_mul(self.dependency_poll_attempts)
    }

    pub fn stop_grace_period(&self) -> Duration {
        parse_duration_string(&self.stop_grace_period).unwrap_or(DEFAULT_GRACE_PERIOD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_boot_budget() {
        let config = DaemonConfig::default();
        assert_eq!(config.dependency_wait_budget(), Duration::from_secs(120));
        assert_eq!(config.stop_grace_period(), Duration::from_secs(10));
        assert_eq!(config.provides_policy, ProvidesPolicy::Attempted);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = DaemonConfig::from_yaml(
            "services_dir: /tmp/svc\nprovides_policy: confirmed\ndependency_poll_interval: 100ms\n",
        )
        .unwrap();
        assert_eq!(config.services_dir, PathBuf::from("/tmp/svc"));
        assert_eq!(config.provides_policy, ProvidesPolicy::Confirmed);
        assert_eq!(config.dependency_wait_budget(), Duration::from_secs(6));
        assert_eq!(config.socket_path, PathBuf::from(DEFAULT_SOCKET_PATH));
    }

    #[test]
    fn invalid_duration_is_rejected() {
        let err = DaemonConfig::from_yaml("stop_grace_period: soon\n").unwrap_err();
        assert!(err.to_string().contains("stop_grace_period"));
        assert!(DaemonConfig::from_yaml("dependency_poll_interval: 0s\n").is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = DaemonConfig::load(&dir.path().join("warden.yaml")).unwrap();
        assert_eq!(config, DaemonConfig::default());
        assert_eq!(DaemonConfig::from_yaml("").unwrap(), DaemonConfig::default());
    }
}

//! Control protocol messages.
//!
//! One JSON document per line in each direction; every request gets exactly
//! one response line.

use crate::error::{Error, Result};
use crate::orchestrator::{DaemonStats, ServiceAction, ServiceActionAnswer};
use crate::service::ServiceStatus;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    Status,
    Version,
    Stats,
    ServiceAction { name: String, action: ServiceAction },
    Reboot,
    Shutdown,
    Reexec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Response {
    Status(Vec<ServiceStatus>),
    Version(VersionInfo),
    Stats(DaemonStats),
    ServiceAction(ServiceActionAnswer),
    /// A host-level action was accepted and is running in the background
    Accepted(String),
    Error(String),
}

/// Build identification of the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: Option<String>,
    pub build_time: Option<String>,
}

impl VersionInfo {
    /// Version of this binary. The git hash and build time are taken from
    /// `WARDEN_BUILD_GIT_HASH` and `WARDEN_BUILD_TIME` at compile time.
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            git_hash: option_env!("WARDEN_BUILD_GIT_HASH").map(String::from),
            build_time: option_env!("WARDEN_BUILD_TIME").map(String::from),
        }
    }
}

impl std::fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "warden {}", self.version)?;
        if let Some(hash) = &self.git_hash {
            write!(f, " ({})", hash)?;
        }
        if let Some(time) = &self.build_time {
            write!(f, " built {}", time)?;
        }
        Ok(())
    }
}

/// Serialize `message` as one protocol line, newline included.
pub fn encode_line<T: Serialize>(message: &T) -> Result<String> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

pub fn decode_line<T: DeserializeOwned>(line: &str) -> Result<T> {
    serde_json::from_str(line.trim_end())
        .map_err(|e| Error::Protocol(format!("malformed message: {}", e)))
}

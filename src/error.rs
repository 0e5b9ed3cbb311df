// Allow unused_assignments at module level because thiserror's generated code
// for struct variants triggers false positive warnings - the fields ARE used
// in the Display impl but rustc's lint pass doesn't see this.
#![allow(unused_assignments)]

use crate::service::RunState;
use miette::Diagnostic;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    #[diagnostic(code(warden::config::error))]
    Config(String),

    #[error("Invalid service definition: {0}")]
    #[diagnostic(
        code(warden::config::invalid),
        help("Names and capability tags may only use the characters a-Z0-9_-.")
    )]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Service not found: {0}")]
    #[diagnostic(
        code(warden::service::not_found),
        help("List known services with `warden status`")
    )]
    ServiceNotFound(String),

    #[error("Service '{0}' was removed from the configuration")]
    #[diagnostic(
        code(warden::service::deleted),
        help("Restore its .service file and run `warden reload {0}`")
    )]
    ServiceDeleted(String),

    #[error("Service '{name}' already running{}",
        .pid.map(|pid| format!(" as PID {}", pid)).unwrap_or_default()
    )]
    #[diagnostic(
        code(warden::service::already_running),
        help("Use `warden restart {name}` to restart it")
    )]
    AlreadyRunning { name: String, pid: Option<u32> },

    #[error("Service '{name}' is {state}")]
    #[diagnostic(code(warden::service::invalid_state))]
    InvalidState { name: String, state: RunState },

    #[error("Service '{0}' failed to start: {1}")]
    #[diagnostic(
        code(warden::service::start_failed),
        help("Check that the Startup command exists and is executable")
    )]
    LaunchFailed(String, String),

    #[error("Shutdown command of '{0}' could not be run: {1}")]
    #[diagnostic(
        code(warden::service::shutdown_failed),
        help("Check that the Shutdown command exists and is executable")
    )]
    ShutdownFailed(String, String),

    #[error("CheckAlive command of '{0}' could not be run: {1}")]
    #[diagnostic(code(warden::liveness::check_alive))]
    CheckAlive(String, String),

    #[error("Cannot determine process state of '{0}'")]
    #[diagnostic(
        code(warden::liveness::indeterminate),
        help("Add a PIDFile: or CheckAlive: directive to the service definition")
    )]
    LivenessIndeterminate(String),

    #[error("No Shutdown command defined for '{0}', don't know how to stop it")]
    #[diagnostic(
        code(warden::service::no_shutdown),
        help("Add a Shutdown: directive to the service definition")
    )]
    NoShutdownCommand(String),

    #[error("Service '{0}' doesn't seem to be alive")]
    #[diagnostic(code(warden::service::not_alive))]
    NotAlive(String),

    #[error("Failed to read PID file '{}': {reason}", .path.display())]
    #[diagnostic(code(warden::liveness::pid_file))]
    PidFile { path: PathBuf, reason: String },

    #[error("Invalid PID {pid}: {reason}")]
    InvalidPid { pid: u32, reason: String },

    #[error("Failed to signal PID {pid}: {reason}")]
    #[diagnostic(code(warden::process::signal))]
    Signal { pid: u32, reason: String },

    #[error("Control protocol error: {0}")]
    #[diagnostic(
        code(warden::ipc::protocol),
        help("Check that the daemon is running and that the socket path matches")
    )]
    Protocol(String),

    #[error("Host action failed: {0}")]
    #[diagnostic(code(warden::host::error))]
    Host(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns a helpful suggestion for resolving this error, if available.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Error::ServiceNotFound(_) => {
                Some("Check `warden status` for the services the daemon knows about.".to_string())
            }
            Error::ServiceDeleted(name) => Some(format!(
                "The definition of '{}' disappeared on the last reload. Restore it and reload.",
                name
            )),
            Error::AlreadyRunning { name, .. } => {
                Some(format!("Restart the service with: warden restart {}", name))
            }
            Error::InvalidState { name, .. } => Some(format!(
                "Stop the service first with: warden stop {}",
                name
            )),
            Error::LivenessIndeterminate(_) => Some(
                "Without a PIDFile: or CheckAlive: directive only simple services can be probed."
                    .to_string(),
            ),
            Error::NoShutdownCommand(name) => Some(format!(
                "Add a Shutdown: line to the definition of '{}', or use `warden kill {}`.",
                name, name
            )),
            Error::Protocol(_) | Error::Io(_) => Some(
                "Is the daemon running? Pass --socket if it listens on a non-default path."
                    .to_string(),
            ),
            Error::Config(_) | Error::Validation(_) | Error::Yaml(_) => {
                Some("Check the daemon configuration and the .service files.".to_string())
            }
            _ => None,
        }
    }

    /// Formats the error with its suggestion (if any) for user-friendly display.
    pub fn with_suggestion(&self) -> String {
        match self.suggestion() {
            Some(suggestion) => format!("{}\n\nHint: {}", self, suggestion),
            None => self.to_string(),
        }
    }
}

/// PID a stop or kill may signal.
///
/// Refuses 0 (`kill(0)` would hit the daemon's own group), 1 and the daemon
/// itself (signalling either would take down the supervisor), and anything
/// that does not fit a `pid_t`.
pub fn signal_target(pid: u32) -> Result<nix::unistd::Pid> {
    let reason = match pid {
        0 => Some("no process is tracked".to_string()),
        1 => Some("PID 1 is the init process".to_string()),
        pid if pid == std::process::id() => Some("that is the supervisor itself".to_string()),
        pid if pid > i32::MAX as u32 => Some(format!("{} does not fit in pid_t", pid)),
        _ => None,
    };
    match reason {
        Some(reason) => Err(Error::InvalidPid { pid, reason }),
        None => Ok(nix::unistd::Pid::from_raw(pid as i32)),
    }
}

/// PID that may be probed with `kill(pid, 0)`. Any real PID qualifies.
pub fn probe_target(pid: u32) -> Option<nix::unistd::Pid> {
    i32::try_from(pid)
        .ok()
        .filter(|raw| *raw > 0)
        .map(nix::unistd::Pid::from_raw)
}

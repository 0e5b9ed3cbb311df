use super::ops::ProcessOps;
use crate::error::{Error, Result};
use crate::service::{ServiceDefinition, ServiceEntry, ServiceKind, StartTicket};
use nix::sys::signal::Signal;
use std::io;
use std::process::ExitStatus;
use std::sync::Arc;

/// Wait errors reported when a self-daemonizing command was already reaped.
const WAIT_NO_CHILD: &str = "wait: no child processes";
const WAITID_NO_CHILD: &str = "waitid: no child processes";

/// How a run-to-completion command ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Success,
    /// The wait reported "no child process": the command detached and was
    /// reaped before we could collect it. Counts as success.
    ReapRace,
    Failed(String),
}

/// Whether `err` is the "no child process" condition of a detached child.
pub fn is_reap_race(err: &io::Error) -> bool {
    if err.raw_os_error() == Some(nix::libc::ECHILD) {
        return true;
    }
    let message = err.to_string();
    message == WAIT_NO_CHILD || message == WAITID_NO_CHILD
}

pub fn classify_completion(result: &io::Result<ExitStatus>) -> Completion {
    match result {
        Ok(status) if status.success() => Completion::Success,
        Ok(status) => Completion::Failed(status.to_string()),
        Err(err) if is_reap_race(err) => Completion::ReapRace,
        Err(err) => Completion::Failed(err.to_string()),
    }
}

/// Result of a successful [`ProcessSupervisor::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A oneshot or forking command exited successfully
    Completed,
    /// A oneshot or forking command detached before it could be reaped
    Detached,
    /// A simple service is running as `pid`, watched in the background
    Tracked { pid: u32 },
}

impl StartOutcome {
    pub fn pid(&self) -> Option<u32> {
        match self {
            StartOutcome::Tracked { pid } => Some(*pid),
            _ => None,
        }
    }
}

/// Starts and stops service processes, writing every state change to the
/// service's registry entry.
#[derive(Clone)]
pub struct ProcessSupervisor {
    ops: Arc<dyn ProcessOps>,
}

impl std::fmt::Debug for ProcessSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessSupervisor").finish_non_exhaustive()
    }
}

impl ProcessSupervisor {
    pub fn new(ops: Arc<dyn ProcessOps>) -> Self {
        Self { ops }
    }

    pub fn ops(&self) -> &Arc<dyn ProcessOps> {
        &self.ops
    }

    /// Start the service behind `entry`.
    ///
    /// The record must be `NotStarted`; with `rearm` a record whose last run
    /// ended is accepted too. The check and the move to `Starting` happen
    /// under one lock hold, and a refused start leaves the record untouched.
    ///
    /// Oneshot and forking services are run to completion before this
    /// returns. A simple service returns as soon as it is launched; its exit
    /// is recorded by a background task.
    #[tracing::instrument(skip(self, entry), fields(service.name = %entry.name()))]
    pub async fn start(&self, entry: &Arc<ServiceEntry>, rearm: bool) -> Result<StartOutcome> {
        let ticket = entry.begin_start(rearm)?;
        if ticket.definition.kind.runs_to_completion() {
            self.run_to_completion(entry, ticket).await
        } else {
            self.start_tracked(entry, ticket)
        }
    }

    async fn run_to_completion(
        &self,
        entry: &Arc<ServiceEntry>,
        ticket: StartTicket,
    ) -> Result<StartOutcome> {
        let name = entry.name();
        let result = self.ops.run(&ticket.definition.startup, true).await;

        match classify_completion(&result) {
            Completion::Success => {
                entry.mark_started(ticket.run_id, None);
                tracing::info!(service = %name, "Started service");
                Ok(StartOutcome::Completed)
            }
            Completion::ReapRace => {
                entry.mark_started(ticket.run_id, None);
                tracing::info!(service = %name, "Started service (command detached)");
                Ok(StartOutcome::Detached)
            }
            Completion::Failed(reason) => {
                tracing::error!(service = %name, "Error starting service: {}", reason);
                entry.mark_errored(ticket.run_id, reason.clone());
                Err(Error::LaunchFailed(name.to_string(), reason))
            }
        }
    }

    fn start_tracked(&self, entry: &Arc<ServiceEntry>, ticket: StartTicket) -> Result<StartOutcome> {
        let name = entry.name().to_string();
        let launched = match self.ops.launch(&ticket.definition.startup) {
            Ok(launched) => launched,
            Err(e) => {
                tracing::error!(service = %name, "Service failed to launch: {}", e);
                entry.mark_errored(ticket.run_id, e.to_string());
                return Err(Error::LaunchFailed(name, e.to_string()));
            }
        };

        let pid = launched.pid;
        entry.mark_started(ticket.run_id, Some(pid));
        tracing::info!(service = %name, pid, "Started service");

        let watched = Arc::clone(entry);
        let run_id = ticket.run_id;
        tokio::spawn(async move {
            let message = match launched.exit.await {
                Ok(status) if status.success() => {
                    tracing::info!(service = %name, pid, "Service stopped");
                    None
                }
                Ok(status) => {
                    tracing::error!(service = %name, pid, "Service finished with error: {}", status);
                    Some(status.to_string())
                }
                Err(e) => {
                    tracing::error!(service = %name, pid, "Failed to wait for service: {}", e);
                    Some(e.to_string())
                }
            };
            if !watched.mark_exited(run_id, message) {
                tracing::debug!(service = %name, run_id, "Exit of a superseded run ignored");
            }
        });

        Ok(StartOutcome::Tracked { pid })
    }

    /// Stop path: run the Shutdown command, or signal the tracked PID of a
    /// simple service that has none.
    ///
    /// The exit code of a Shutdown command is not inspected; only failing to
    /// run it at all is an error.
    #[tracing::instrument(skip(self, definition), fields(service.name = %definition.name))]
    pub async fn exec_shutdown(&self, definition: &ServiceDefinition, pid: u32) -> Result<()> {
        if let Some(command) = &definition.shutdown {
            return match self.ops.run(command, false).await {
                Ok(status) => {
                    if !status.success() {
                        tracing::warn!(
                            service = %definition.name,
                            "Shutdown command finished with {}",
                            status
                        );
                    }
                    Ok(())
                }
                Err(e) if is_reap_race(&e) => Ok(()),
                Err(e) => Err(Error::ShutdownFailed(definition.name.clone(), e.to_string())),
            };
        }

        match definition.kind {
            ServiceKind::Simple if pid != 0 => {
                tracing::debug!(service = %definition.name, pid, "Sending SIGTERM");
                self.ops.signal(pid, Signal::SIGTERM)
            }
            ServiceKind::Simple => Err(Error::NotAlive(definition.name.clone())),
            _ => Err(Error::NoShutdownCommand(definition.name.clone())),
        }
    }

    /// SIGKILL the process group of `pid`.
    pub fn kill(&self, pid: u32) -> Result<()> {
        self.ops.signal(pid, Signal::SIGKILL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;

    #[test]
    fn reap_race_strings_are_recognized() {
        let err = io::Error::new(io::ErrorKind::Other, "wait: no child processes");
        assert!(is_reap_race(&err));
        let err = io::Error::new(io::ErrorKind::Other, "waitid: no child processes");
        assert!(is_reap_race(&err));
        assert!(is_reap_race(&io::Error::from_raw_os_error(nix::libc::ECHILD)));

        let err = io::Error::new(io::ErrorKind::Other, "wait: no child processes (again)");
        assert!(!is_reap_race(&err));
        let err = io::Error::new(io::ErrorKind::NotFound, "sh: not found");
        assert!(!is_reap_race(&err));
    }

    #[test]
    fn completion_classification() {
        assert_eq!(
            classify_completion(&Ok(ExitStatus::from_raw(0))),
            Completion::Success
        );
        // Raw wait status 0x100 is exit code 1
        assert!(matches!(
            classify_completion(&Ok(ExitStatus::from_raw(0x100))),
            Completion::Failed(_)
        ));
        assert_eq!(
            classify_completion(&Err(io::Error::new(
                io::ErrorKind::Other,
                WAITID_NO_CHILD
            ))),
            Completion::ReapRace
        );
    }

    #[test]
    fn start_outcome_pid() {
        assert_eq!(StartOutcome::Tracked { pid: 7 }.pid(), Some(7));
        assert_eq!(StartOutcome::Completed.pid(), None);
    }
}

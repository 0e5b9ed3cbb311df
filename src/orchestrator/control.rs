use super::Supervisor;
use crate::error::{Error, Result};
use crate::liveness::read_pid_file;
use crate::service::{LastAction, MergeSummary, RunState, ServiceEntry, ServiceKind, ServiceRecord};
use crate::supervisor::StartOutcome;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::Instant;

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Actions a client can request on a single service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
    Reload,
    ForceKill,
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceAction::Start => write!(f, "start"),
            ServiceAction::Stop => write!(f, "stop"),
            ServiceAction::Restart => write!(f, "restart"),
            ServiceAction::Reload => write!(f, "reload"),
            ServiceAction::ForceKill => write!(f, "forcekill"),
        }
    }
}

impl FromStr for ServiceAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "start" => Ok(ServiceAction::Start),
            "stop" => Ok(ServiceAction::Stop),
            "restart" => Ok(ServiceAction::Restart),
            "reload" => Ok(ServiceAction::Reload),
            "forcekill" | "kill" => Ok(ServiceAction::ForceKill),
            other => Err(format!("unknown service action '{}'", other)),
        }
    }
}

/// What a [`Supervisor::reload`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadSummary {
    pub merged: MergeSummary,
    /// Definition files that failed to load and were left out
    pub skipped: Vec<PathBuf>,
}

/// Reply to a [`ServiceAction`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceActionAnswer {
    pub success: bool,
    pub message: String,
}

impl ServiceActionAnswer {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

impl Supervisor {
    /// Start `name` unless it is already alive.
    ///
    /// A service whose last run ended may be started again.
    #[tracing::instrument(skip(self))]
    pub async fn check_and_start(&self, name: &str) -> Result<StartOutcome> {
        let entry = self.registry.get(name)?;
        let record = entry.snapshot();
        if record.deleted {
            return Err(Error::ServiceDeleted(name.to_string()));
        }

        let liveness = self.prober.probe(&record).await?;
        if liveness.alive {
            return Err(Error::AlreadyRunning {
                name: name.to_string(),
                pid: liveness.pid,
            });
        }

        self.processes.start(&entry, true).await
    }

    /// Stop `name`, best effort and without probing it first.
    ///
    /// Always stamps `LastAction = Stop`. On success the record ends
    /// `Stopped`; when the stop path fails it ends `Errored`. A simple service
    /// that was not running is moved to `Stopped` but still reported as not
    /// alive. If the service is started again while the stop is in progress,
    /// the newer run keeps its state.
    #[tracing::instrument(skip(self))]
    pub async fn check_and_stop(&self, name: &str) -> Result<()> {
        let entry = self.registry.get(name)?;
        let record = entry.with_record(|record| {
            record.stamp(LastAction::Stop);
            record.clone()
        });
        let definition = &record.definition;

        if definition.kind == ServiceKind::Simple && !record.state.is_running() {
            entry.mark_stopped(record.run_id, Ok(()));
            return Err(Error::NotAlive(name.to_string()));
        }

        let result = self
            .processes
            .exec_shutdown(definition, record.last_known_pid)
            .await;
        let outcome = match &result {
            Ok(()) => {
                tracing::info!(service = %name, "Service stopped");
                Ok(())
            }
            Err(e) => {
                tracing::error!(service = %name, "Failed to stop service: {}", e);
                Err(e.to_string())
            }
        };
        if !entry.mark_stopped(record.run_id, outcome) {
            tracing::debug!(service = %name, "Service was started again during stop, keeping new run");
        }
        result
    }

    /// Stop `name`, give it up to `stop_grace_period` to exit, then start it
    /// again. Ends with `LastAction = Restart`.
    #[tracing::instrument(skip(self))]
    pub async fn restart(&self, name: &str) -> Result<StartOutcome> {
        let entry = self.registry.get(name)?;
        if entry.snapshot().deleted {
            return Err(Error::ServiceDeleted(name.to_string()));
        }

        if let Err(e) = self.check_and_stop(name).await {
            tracing::warn!(service = %name, "Stop before restart: {}", e);
        }
        self.wait_for_exit(&entry).await;

        let result = self.check_and_start(name).await;
        entry.stamp(LastAction::Restart);
        result
    }

    /// Re-read the services directory and merge it into the registry,
    /// keeping run states.
    ///
    /// The reload applies to every definition; `name` only picks the record
    /// stamped with `LastAction = Reload`, and is skipped when it no longer
    /// resolves.
    #[tracing::instrument(skip(self))]
    pub async fn reload(&self, name: &str) -> Result<ReloadSummary> {
        let loader = self.loader.as_ref().ok_or_else(|| {
            Error::Config("the daemon was started without a services directory".to_string())
        })?;
        let report = loader.load()?;
        let merged = self.registry.merge(report.definitions, true);
        let summary = ReloadSummary {
            merged,
            skipped: report.failures.into_iter().map(|failure| failure.file).collect(),
        };
        tracing::info!(
            added = summary.merged.added.len(),
            updated = summary.merged.updated.len(),
            deleted = summary.merged.deleted.len(),
            skipped = summary.skipped.len(),
            "Reloaded service definitions"
        );

        match self.registry.get(name) {
            Ok(entry) => entry.stamp(LastAction::Reload),
            Err(_) => tracing::debug!(service = %name, "Reload requested through an unknown service"),
        }
        Ok(summary)
    }

    /// SIGKILL the process group of `name`, bypassing its Shutdown command.
    ///
    /// Targets the tracked PID, or the PID file's PID when nothing is
    /// tracked. Returns the PID that was killed.
    #[tracing::instrument(skip(self))]
    pub async fn force_kill(&self, name: &str) -> Result<u32> {
        let entry = self.registry.get(name)?;
        let record = entry.snapshot();
        let pid = match record.last_known_pid {
            0 => match &record.definition.pid_file {
                Some(path) => read_pid_file(path)?,
                None => None,
            },
            pid => Some(pid),
        }
        .ok_or_else(|| Error::NotAlive(name.to_string()))?;

        self.processes.kill(pid)?;
        tracing::warn!(service = %name, pid, "Sent SIGKILL");

        entry.with_record(|record| {
            record.transition(RunState::Stopped);
            record.last_known_pid = 0;
            record.stamp(LastAction::ForceKill);
        });
        Ok(pid)
    }

    /// Stop every running service, concurrently. Errors are logged.
    pub async fn stop_all(&self) {
        let running: Vec<_> = self
            .registry
            .entries()
            .into_iter()
            .filter(|entry| entry.state().is_running())
            .collect();
        tracing::info!("Stopping {} running service(s)", running.len());

        let stops = running.iter().map(|entry| async move {
            if let Err(e) = self.check_and_stop(entry.name()).await {
                tracing::warn!(service = %entry.name(), "{}", e);
            }
        });
        futures::future::join_all(stops).await;
    }

    /// Run `action` on `name` and phrase the result for a client.
    pub async fn service_action(&self, name: &str, action: ServiceAction) -> ServiceActionAnswer {
        let result = match action {
            ServiceAction::Start => self.check_and_start(name).await.map(|outcome| {
                match outcome.pid() {
                    Some(pid) => format!("Service {} started as PID {}", name, pid),
                    None => format!("Service {} started", name),
                }
            }),
            ServiceAction::Stop => self
                .check_and_stop(name)
                .await
                .map(|()| format!("Service {} stopped", name)),
            ServiceAction::Restart => self
                .restart(name)
                .await
                .map(|_| format!("Service {} restarted", name)),
            ServiceAction::Reload => self.reload(name).await.map(|summary| {
                format!(
                    "Reloaded service definitions: {} added, {} updated, {} deleted, {} skipped",
                    summary.merged.added.len(),
                    summary.merged.updated.len(),
                    summary.merged.deleted.len(),
                    summary.skipped.len()
                )
            }),
            ServiceAction::ForceKill => self
                .force_kill(name)
                .await
                .map(|pid| format!("Killed PID {} of service {}", pid, name)),
        };

        match result {
            Ok(message) => ServiceActionAnswer::ok(message),
            Err(e) => ServiceActionAnswer::failed(e.to_string()),
        }
    }

    /// Wait for the processes of `entry` to go away, SIGKILLing them once the
    /// grace period is over.
    async fn wait_for_exit(&self, entry: &ServiceEntry) {
        let deadline = Instant::now() + self.config.stop_grace_period();
        loop {
            let Some(pid) = self.running_pid(&entry.snapshot()) else {
                return;
            };
            if Instant::now() >= deadline {
                tracing::warn!(
                    service = %entry.name(),
                    pid,
                    "Process did not exit after {:?}, sending SIGKILL",
                    self.config.stop_grace_period()
                );
                if let Err(e) = self.processes.kill(pid) {
                    tracing::warn!(service = %entry.name(), "{}", e);
                }
                return;
            }
            tokio::time::sleep(EXIT_POLL_INTERVAL).await;
        }
    }

    fn running_pid(&self, record: &ServiceRecord) -> Option<u32> {
        let ops = self.processes.ops();
        if record.last_known_pid != 0 {
            return ops
                .exists(record.last_known_pid)
                .then_some(record.last_known_pid);
        }
        let path = record.definition.pid_file.as_ref()?;
        let pid = read_pid_file(path).ok().flatten()?;
        ops.exists(pid).then_some(pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_names() {
        assert_eq!("kill".parse::<ServiceAction>(), Ok(ServiceAction::ForceKill));
        assert_eq!("forcekill".parse::<ServiceAction>(), Ok(ServiceAction::ForceKill));
        assert!("bounce".parse::<ServiceAction>().is_err());
        assert_eq!(ServiceAction::Restart.to_string(), "restart");
        assert_eq!(
            serde_json::to_string(&ServiceAction::ForceKill).unwrap(),
            "\"forcekill\""
        );
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Lifecycle phase of a service's current start/stop cycle.
///
/// ```text
/// NotStarted ──► Starting ──► Started ──► Stopped ─┐
///     ▲             │            │                 │
///     │             ▼            ▼                 │
///     └──────────── Errored ◄────┘                 │
///     └────────────────────────────────────────────┘
/// ```
///
/// `Stopped` and `Errored` end a run. Only they may be re-armed back to
/// `NotStarted`; a `Started` service never goes back to `NotStarted` directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    NotStarted,
    Starting,
    Started,
    Stopped,
    Errored,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::NotStarted => write!(f, "not started"),
            RunState::Starting => write!(f, "being started"),
            RunState::Started => write!(f, "already started"),
            RunState::Stopped => write!(f, "stopped"),
            RunState::Errored => write!(f, "errored"),
        }
    }
}

impl RunState {
    /// `Starting` or `Started`.
    pub fn is_running(&self) -> bool {
        matches!(self, RunState::Starting | RunState::Started)
    }

    /// `Stopped` or `Errored`: the run is over.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Stopped | RunState::Errored)
    }

    /// Check if a state transition is valid.
    ///
    /// # Examples
    ///
    /// ```
    /// use warden::service::RunState;
    ///
    /// assert!(RunState::NotStarted.is_valid_transition(RunState::Starting));
    /// assert!(RunState::Stopped.is_valid_transition(RunState::NotStarted));
    /// assert!(!RunState::Started.is_valid_transition(RunState::NotStarted));
    /// assert!(!RunState::Stopped.is_valid_transition(RunState::Started));
    /// ```
    pub fn is_valid_transition(&self, to: RunState) -> bool {
        use RunState::*;
        match (self, to) {
            (s1, s2) if *s1 == s2 => true,
            // Re-arming is only allowed once a run has ended
            (from, NotStarted) => from.is_terminal(),
            (NotStarted, Starting) => true,
            (Starting, Started) => true,
            // Stopping and failing are always reachable
            (_, Stopped) | (_, Errored) => true,
            _ => false,
        }
    }
}

/// The latest action done to a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastAction {
    #[default]
    Unknown,
    Start,
    Stop,
    Reload,
    Restart,
    ForceKill,
}

impl fmt::Display for LastAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LastAction::Unknown => write!(f, "unknown"),
            LastAction::Start => write!(f, "start"),
            LastAction::Stop => write!(f, "stop"),
            LastAction::Reload => write!(f, "reload"),
            LastAction::Restart => write!(f, "restart"),
            LastAction::ForceKill => write!(f, "force kill"),
        }
    }
}

/// How a service's process relates to the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    /// Long-running process tracked by PID until it exits
    #[default]
    Simple,
    /// Command that daemonizes itself and exits the launching shell
    Forking,
    /// Command that runs to completion
    Oneshot,
}

impl ServiceKind {
    /// Forking and oneshot services are started synchronously.
    pub fn runs_to_completion(&self) -> bool {
        matches!(self, ServiceKind::Forking | ServiceKind::Oneshot)
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceKind::Simple => write!(f, "simple"),
            ServiceKind::Forking => write!(f, "forking"),
            ServiceKind::Oneshot => write!(f, "oneshot"),
        }
    }
}

impl FromStr for ServiceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "simple" => Ok(ServiceKind::Simple),
            "forking" => Ok(ServiceKind::Forking),
            "oneshot" => Ok(ServiceKind::Oneshot),
            other => Err(format!("invalid service type '{}'", other)),
        }
    }
}

/// Static part of a service, as declared in its definition file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub auto_start: bool,
    #[serde(default)]
    pub provides: Vec<String>,
    #[serde(default)]
    pub needs: Vec<String>,
    pub kind: ServiceKind,
    #[serde(default)]
    pub pid_file: Option<PathBuf>,
    #[serde(default)]
    pub check_alive: Option<String>,
    pub startup: String,
    #[serde(default)]
    pub shutdown: Option<String>,
}

impl ServiceDefinition {
    /// Minimal definition, mostly useful to build services programmatically.
    pub fn new(name: impl Into<String>, kind: ServiceKind, startup: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            auto_start: true,
            kind,
            startup: startup.into(),
            ..Default::default()
        }
    }

    pub fn with_provides<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.provides = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_needs<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.needs = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    pub fn with_shutdown(mut self, command: impl Into<String>) -> Self {
        self.shutdown = Some(command.into());
        self
    }

    pub fn with_pid_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.pid_file = Some(path.into());
        self
    }

    pub fn with_check_alive(mut self, command: impl Into<String>) -> Self {
        self.check_alive = Some(command.into());
        self
    }
}

/// The canonical, mutable record of one supervised unit.
///
/// Only the copy held by the [`Registry`](super::Registry) is authoritative;
/// anything handed out by [`ServiceEntry::snapshot`](super::ServiceEntry::snapshot)
/// is a read-only view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub definition: ServiceDefinition,
    pub state: RunState,
    pub last_action: LastAction,
    pub last_action_at: DateTime<Utc>,
    pub last_message: Option<String>,
    /// PID of the tracked process of a simple service, 0 when not running
    pub last_known_pid: u32,
    /// Set when the definition disappeared on reload
    pub deleted: bool,
    /// Incremented on every start so exit watchers of older runs can be ignored
    pub run_id: u64,
}

impl ServiceRecord {
    pub fn new(definition: ServiceDefinition) -> Self {
        Self {
            definition,
            state: RunState::NotStarted,
            last_action: LastAction::Unknown,
            last_action_at: Utc::now(),
            last_message: None,
            last_known_pid: 0,
            deleted: false,
            run_id: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Record `action` with the current time. The timestamp never goes backwards.
    pub fn stamp(&mut self, action: LastAction) {
        let now = Utc::now();
        self.last_action = action;
        if now > self.last_action_at {
            self.last_action_at = now;
        }
    }

    /// Apply a state transition, refusing the ones the state machine forbids.
    /// Returns whether the state changed (or already was `to`).
    pub fn transition(&mut self, to: RunState) -> bool {
        if !self.state.is_valid_transition(to) {
            tracing::warn!(
                service = %self.definition.name,
                "Refusing invalid state transition {:?} -> {:?}",
                self.state,
                to
            );
            return false;
        }
        self.state = to;
        true
    }

    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            name: self.definition.name.clone(),
            description: self.definition.description.clone(),
            kind: self.definition.kind,
            auto_start: self.definition.auto_start,
            state: self.state,
            last_action: self.last_action,
            last_action_at: self.last_action_at,
            last_message: self.last_message.clone(),
            pid: self.last_known_pid,
            deleted: self.deleted,
        }
    }
}

/// Snapshot of a service as reported by the `Status` control call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub name: String,
    pub description: Option<String>,
    pub kind: ServiceKind,
    pub auto_start: bool,
    pub state: RunState,
    pub last_action: LastAction,
    pub last_action_at: DateTime<Utc>,
    pub last_message: Option<String>,
    pub pid: u32,
    pub deleted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn started_cannot_go_back_to_not_started() {
        let mut record = ServiceRecord::new(ServiceDefinition::new("a", ServiceKind::Simple, "true"));
        assert!(record.transition(RunState::Starting));
        assert!(record.transition(RunState::Started));
        assert!(!record.transition(RunState::NotStarted));
        assert_eq!(record.state, RunState::Started);

        assert!(record.transition(RunState::Stopped));
        assert!(record.transition(RunState::NotStarted));
    }

    #[test]
    fn starting_only_from_not_started() {
        for from in [RunState::Started, RunState::Stopped, RunState::Errored] {
            assert!(!from.is_valid_transition(RunState::Starting), "{:?}", from);
        }
        assert!(RunState::NotStarted.is_valid_transition(RunState::Starting));
    }

    #[test]
    fn stamp_never_goes_backwards() {
        let mut record = ServiceRecord::new(ServiceDefinition::new("a", ServiceKind::Oneshot, "true"));
        let future = Utc::now() + chrono::Duration::hours(1);
        record.last_action_at = future;
        record.stamp(LastAction::Stop);
        assert_eq!(record.last_action, LastAction::Stop);
        assert_eq!(record.last_action_at, future);
    }

    #[test]
    fn kind_parsing() {
        assert_eq!("oneshot".parse::<ServiceKind>(), Ok(ServiceKind::Oneshot));
        assert_eq!(" forking ".parse::<ServiceKind>(), Ok(ServiceKind::Forking));
        assert!("daemon".parse::<ServiceKind>().is_err());
    }

    #[test]
    fn display_strings() {
        assert_eq!(RunState::Starting.to_string(), "being started");
        assert_eq!(LastAction::ForceKill.to_string(), "force kill");
        assert_eq!(ServiceKind::Simple.to_string(), "simple");
    }
}

use super::Supervisor;
use crate::config::ProvidesPolicy;
use crate::error::Error;
use crate::service::{RunState, ServiceEntry};
use crate::supervisor::StartOutcome;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;

/// Capability tags whose providers have passed the start step, for one boot.
///
/// Writers go through `send_modify`; waiters subscribe and are woken on every
/// change instead of polling.
#[derive(Debug, Clone)]
pub struct CapabilitySet {
    tags: Arc<watch::Sender<HashSet<String>>>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        let (tags, _) = watch::channel(HashSet::new());
        Self {
            tags: Arc::new(tags),
        }
    }

    /// Mark `tags` as started.
    pub fn mark<'a>(&self, tags: impl IntoIterator<Item = &'a String>) {
        let tags: Vec<&String> = tags.into_iter().collect();
        if tags.is_empty() {
            return;
        }
        self.tags.send_modify(|set| {
            for tag in tags {
                set.insert(tag.clone());
            }
        });
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tags.borrow().contains(tag)
    }

    /// The tags of `needs` not marked yet.
    pub fn missing(&self, needs: &[String]) -> Vec<String> {
        let set = self.tags.borrow();
        needs.iter().filter(|tag| !set.contains(*tag)).cloned().collect()
    }

    pub fn snapshot(&self) -> BTreeSet<String> {
        self.tags.borrow().iter().cloned().collect()
    }

    /// Wait until every tag of `needs` is marked, for at most `budget`.
    pub async fn wait_for(&self, needs: &[String], budget: Duration) -> WaitOutcome {
        if needs.is_empty() {
            return WaitOutcome::Satisfied;
        }
        let mut rx = self.tags.subscribe();
        let wait = rx.wait_for(|set| needs.iter().all(|tag| set.contains(tag)));
        let satisfied = matches!(tokio::time::timeout(budget, wait).await, Ok(Ok(_)));
        if satisfied {
            WaitOutcome::Satisfied
        } else {
            WaitOutcome::GaveUp {
                missing: self.missing(needs),
            }
        }
    }
}

impl Default for CapabilitySet {
    fn default() -> Self {
        Self::new()
    }
}

/// How a launcher unit's dependency wait ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    Satisfied,
    /// The wait budget ran out; the start is attempted anyway
    GaveUp { missing: Vec<String> },
}

impl WaitOutcome {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, WaitOutcome::Satisfied)
    }
}

/// What the start step of a launcher unit did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchStart {
    Started(StartOutcome),
    /// The record was no longer `NotStarted` when its turn came
    Skipped(RunState),
    Failed(String),
}

/// Result of one launcher unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOutcome {
    pub service: String,
    pub wait: WaitOutcome,
    pub start: LaunchStart,
    /// Whether the service's `Provides` tags were marked as started
    pub provided: bool,
}

/// Summary of a boot run, available once every unit passed its marking step.
#[derive(Debug, Clone, Default)]
pub struct BootReport {
    /// One outcome per auto-start service, ordered by name
    pub outcomes: Vec<LaunchOutcome>,
    /// Capability tags marked during the run
    pub capabilities: BTreeSet<String>,
}

impl BootReport {
    pub fn outcome(&self, service: &str) -> Option<&LaunchOutcome> {
        self.outcomes.iter().find(|o| o.service == service)
    }

    pub fn started(&self) -> impl Iterator<Item = &LaunchOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.start, LaunchStart::Started(_)))
    }

    pub fn failed(&self) -> impl Iterator<Item = &LaunchOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.start, LaunchStart::Failed(_)))
    }

    /// Units that started without all of their needs.
    pub fn gave_up(&self) -> impl Iterator<Item = &LaunchOutcome> {
        self.outcomes.iter().filter(|o| !o.wait.is_satisfied())
    }
}

impl Supervisor {
    /// Boot orchestration: start every auto-start service once its needs are
    /// provided.
    ///
    /// Each service gets its own task that waits (bounded) for its needs, then
    /// starts the service if it is still `NotStarted`, then marks its
    /// `Provides` tags. Returns when every task has marked its tags; simple
    /// services keep running in the background.
    #[tracing::instrument(skip(self))]
    pub async fn launch_all(self: &Arc<Self>) -> BootReport {
        let capabilities = CapabilitySet::new();
        let budget = self.config.dependency_wait_budget();
        let policy = self.config.provides_policy;

        let mut units = JoinSet::new();
        for entry in self.registry.autostart_entries() {
            let supervisor = Arc::clone(self);
            let capabilities = capabilities.clone();
            units.spawn(async move {
                supervisor
                    .launch_unit(&entry, &capabilities, budget, policy)
                    .await
            });
        }

        let mut outcomes = Vec::with_capacity(units.len());
        while let Some(joined) = units.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => tracing::error!("Launcher task failed: {}", e),
            }
        }
        outcomes.sort_by(|a, b| a.service.cmp(&b.service));

        let report = BootReport {
            outcomes,
            capabilities: capabilities.snapshot(),
        };
        tracing::info!(
            started = report.started().count(),
            failed = report.failed().count(),
            "Boot orchestration complete"
        );
        report
    }

    async fn launch_unit(
        &self,
        entry: &Arc<ServiceEntry>,
        capabilities: &CapabilitySet,
        budget: Duration,
        policy: ProvidesPolicy,
    ) -> LaunchOutcome {
        let definition = entry.definition();
        let name = definition.name.clone();

        let wait = capabilities.wait_for(&definition.needs, budget).await;
        if let WaitOutcome::GaveUp { missing } = &wait {
            tracing::warn!(
                service = %name,
                "Needs {:?} not provided after {:?}, starting anyway",
                missing,
                budget
            );
        }

        let start = match entry.state() {
            RunState::NotStarted => match self.processes.start(entry, false).await {
                Ok(outcome) => LaunchStart::Started(outcome),
                Err(Error::InvalidState { state, .. }) => LaunchStart::Skipped(state),
                Err(e) => {
                    tracing::error!(service = %name, "{}", e);
                    LaunchStart::Failed(e.to_string())
                }
            },
            state => LaunchStart::Skipped(state),
        };

        let provided = match policy {
            ProvidesPolicy::Attempted => true,
            ProvidesPolicy::Confirmed => entry.state() == RunState::Started,
        };
        if provided {
            capabilities.mark(&definition.provides);
        }

        LaunchOutcome {
            service: name,
            wait,
            start,
            provided,
        }
    }
}

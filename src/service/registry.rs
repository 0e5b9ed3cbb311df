use super::{LastAction, RunState, ServiceDefinition, ServiceRecord, ServiceStatus};
use crate::error::{Error, Result};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Synchronous mutex for record fields that are never held across await points.
type SyncMutex<T> = Mutex<T>;

/// Granted by [`ServiceEntry::begin_start`]: the run id and the definition
/// snapshot taken under the same lock hold.
#[derive(Debug, Clone)]
pub struct StartTicket {
    pub run_id: u64,
    pub definition: ServiceDefinition,
}

/// Shared handle to the one authoritative record of a service.
///
/// Every read and write goes through the entry's own lock, so two operations
/// can never interleave on the same record's state. The lock is a
/// `parking_lot` mutex and is never held across an `.await`.
#[derive(Debug)]
pub struct ServiceEntry {
    name: String,
    record: SyncMutex<ServiceRecord>,
}

impl ServiceEntry {
    fn new(definition: ServiceDefinition) -> Self {
        Self {
            name: definition.name.clone(),
            record: SyncMutex::new(ServiceRecord::new(definition)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read-only copy of the record.
    pub fn snapshot(&self) -> ServiceRecord {
        self.record.lock().clone()
    }

    pub fn definition(&self) -> ServiceDefinition {
        self.record.lock().definition.clone()
    }

    pub fn state(&self) -> RunState {
        self.record.lock().state
    }

    pub fn last_known_pid(&self) -> u32 {
        self.record.lock().last_known_pid
    }

    pub fn status(&self) -> ServiceStatus {
        self.record.lock().status()
    }

    /// Run `f` with the record locked.
    pub fn with_record<R>(&self, f: impl FnOnce(&mut ServiceRecord) -> R) -> R {
        f(&mut self.record.lock())
    }

    /// Stamp `action` with the current time.
    pub fn stamp(&self, action: LastAction) {
        self.record.lock().stamp(action);
    }

    /// Atomically check that the service may start and move it to `Starting`.
    ///
    /// Only `NotStarted` may start. With `rearm`, a service whose previous run
    /// ended (`Stopped` or `Errored`) is first moved back to `NotStarted`, under
    /// the same lock hold. On refusal nothing is modified.
    ///
    /// Returns the id of the new run along with the definition it runs.
    pub fn begin_start(&self, rearm: bool) -> Result<StartTicket> {
        let mut record = self.record.lock();
        if record.deleted {
            return Err(Error::ServiceDeleted(self.name.clone()));
        }
        if rearm && record.state.is_terminal() {
            record.transition(RunState::NotStarted);
        }
        if record.state != RunState::NotStarted {
            return Err(Error::InvalidState {
                name: self.name.clone(),
                state: record.state,
            });
        }
        record.transition(RunState::Starting);
        record.run_id += 1;
        record.last_known_pid = 0;
        record.last_message = None;
        record.stamp(LastAction::Start);
        Ok(StartTicket {
            run_id: record.run_id,
            definition: record.definition.clone(),
        })
    }

    /// `Starting` -> `Started` for run `run_id`, recording the tracked PID if any.
    ///
    /// Returns false when the run was superseded or stopped in the meantime.
    pub fn mark_started(&self, run_id: u64, pid: Option<u32>) -> bool {
        let mut record = self.record.lock();
        if record.run_id != run_id || record.state != RunState::Starting {
            return false;
        }
        record.transition(RunState::Started);
        record.last_known_pid = pid.unwrap_or(0);
        record.stamp(LastAction::Start);
        true
    }

    /// Run `run_id` failed to launch.
    pub fn mark_errored(&self, run_id: u64, message: String) -> bool {
        let mut record = self.record.lock();
        if record.run_id != run_id || record.state.is_terminal() {
            return false;
        }
        record.transition(RunState::Errored);
        record.last_known_pid = 0;
        record.last_message = Some(message);
        record.stamp(LastAction::Start);
        true
    }

    /// The tracked process of run `run_id` exited.
    ///
    /// A running record moves to `Stopped` with `LastAction = Stop`; a record
    /// that a stop operation already moved to a terminal state keeps its state
    /// and last action. Either way the PID is cleared.
    pub fn mark_exited(&self, run_id: u64, message: Option<String>) -> bool {
        let mut record = self.record.lock();
        if record.run_id != run_id {
            return false;
        }
        if record.state.is_running() {
            record.transition(RunState::Stopped);
            record.stamp(LastAction::Stop);
        }
        record.last_known_pid = 0;
        if message.is_some() {
            record.last_message = message;
        }
        true
    }

    /// Result of a stop operation begun while run `run_id` was current.
    ///
    /// Returns false, changing nothing, when a newer run started while the
    /// stop was in progress.
    pub fn mark_stopped(&self, run_id: u64, outcome: std::result::Result<(), String>) -> bool {
        let mut record = self.record.lock();
        if record.run_id != run_id {
            return false;
        }
        match outcome {
            Ok(()) => {
                record.transition(RunState::Stopped);
            }
            Err(message) => {
                record.transition(RunState::Errored);
                record.last_message = Some(message);
            }
        }
        true
    }

    fn redefine(&self, definition: ServiceDefinition, preserve_state: bool) {
        let mut record = self.record.lock();
        // A running record keeps its state and PID: resetting it would orphan
        // the process.
        if preserve_state || record.state.is_running() {
            if !preserve_state {
                tracing::warn!(
                    service = %self.name,
                    state = ?record.state,
                    "Keeping run state of a running service across reset"
                );
            }
            record.definition = definition;
            record.deleted = false;
        } else {
            let run_id = record.run_id;
            *record = ServiceRecord::new(definition);
            record.run_id = run_id;
        }
    }

    fn mark_deleted(&self) {
        self.record.lock().deleted = true;
    }
}

/// Counts of what a [`Registry::merge`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub deleted: Vec<String>,
}

/// Number of services in each run state. Deleted services are counted in
/// their last state and again in `deleted`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounts {
    pub not_started: usize,
    pub starting: usize,
    pub started: usize,
    pub stopped: usize,
    pub errored: usize,
    pub deleted: usize,
}

impl StateCounts {
    pub fn total(&self) -> usize {
        self.not_started + self.starting + self.started + self.stopped + self.errored
    }

    fn count(&mut self, record: &ServiceRecord) {
        let slot = match record.state {
            RunState::NotStarted => &mut self.not_started,
            RunState::Starting => &mut self.starting,
            RunState::Started => &mut self.started,
            RunState::Stopped => &mut self.stopped,
            RunState::Errored => &mut self.errored,
        };
        *slot += 1;
        if record.deleted {
            self.deleted += 1;
        }
    }
}

/// Process-wide mapping from service name to its live record, plus the
/// capability → providers index.
///
/// Entries are never removed: a service whose definition disappears is only
/// flagged as deleted so its last known state can still be reported.
#[derive(Debug, Default)]
pub struct Registry {
    services: RwLock<BTreeMap<String, Arc<ServiceEntry>>>,
    /// `providers[tag] = [a, b]` means services a and b provide `tag`
    providers: RwLock<BTreeMap<String, Vec<String>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from freshly loaded definitions, all `NotStarted`.
    pub fn from_definitions(definitions: Vec<ServiceDefinition>) -> Self {
        let registry = Self::new();
        registry.merge(definitions, false);
        registry
    }

    /// Replace the known definitions with `definitions`.
    ///
    /// Existing services keep their run state and last action when
    /// `preserve_state` is set, otherwise they are reset to `NotStarted`.
    /// Services absent from `definitions` are flagged deleted.
    pub fn merge(&self, definitions: Vec<ServiceDefinition>, preserve_state: bool) -> MergeSummary {
        let mut summary = MergeSummary::default();
        let mut services = self.services.write();
        let mut seen = std::collections::HashSet::new();

        for definition in definitions {
            let name = definition.name.clone();
            if !seen.insert(name.clone()) {
                tracing::warn!(service = %name, "Duplicate service definition, keeping the first one");
                continue;
            }
            match services.get(&name) {
                Some(entry) => {
                    entry.redefine(definition, preserve_state);
                    summary.updated.push(name);
                }
                None => {
                    services.insert(name.clone(), Arc::new(ServiceEntry::new(definition)));
                    summary.added.push(name);
                }
            }
        }

        for (name, entry) in services.iter() {
            if !seen.contains(name) && !entry.snapshot().deleted {
                entry.mark_deleted();
                summary.deleted.push(name.clone());
            }
        }

        let mut providers: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for entry in services.values() {
            let record = entry.snapshot();
            if record.deleted {
                continue;
            }
            for tag in &record.definition.provides {
                providers
                    .entry(tag.clone())
                    .or_default()
                    .push(record.definition.name.clone());
            }
        }
        *self.providers.write() = providers;

        summary
    }

    pub fn get(&self, name: &str) -> Result<Arc<ServiceEntry>> {
        self.services
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ServiceNotFound(name.to_string()))
    }

    /// All entries, ordered by name.
    pub fn entries(&self) -> Vec<Arc<ServiceEntry>> {
        self.services.read().values().cloned().collect()
    }

    /// Entries flagged for unattended start at boot.
    pub fn autostart_entries(&self) -> Vec<Arc<ServiceEntry>> {
        self.entries()
            .into_iter()
            .filter(|entry| {
                let record = entry.snapshot();
                record.definition.auto_start && !record.deleted
            })
            .collect()
    }

    /// Names of the services providing capability `tag`.
    pub fn providers_of(&self, tag: &str) -> Vec<String> {
        self.providers.read().get(tag).cloned().unwrap_or_default()
    }

    /// The capability → providers index.
    pub fn capability_index(&self) -> BTreeMap<String, Vec<String>> {
        self.providers.read().clone()
    }

    pub fn statuses(&self) -> Vec<ServiceStatus> {
        self.entries().iter().map(|entry| entry.status()).collect()
    }

    pub fn state_counts(&self) -> StateCounts {
        let mut counts = StateCounts::default();
        for entry in self.entries() {
            entry.with_record(|record| counts.count(record));
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.services.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.read().is_empty()
    }
}

//! Liveness Prober: is the process behind a service running right now?
//!
//! Strategies, first match wins:
//!
//! 1. `PIDFile`: a missing file means not alive; otherwise the PID it holds is
//!    looked up in the process table.
//! 2. `CheckAlive`: the command's exit code decides.
//! 3. Simple services: the recorded run state is used as a proxy.
//! 4. Anything else is indeterminate and reported as an error.

mod command;
mod pid_file;

pub use command::check_alive;
pub use pid_file::read_pid_file;

use crate::error::{Error, Result};
use crate::service::{RunState, ServiceKind, ServiceRecord};
use crate::supervisor::ProcessOps;
use std::sync::Arc;

/// Outcome of a successful probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Liveness {
    pub alive: bool,
    /// PID the decision was based on, when one is known
    pub pid: Option<u32>,
}

impl Liveness {
    pub fn dead() -> Self {
        Self::default()
    }
}

#[derive(Clone)]
pub struct Prober {
    ops: Arc<dyn ProcessOps>,
}

impl std::fmt::Debug for Prober {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prober").finish_non_exhaustive()
    }
}

impl Prober {
    pub fn new(ops: Arc<dyn ProcessOps>) -> Self {
        Self { ops }
    }

    /// Probe the service described by `record`.
    ///
    /// An `Err` means liveness could not be established; it is never a
    /// stand-in for "not alive".
    pub async fn probe(&self, record: &ServiceRecord) -> Result<Liveness> {
        let definition = &record.definition;

        if let Some(path) = &definition.pid_file {
            let Some(pid) = read_pid_file(path)? else {
                return Ok(Liveness::dead());
            };
            let alive = self.ops.exists(pid);
            tracing::trace!(service = %definition.name, pid, alive, "Probed PID file");
            return Ok(Liveness {
                alive,
                pid: Some(pid),
            });
        }

        if let Some(command) = &definition.check_alive {
            let alive = check_alive(self.ops.as_ref(), &definition.name, command).await?;
            return Ok(Liveness { alive, pid: None });
        }

        if definition.kind == ServiceKind::Simple {
            let pid = (record.last_known_pid != 0).then_some(record.last_known_pid);
            return Ok(Liveness {
                alive: record.state == RunState::Started,
                pid,
            });
        }

        Err(Error::LivenessIndeterminate(definition.name.clone()))
    }
}

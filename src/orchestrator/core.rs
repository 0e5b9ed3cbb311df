use crate::config::{DaemonConfig, ServiceLoader};
use crate::liveness::Prober;
use crate::service::{Registry, StateCounts};
use crate::supervisor::ProcessSupervisor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// The daemon's supervision context.
///
/// Owns the [`Registry`] for the whole life of the daemon together with the
/// components that act on it:
/// - [`ProcessSupervisor`] starts and stops processes
/// - [`Prober`] answers "is this service alive?"
/// - the optional [`ServiceLoader`] is re-run on `reload`
///
/// It is built once at boot and shared as `Arc<Supervisor>` between the
/// launcher units and the control server. All methods take `&self`; the only
/// mutable state lives in the registry entries, each behind its own lock.
///
/// # Example
///
/// ```no_run
/// use warden::{DaemonConfig, Supervisor};
///
/// # async fn example() -> Result<(), warden::Error> {
/// let supervisor = Supervisor::builder()
///     .config(DaemonConfig::default())
///     .load_services(true)
///     .build()?;
/// let report = supervisor.launch_all().await;
/// println!("{} services started", report.started().count());
/// # Ok(())
/// # }
/// ```
pub struct Supervisor {
    pub(super) registry: Arc<Registry>,
    pub(super) processes: ProcessSupervisor,
    pub(super) prober: Prober,
    pub(super) config: DaemonConfig,
    pub(super) loader: Option<ServiceLoader>,
    /// Cancelled when the daemon should exit
    shutdown: CancellationToken,
    started_at: DateTime<Utc>,
}

/// Daemon-wide figures reported by the `Stats` control call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonStats {
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
    pub services: StateCounts,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("services", &self.registry.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    /// Create a builder for constructing a `Supervisor`.
    pub fn builder() -> super::SupervisorBuilder {
        super::SupervisorBuilder::new()
    }

    pub(super) fn from_parts(
        registry: Arc<Registry>,
        processes: ProcessSupervisor,
        prober: Prober,
        config: DaemonConfig,
        loader: Option<ServiceLoader>,
    ) -> Self {
        Self {
            registry,
            processes,
            prober,
            config,
            loader,
            shutdown: CancellationToken::new(),
            started_at: Utc::now(),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn processes(&self) -> &ProcessSupervisor {
        &self.processes
    }

    pub fn prober(&self) -> &Prober {
        &self.prober
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    pub fn loader(&self) -> Option<&ServiceLoader> {
        self.loader.as_ref()
    }

    /// Token cancelled by [`Supervisor::request_shutdown`].
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Ask the daemon's run loop to exit.
    pub fn request_shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn stats(&self) -> DaemonStats {
        let uptime = Utc::now().signed_duration_since(self.started_at);
        DaemonStats {
            pid: std::process::id(),
            started_at: self.started_at,
            uptime_secs: uptime.num_seconds().max(0) as u64,
            services: self.registry.state_counts(),
        }
    }
}

//! # Warden
//!
//! A minimal init and service supervisor.
//!
//! Services are declared in `.service` files. At boot every auto-start
//! service is launched as soon as the capabilities it needs have been
//! provided by other services; a separate client talks to the running daemon
//! over a Unix socket to inspect and control services.
//!
//! ## Components
//!
//! - [`service::Registry`]: one authoritative record per service
//! - [`liveness::Prober`]: is a service's process running?
//! - [`supervisor::ProcessSupervisor`]: starting and stopping processes
//! - [`Supervisor`]: the daemon context, with the boot launcher
//!   ([`Supervisor::launch_all`]) and control operations
//!   ([`Supervisor::check_and_start`], [`Supervisor::check_and_stop`], ...)
//! - [`ipc`]: the control protocol server and client
//!
//! ## Quick Start
//!
//! ```no_run
//! use warden::{DaemonConfig, Supervisor};
//!
//! # async fn example() -> Result<(), warden::Error> {
//! let config = DaemonConfig::load("/etc/warden/warden.yaml".as_ref())?;
//! let supervisor = Supervisor::builder()
//!     .config(config)
//!     .load_services(true)
//!     .build()?;
//!
//! let report = supervisor.launch_all().await;
//! for outcome in report.failed() {
//!     eprintln!("{} failed to start", outcome.service);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency Model
//!
//! - Each service record sits behind its own lock; start guards check and
//!   transition the run state under one lock hold
//! - Boot runs one task per auto-start service, plus one watcher task per
//!   running simple service
//! - Dependency waits are woken when a capability is marked, bounded by the
//!   configured wait budget

pub mod config;
pub mod error;
pub mod host;
pub mod ipc;
pub mod liveness;
pub mod orchestrator;
pub mod service;
pub mod supervisor;

// Re-export commonly used types
pub use config::{DaemonConfig, ProvidesPolicy, ServiceLoader};
pub use error::{Error, Result};
pub use orchestrator::{BootReport, ServiceAction, ServiceActionAnswer, Supervisor};
pub use service::{LastAction, Registry, RunState, ServiceDefinition, ServiceKind};

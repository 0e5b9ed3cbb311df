//! The supervision context and everything that drives it: boot orchestration
//! (`launcher`) and the control operations behind the control socket
//! (`control`).

mod builder;
mod control;
mod core;
mod launcher;

pub use builder::SupervisorBuilder;
pub use control::{ReloadSummary, ServiceAction, ServiceActionAnswer};
pub use core::*;
pub use launcher::{BootReport, CapabilitySet, LaunchOutcome, LaunchStart, WaitOutcome};

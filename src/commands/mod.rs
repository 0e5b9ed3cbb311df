mod action;
mod daemon;
mod host;
mod stats;
mod status;
mod version;

pub use action::run_service_action;
pub use daemon::run_daemon;
pub use host::run_host_action;
pub use stats::run_stats;
pub use status::run_status;
pub use version::run_version;

//! Configuration.
//!
//! - `daemon` - daemon settings (`DaemonConfig`, `warden.yaml`)
//! - `definition` - `.service` definition files and the directory loader
//! - `duration` - duration strings
//! - `validation` - name and capability tag rules

mod daemon;
mod definition;
mod duration;
mod validation;

pub use daemon::*;
pub use definition::*;
pub use duration::*;
pub use validation::*;

//! Service data model and the service registry.
//!
//! - [`ServiceDefinition`]: what a `.service` file declares
//! - [`ServiceRecord`]: definition plus run state, last action and tracked PID
//! - [`Registry`]: the single source of truth, one [`ServiceEntry`] per name

mod registry;
mod types;

pub use registry::*;
pub use types::*;

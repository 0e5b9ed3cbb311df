//! Process supervision.
//!
//! [`ProcessOps`] is the seam to the operating system; [`ProcessSupervisor`]
//! implements the two start modes and the stop path on top of it.

mod ops;
mod process;

pub use ops::{Launched, NativeProcessOps, ProcessOps};
pub use process::{classify_completion, is_reap_race, Completion, ProcessSupervisor, StartOutcome};

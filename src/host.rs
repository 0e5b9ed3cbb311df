//! Host-level actions forwarded by the control server.

use crate::error::{Error, Result};

/// Reboot, power off or re-execute the daemon.
///
/// On success `reboot` and `power_off` do not return on a real host; the
/// trait returns `Result<()>` so fakes can record the call.
pub trait HostControl: Send + Sync + 'static {
    fn reboot(&self) -> Result<()>;
    fn power_off(&self) -> Result<()>;
    /// Replace the daemon with a fresh copy of its own binary.
    fn reexec(&self) -> Result<()>;
}

/// [`HostControl`] acting on the machine the daemon runs on.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeHost;

impl NativeHost {
    #[cfg(target_os = "linux")]
    fn restart_system(mode: nix::sys::reboot::RebootMode) -> Result<()> {
        nix::unistd::sync();
        match nix::sys::reboot::reboot(mode) {
            Ok(never) => match never {},
            Err(errno) => Err(Error::Host(format!("reboot(2) failed: {}", errno.desc()))),
        }
    }
}

impl HostControl for NativeHost {
    #[cfg(target_os = "linux")]
    fn reboot(&self) -> Result<()> {
        tracing::warn!("Rebooting");
        Self::restart_system(nix::sys::reboot::RebootMode::RB_AUTOBOOT)
    }

    #[cfg(target_os = "linux")]
    fn power_off(&self) -> Result<()> {
        tracing::warn!("Powering off");
        Self::restart_system(nix::sys::reboot::RebootMode::RB_POWER_OFF)
    }

    #[cfg(not(target_os = "linux"))]
    fn reboot(&self) -> Result<()> {
        Err(Error::Host("reboot is only supported on Linux".to_string()))
    }

    #[cfg(not(target_os = "linux"))]
    fn power_off(&self) -> Result<()> {
        Err(Error::Host("power off is only supported on Linux".to_string()))
    }

    fn reexec(&self) -> Result<()> {
        use std::os::unix::process::CommandExt;

        let exe = std::env::current_exe()
            .map_err(|e| Error::Host(format!("cannot locate own binary: {}", e)))?;
        tracing::warn!("Re-executing {}", exe.display());
        // exec only returns on failure
        let err = std::process::Command::new(&exe)
            .args(std::env::args_os().skip(1))
            .exec();
        Err(Error::Host(format!("exec {} failed: {}", exe.display(), err)))
    }
}

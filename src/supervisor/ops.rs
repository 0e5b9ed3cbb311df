use crate::error::{probe_target, signal_target, Error, Result};
use async_trait::async_trait;
use futures::future::BoxFuture;
use nix::errno::Errno;
use nix::sys::signal::{self, killpg, Signal};
use std::io;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;

/// A process launched without waiting for it.
pub struct Launched {
    /// OS process id of the shell running the command
    pub pid: u32,
    /// Resolves once the process exits
    pub exit: BoxFuture<'static, io::Result<ExitStatus>>,
}

impl std::fmt::Debug for Launched {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Launched").field("pid", &self.pid).finish()
    }
}

/// Everything the supervisor needs from the operating system.
///
/// Commands are shell command lines run through `sh -c`. The trait exists so
/// the supervision logic can be driven without real processes in tests.
#[async_trait]
pub trait ProcessOps: Send + Sync + 'static {
    /// Run a command to completion. With `own_group` the shell is put in a new
    /// process group so a later shutdown can target the whole group.
    async fn run(&self, command: &str, own_group: bool) -> io::Result<ExitStatus>;

    /// Launch a command in a new process group and return without waiting.
    fn launch(&self, command: &str) -> io::Result<Launched>;

    /// Signal the process group led by `pid`, falling back to the process itself.
    fn signal(&self, pid: u32, signal: Signal) -> Result<()>;

    /// Whether a process with this PID exists, whatever it is.
    fn exists(&self, pid: u32) -> bool;
}

/// [`ProcessOps`] backed by `tokio::process` and `nix`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeProcessOps;

impl NativeProcessOps {
    fn shell(command: &str) -> Command {
        let mut cmd = Command::new("sh");
        // The command comes from a root-owned service definition, which is
        // the trust boundary, so it is handed to the shell verbatim.
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(false);
        cmd
    }
}

#[async_trait]
impl ProcessOps for NativeProcessOps {
    async fn run(&self, command: &str, own_group: bool) -> io::Result<ExitStatus> {
        let mut cmd = Self::shell(command);
        if own_group {
            cmd.process_group(0);
        }
        cmd.status().await
    }

    fn launch(&self, command: &str) -> io::Result<Launched> {
        let mut child = Self::shell(command).process_group(0).spawn()?;
        let pid = child.id().ok_or_else(|| {
            io::Error::new(io::ErrorKind::Other, "process exited before its PID was read")
        })?;
        Ok(Launched {
            pid,
            exit: Box::pin(async move { child.wait().await }),
        })
    }

    fn signal(&self, pid: u32, sig: Signal) -> Result<()> {
        let nix_pid = signal_target(pid)?;
        killpg(nix_pid, sig)
            .or_else(|_| signal::kill(nix_pid, sig))
            .map_err(|errno| Error::Signal {
                pid,
                reason: errno.desc().to_string(),
            })
    }

    fn exists(&self, pid: u32) -> bool {
        let Some(nix_pid) = probe_target(pid) else {
            return false;
        };
        match signal::kill(nix_pid, None) {
            Ok(()) => true,
            // The process exists but belongs to someone we may not signal
            Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_reports_exit_status() {
        let ops = NativeProcessOps;
        assert!(ops.run("true", true).await.unwrap().success());
        let status = ops.run("exit 3", false).await.unwrap();
        assert_eq!(status.code(), Some(3));
    }

    #[tokio::test]
    async fn launch_tracks_pid_until_exit() {
        let ops = NativeProcessOps;
        let launched = ops.launch("sleep 0.2").unwrap();
        assert!(launched.pid > 1);
        assert!(ops.exists(launched.pid));
        let status = launched.exit.await.unwrap();
        assert!(status.success());
    }

    #[test]
    fn own_process_exists() {
        assert!(NativeProcessOps.exists(std::process::id()));
        assert!(!NativeProcessOps.exists(0));
    }

    #[test]
    fn signal_refuses_init() {
        let err = NativeProcessOps.signal(1, Signal::SIGTERM).unwrap_err();
        assert!(matches!(err, Error::InvalidPid { pid: 1, .. }));
    }
}

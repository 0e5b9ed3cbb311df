//! Test doubles shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use nix::sys::signal::Signal;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, Notify};
use warden::host::HostControl;
use warden::supervisor::{Launched, ProcessOps};

/// What a scripted command does.
#[derive(Debug, Clone)]
pub enum Script {
    Exit(i32),
    /// Running the command fails with an `io::Error` carrying this message
    Fail(String),
    /// The command exits 0 once the gate is notified
    Gate(Arc<Notify>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Run(String),
    Launch(String),
    Signal(u32, Signal),
}

/// [`ProcessOps`] that records every call and never touches real processes.
///
/// Commands exit 0 unless scripted otherwise. Launched processes stay alive
/// until they are signalled or [`RecordingOps::exit`] is called.
pub struct RecordingOps {
    calls: Mutex<Vec<Call>>,
    scripts: Mutex<HashMap<String, Script>>,
    alive: Mutex<HashSet<u32>>,
    running: Mutex<HashMap<u32, oneshot::Sender<io::Result<ExitStatus>>>>,
    next_pid: AtomicU32,
}

impl RecordingOps {
    pub fn new() -> Arc<Self> {
        Self::with_first_pid(1000)
    }

    pub fn with_first_pid(pid: u32) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            scripts: Mutex::new(HashMap::new()),
            alive: Mutex::new(HashSet::new()),
            running: Mutex::new(HashMap::new()),
            next_pid: AtomicU32::new(pid),
        })
    }

    pub fn script(&self, command: &str, script: Script) {
        self.scripts.lock().insert(command.to_string(), script);
    }

    /// Pretend an unrelated process with this PID exists.
    pub fn set_alive(&self, pid: u32) {
        self.alive.lock().insert(pid);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn launches(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Launch(_)))
            .count()
    }

    pub fn signals(&self) -> Vec<(u32, Signal)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Signal(pid, signal) => Some((pid, signal)),
                _ => None,
            })
            .collect()
    }

    /// Make launched process `pid` exit with `code`.
    pub fn exit(&self, pid: u32, code: i32) {
        self.finish(pid, ExitStatus::from_raw(code << 8));
    }

    fn finish(&self, pid: u32, status: ExitStatus) {
        self.alive.lock().remove(&pid);
        if let Some(tx) = self.running.lock().remove(&pid) {
            let _ = tx.send(Ok(status));
        }
    }

    fn scripted(&self, command: &str) -> Option<Script> {
        self.scripts.lock().get(command).cloned()
    }
}

#[async_trait]
impl ProcessOps for RecordingOps {
    async fn run(&self, command: &str, _own_group: bool) -> io::Result<ExitStatus> {
        self.calls.lock().push(Call::Run(command.to_string()));
        match self.scripted(command) {
            Some(Script::Fail(message)) => Err(io::Error::new(io::ErrorKind::Other, message)),
            Some(Script::Exit(code)) => Ok(ExitStatus::from_raw(code << 8)),
            Some(Script::Gate(gate)) => {
                gate.notified().await;
                Ok(ExitStatus::from_raw(0))
            }
            None => Ok(ExitStatus::from_raw(0)),
        }
    }

    fn launch(&self, command: &str) -> io::Result<Launched> {
        self.calls.lock().push(Call::Launch(command.to_string()));
        if let Some(Script::Fail(message)) = self.scripted(command) {
            return Err(io::Error::new(io::ErrorKind::NotFound, message));
        }

        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.alive.lock().insert(pid);
        self.running.lock().insert(pid, tx);
        Ok(Launched {
            pid,
            exit: Box::pin(async move {
                rx.await.unwrap_or_else(|_| Ok(ExitStatus::from_raw(0)))
            }),
        })
    }

    fn signal(&self, pid: u32, signal: Signal) -> warden::Result<()> {
        self.calls.lock().push(Call::Signal(pid, signal));
        // Terminated by a signal: the raw wait status is the signal number
        self.finish(pid, ExitStatus::from_raw(signal as i32));
        Ok(())
    }

    fn exists(&self, pid: u32) -> bool {
        self.alive.lock().contains(&pid)
    }
}

/// [`HostControl`] that only records what it was asked to do.
#[derive(Default)]
pub struct RecordingHost {
    pub actions: Mutex<Vec<&'static str>>,
}

impl HostControl for RecordingHost {
    fn reboot(&self) -> warden::Result<()> {
        self.actions.lock().push("reboot");
        Ok(())
    }

    fn power_off(&self) -> warden::Result<()> {
        self.actions.lock().push("power_off");
        Ok(())
    }

    fn reexec(&self) -> warden::Result<()> {
        self.actions.lock().push("reexec");
        Ok(())
    }
}

/// Poll `condition` every 10ms for up to 2s.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    condition()
}

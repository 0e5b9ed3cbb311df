use super::protocol::{decode_line, encode_line, Request, Response, VersionInfo};
use crate::config::is_valid_identifier;
use crate::error::{Error, Result};
use crate::host::HostControl;
use crate::orchestrator::Supervisor;
use std::os::unix::fs::{FileTypeExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;

/// Serves the control protocol for a [`Supervisor`].
#[derive(Clone)]
pub struct ControlServer {
    supervisor: Arc<Supervisor>,
    host: Arc<dyn HostControl>,
    socket_path: PathBuf,
}

impl ControlServer {
    pub fn new(
        supervisor: Arc<Supervisor>,
        host: Arc<dyn HostControl>,
        socket_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            supervisor,
            host,
            socket_path: socket_path.into(),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Bind the control socket, replacing a stale socket file left by a
    /// previous run. Only the owner may connect.
    pub fn bind(&self) -> Result<UnixListener> {
        let path = &self.socket_path;
        if let Ok(metadata) = std::fs::symlink_metadata(path) {
            if !metadata.file_type().is_socket() {
                return Err(Error::Config(format!(
                    "{} exists and is not a socket",
                    path.display()
                )));
            }
            tracing::debug!("Removing stale socket {}", path.display());
            std::fs::remove_file(path)?;
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(path)?;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        tracing::info!("Listening on {}", path.display());
        Ok(listener)
    }

    /// Accept connections until `shutdown` is cancelled, then remove the
    /// socket file.
    pub async fn serve(&self, listener: UnixListener, shutdown: CancellationToken) -> Result<()> {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!("Control server shutting down");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let server = self.clone();
                        tokio::spawn(async move {
                            if let Err(e) = server.handle_connection(stream).await {
                                tracing::warn!("Control connection failed: {}", e);
                            }
                        });
                    }
                    Err(e) => tracing::warn!("Failed to accept control connection: {}", e),
                },
            }
        }

        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            tracing::warn!("Failed to remove {}: {}", self.socket_path.display(), e);
        }
        Ok(())
    }

    async fn handle_connection(&self, stream: UnixStream) -> Result<()> {
        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let response = match decode_line::<Request>(&line) {
                Ok(request) => self.dispatch(request).await,
                Err(e) => Response::Error(e.to_string()),
            };
            write.write_all(encode_line(&response)?.as_bytes()).await?;
        }
        Ok(())
    }

    /// Answer one request.
    pub async fn dispatch(&self, request: Request) -> Response {
        tracing::debug!(?request, "Control request");
        match request {
            Request::Status => Response::Status(self.supervisor.registry().statuses()),
            Request::Version => Response::Version(VersionInfo::current()),
            Request::Stats => Response::Stats(self.supervisor.stats()),
            Request::ServiceAction { name, action } => {
                if !is_valid_identifier(&name) {
                    return Response::Error(format!(
                        "invalid service name '{}', only a-Z0-9_-. allowed",
                        name
                    ));
                }
                Response::ServiceAction(self.supervisor.service_action(&name, action).await)
            }
            Request::Reboot => {
                self.spawn_host_action(HostAction::Reboot);
                Response::Accepted("Rebooting".to_string())
            }
            Request::Shutdown => {
                self.spawn_host_action(HostAction::PowerOff);
                Response::Accepted("Shutting down".to_string())
            }
            Request::Reexec => {
                self.spawn_host_action(HostAction::Reexec);
                Response::Accepted("Re-executing".to_string())
            }
        }
    }

    fn spawn_host_action(&self, action: HostAction) {
        let supervisor = Arc::clone(&self.supervisor);
        let host = Arc::clone(&self.host);
        tokio::spawn(async move {
            let result = match action {
                HostAction::Reboot => {
                    supervisor.stop_all().await;
                    host.reboot()
                }
                HostAction::PowerOff => {
                    supervisor.stop_all().await;
                    let result = host.power_off();
                    // Not running as init: exit the daemon instead
                    supervisor.request_shutdown();
                    result
                }
                HostAction::Reexec => host.reexec(),
            };
            if let Err(e) = result {
                tracing::error!("{:?} failed: {}", action, e);
            }
        });
    }
}

#[derive(Debug, Clone, Copy)]
enum HostAction {
    Reboot,
    PowerOff,
    Reexec,
}

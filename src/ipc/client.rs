use super::protocol::{decode_line, encode_line, Request, Response, VersionInfo};
use crate::error::{Error, Result};
use crate::orchestrator::{DaemonStats, ServiceAction, ServiceActionAnswer};
use crate::service::ServiceStatus;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

/// Talks to a running daemon over its control socket.
#[derive(Debug, Clone)]
pub struct ControlClient {
    socket_path: PathBuf,
}

impl ControlClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Send one request and wait for its response.
    pub async fn call(&self, request: &Request) -> Result<Response> {
        let stream = UnixStream::connect(&self.socket_path).await.map_err(|e| {
            Error::Protocol(format!(
                "cannot connect to {}: {}",
                self.socket_path.display(),
                e
            ))
        })?;
        let (read, mut write) = stream.into_split();
        write.write_all(encode_line(request)?.as_bytes()).await?;
        write.flush().await?;

        let mut lines = BufReader::new(read).lines();
        let line = lines.next_line().await?.ok_or_else(|| {
            Error::Protocol("the daemon closed the connection without answering".to_string())
        })?;
        match decode_line(&line)? {
            Response::Error(message) => Err(Error::Protocol(message)),
            response => Ok(response),
        }
    }

    pub async fn status(&self) -> Result<Vec<ServiceStatus>> {
        match self.call(&Request::Status).await? {
            Response::Status(statuses) => Ok(statuses),
            other => Err(unexpected(other)),
        }
    }

    pub async fn version(&self) -> Result<VersionInfo> {
        match self.call(&Request::Version).await? {
            Response::Version(info) => Ok(info),
            other => Err(unexpected(other)),
        }
    }

    pub async fn stats(&self) -> Result<DaemonStats> {
        match self.call(&Request::Stats).await? {
            Response::Stats(stats) => Ok(stats),
            other => Err(unexpected(other)),
        }
    }

    pub async fn service_action(&self, name: &str, action: ServiceAction) -> Result<ServiceActionAnswer> {
        let request = Request::ServiceAction {
            name: name.to_string(),
            action,
        };
        match self.call(&request).await? {
            Response::ServiceAction(answer) => Ok(answer),
            other => Err(unexpected(other)),
        }
    }

    /// Send `Reboot`, `Shutdown` or `Reexec`.
    pub async fn host_action(&self, request: Request) -> Result<String> {
        match self.call(&request).await? {
            Response::Accepted(message) => Ok(message),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(response: Response) -> Error {
    Error::Protocol(format!("unexpected response: {:?}", response))
}

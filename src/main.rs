mod cli;
mod commands;
mod output;

use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};
use warden::ipc::{ControlClient, Request};
use warden::{DaemonConfig, Error as WardenError, ServiceAction};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        if let Some(warden_error) = e.downcast_ref::<WardenError>() {
            eprintln!("Error: {}", warden_error);
            if let Some(suggestion) = warden_error.suggestion() {
                eprintln!("\nHint: {}", suggestion);
            }
        } else {
            eprintln!("Error: {:#}", e);
        }
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let out = output::CliOutput;

    if let Commands::Daemon { services_dir } = &cli.command {
        let mut config = DaemonConfig::load(&cli.config)?;
        if let Some(dir) = services_dir {
            config.services_dir = dir.clone();
        }
        if let Some(socket) = &cli.socket {
            config.socket_path = socket.clone();
        }
        init_tracing(config.log_file.as_deref())?;
        return commands::run_daemon(config, &out).await;
    }

    init_tracing(None)?;
    let client = ControlClient::new(client_socket(&cli));

    match cli.command {
        Commands::Daemon { .. } => Ok(()),
        Commands::Status { json } => commands::run_status(&client, json, &out).await,
        Commands::Stats { json } => commands::run_stats(&client, json, &out).await,
        Commands::Version => commands::run_version(&client, &out).await,
        Commands::Start { name } => {
            commands::run_service_action(&client, &name, ServiceAction::Start, &out).await
        }
        Commands::Stop { name } => {
            commands::run_service_action(&client, &name, ServiceAction::Stop, &out).await
        }
        Commands::Restart { name } => {
            commands::run_service_action(&client, &name, ServiceAction::Restart, &out).await
        }
        Commands::Reload { name } => {
            commands::run_service_action(&client, &name, ServiceAction::Reload, &out).await
        }
        Commands::Kill { name } => {
            commands::run_service_action(&client, &name, ServiceAction::ForceKill, &out).await
        }
        Commands::Reboot => commands::run_host_action(&client, Request::Reboot, &out).await,
        Commands::Shutdown => commands::run_host_action(&client, Request::Shutdown, &out).await,
        Commands::Reexec => commands::run_host_action(&client, Request::Reexec, &out).await,
    }
}

/// Socket the client connects to: `--socket`, else the config file's, else
/// the default. An unreadable config file is not fatal for the client.
fn client_socket(cli: &Cli) -> PathBuf {
    if let Some(socket) = &cli.socket {
        return socket.clone();
    }
    match DaemonConfig::load(&cli.config) {
        Ok(config) => config.socket_path,
        Err(e) => {
            tracing::debug!("Ignoring daemon config: {}", e);
            DaemonConfig::default().socket_path
        }
    }
}

/// Initialize tracing. The daemon may log to a file; everything else logs to
/// stderr. `RUST_LOG` overrides the default `info` level.
fn init_tracing(log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    if let Some(path) = log_file {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_writer(std::io::stderr)
            .init();
    }

    Ok(())
}

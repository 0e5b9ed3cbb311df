use crate::output::UserOutput;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use warden::config::format_duration;
use warden::host::NativeHost;
use warden::ipc::{ControlServer, VersionInfo};
use warden::orchestrator::LaunchStart;
use warden::{DaemonConfig, Supervisor};

pub async fn run_daemon(config: DaemonConfig, out: &dyn UserOutput) -> anyhow::Result<()> {
    tracing::info!(
        services_dir = %config.services_dir.display(),
        dependency_wait = %format_duration(config.dependency_wait_budget()),
        provides_policy = ?config.provides_policy,
        "Starting {}",
        VersionInfo::current()
    );

    let supervisor = Supervisor::builder()
        .config(config.clone())
        .load_services(true)
        .build()?;

    let server = ControlServer::new(
        Arc::clone(&supervisor),
        Arc::new(NativeHost),
        &config.socket_path,
    );
    let listener = server.bind()?;

    let signal_supervisor = Arc::clone(&supervisor);
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(()) => tracing::info!("Received termination signal"),
            Err(e) => tracing::error!("Cannot listen for signals: {}", e),
        }
        signal_supervisor.request_shutdown();
    });

    let boot_supervisor = Arc::clone(&supervisor);
    let boot = tokio::spawn(async move {
        let report = boot_supervisor.launch_all().await;
        for outcome in &report.outcomes {
            if let LaunchStart::Failed(message) = &outcome.start {
                tracing::error!(service = %outcome.service, "Boot start failed: {}", message);
            }
        }
        for outcome in report.gave_up() {
            tracing::warn!(service = %outcome.service, "Started without all of its needs");
        }
    });

    server.serve(listener, supervisor.shutdown_token()).await?;

    boot.abort();
    out.status("Stopping services...");
    supervisor.stop_all().await;
    out.success("warden stopped");
    Ok(())
}

async fn wait_for_signal() -> std::io::Result<()> {
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

use crate::output::UserOutput;
use warden::ipc::ControlClient;
use warden::service::ServiceStatus;
use warden::RunState;

pub async fn run_status(client: &ControlClient, json: bool, out: &dyn UserOutput) -> anyhow::Result<()> {
    let statuses = client.status().await?;

    if json {
        out.status(&serde_json::to_string_pretty(&statuses)?);
        return Ok(());
    }

    out.status("Service Status:");
    out.status(&format!("{:-<78}", ""));
    if statuses.is_empty() {
        out.status("  No services loaded");
        return Ok(());
    }
    for status in &statuses {
        out.status(&format_status_line(status));
        if let Some(message) = &status.last_message {
            out.status(&format!("      {}", message));
        }
    }
    Ok(())
}

fn format_status_line(status: &ServiceStatus) -> String {
    let icon = match status.state {
        RunState::Started => "+",
        RunState::Starting => ".",
        RunState::NotStarted | RunState::Stopped => "o",
        RunState::Errored => "x",
    };
    let pid = match status.pid {
        0 => String::new(),
        pid => format!("pid {}", pid),
    };
    let deleted = if status.deleted { " (deleted)" } else { "" };
    format!(
        "  {} {:<20} {:<16} {:<10} {} {}{}",
        icon,
        status.name,
        status.state.to_string(),
        status.last_action.to_string(),
        status.last_action_at.format("%Y-%m-%d %H:%M:%S"),
        pid,
        deleted
    )
}

use crate::output::UserOutput;
use warden::ipc::ControlClient;

pub async fn run_stats(client: &ControlClient, json: bool, out: &dyn UserOutput) -> anyhow::Result<()> {
    let stats = client.stats().await?;

    if json {
        out.status(&serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let counts = &stats.services;
    out.status(&format!("Daemon PID:   {}", stats.pid));
    out.status(&format!(
        "Running since {} ({})",
        stats.started_at.format("%Y-%m-%d %H:%M:%S"),
        format_uptime(stats.uptime_secs)
    ));
    out.status(&format!("Services:     {}", counts.total()));
    out.status(&format!("  started     {}", counts.started));
    out.status(&format!("  starting    {}", counts.starting));
    out.status(&format!("  not started {}", counts.not_started));
    out.status(&format!("  stopped     {}", counts.stopped));
    out.status(&format!("  errored     {}", counts.errored));
    if counts.deleted > 0 {
        out.status(&format!("  deleted     {}", counts.deleted));
    }
    Ok(())
}

fn format_uptime(secs: u64) -> String {
    let (days, rest) = (secs / 86_400, secs % 86_400);
    let (hours, rest) = (rest / 3600, rest % 3600);
    let (minutes, seconds) = (rest / 60, rest % 60);
    if days > 0 {
        format!("up {}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("up {}h {}m", hours, minutes)
    } else {
        format!("up {}m {}s", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uptime_uses_the_two_largest_units() {
        assert_eq!(format_uptime(42), "up 0m 42s");
        assert_eq!(format_uptime(3725), "up 1h 2m");
        assert_eq!(format_uptime(90_061), "up 1d 1h 1m");
    }
}

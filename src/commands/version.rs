use crate::output::UserOutput;
use warden::ipc::{ControlClient, VersionInfo};

pub async fn run_version(client: &ControlClient, out: &dyn UserOutput) -> anyhow::Result<()> {
    out.status(&format!("client: {}", VersionInfo::current()));
    match client.version().await {
        Ok(info) => out.status(&format!("daemon: {}", info)),
        Err(e) => out.warning(&format!("daemon: unavailable ({})", e)),
    }
    Ok(())
}

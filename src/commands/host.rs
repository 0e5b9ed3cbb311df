use crate::output::UserOutput;
use warden::ipc::{ControlClient, Request};

pub async fn run_host_action(
    client: &ControlClient,
    request: Request,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let message = client.host_action(request).await?;
    out.success(&message);
    Ok(())
}

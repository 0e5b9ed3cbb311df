use crate::output::UserOutput;
use warden::ipc::ControlClient;
use warden::ServiceAction;

pub async fn run_service_action(
    client: &ControlClient,
    name: &str,
    action: ServiceAction,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let answer = client.service_action(name, action).await?;
    if !answer.success {
        anyhow::bail!("{} {}: {}", action, name, answer.message);
    }
    out.success(&answer.message);
    Ok(())
}

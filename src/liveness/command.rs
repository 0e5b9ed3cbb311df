use crate::error::{Error, Result};
use crate::supervisor::ProcessOps;

/// Run a CheckAlive command: exit code 0 means alive, any other exit code
/// means not alive. Failing to run the command is an error.
pub async fn check_alive(ops: &dyn ProcessOps, service: &str, command: &str) -> Result<bool> {
    match ops.run(command, false).await {
        Ok(status) => Ok(status.success()),
        Err(e) => Err(Error::CheckAlive(service.to_string(), e.to_string())),
    }
}

//! Child process execution.

use crate::bundler::error::{Error, Result};
use std::process::Output;
use tokio::process::Command;

/// Runs `command` to completion and fails on a non-zero exit.
///
/// `name` is what errors call the command.
pub async fn run(command: &mut Command, name: &str) -> Result<Output> {
    log::debug!("Running {:?}", command.as_std());
    let output = command
        .output()
        .await
        .map_err(|error| Error::CommandFailed {
            command: name.to_string(),
            error,
        })?;
    if !output.status.success() {
        return Err(Error::CommandStatus {
            command: name.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output)
}

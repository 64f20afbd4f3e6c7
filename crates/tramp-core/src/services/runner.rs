use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::launch::Invocation;
use crate::error::{Result, TrampolineError};

fn command(invocation: &Invocation) -> Command {
    let mut cmd = Command::new(&invocation.program);
    cmd.args(&invocation.args);
    for (key, value) in &invocation.envs {
        cmd.env(key, value);
    }
    cmd
}

/// Spawn a launch command, logging whatever it prints.
///
/// Output is captured on background tasks; a failure to read it is logged
/// and otherwise ignored.
pub fn spawn(invocation: &Invocation, label: &str) -> Result<Child> {
    let mut cmd = command(invocation);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|e| {
        TrampolineError::ScriptExecution(format!("failed to spawn {}: {e}", invocation.program))
    })?;
    info!(label, pid = child.id(), "launch command started");

    if let Some(stdout) = child.stdout.take() {
        capture(stdout, label.to_string());
    }
    if let Some(stderr) = child.stderr.take() {
        capture(stderr, label.to_string());
    }

    Ok(child)
}

fn capture<R>(stream: R, label: String)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => info!(label = %label, "{line}"),
                Ok(None) => break,
                Err(e) => {
                    warn!(label = %label, "failed reading launch output: {e}");
                    break;
                }
            }
        }
    });
}

/// Fire a stop command without waiting for the target to exit.
pub fn dispatch(invocation: &Invocation) -> Result<()> {
    let mut child = command(invocation)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| {
            TrampolineError::Shutdown(format!("failed to run {}: {e}", invocation.program))
        })?;
    let program = invocation.program.clone();
    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) => debug!(program = %program, %status, "stop command finished"),
            Err(e) => warn!(program = %program, "stop command wait failed: {e}"),
        }
    });
    Ok(())
}

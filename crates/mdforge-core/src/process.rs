//! Child-process supervision for engines wrapping external tools.
//!
//! Engines spawn their backend with piped stderr and hand the child to
//! [`supervise`], which polls completion against the job's cancellation
//! handle and deadline, killing the process when either fires.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;

use crate::engine::{ConvertCtx, EngineError};

/// How often an in-flight child is polled for completion.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Outcome of a supervised child process.
#[derive(Debug)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stderr: String,
}

impl ToolOutput {
    /// Turn a non-zero exit into `EngineError::Failed` carrying stderr.
    pub fn require_success(self, tool: &str) -> Result<(), EngineError> {
        if self.status.success() {
            return Ok(());
        }
        let detail = if self.stderr.trim().is_empty() {
            format!("{} exited with {}", tool, self.status)
        } else {
            format!("{}: {}", tool, self.stderr.trim())
        };
        Err(EngineError::Failed(detail))
    }
}

/// Spawn a command and supervise it to completion.
///
/// A spawn failure is reported as `Unavailable` (the dependency vanished
/// since the registry probe). Cancellation and deadline expiry kill the
/// child and surface as `Cancelled` / `Timeout`.
pub fn run_tool(mut cmd: Command, ctx: &ConvertCtx) -> Result<ToolOutput, EngineError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    tracing::debug!("running {:?}", cmd);

    let child = cmd.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            EngineError::Unavailable
        } else {
            EngineError::Io(e)
        }
    })?;

    supervise(child, ctx)
}

/// Poll a spawned child until it exits, the job is cancelled, or the
/// deadline passes.
pub fn supervise(mut child: Child, ctx: &ConvertCtx) -> Result<ToolOutput, EngineError> {
    // Drain stderr on its own thread: a child filling the pipe buffer
    // would otherwise block on its write and never exit.
    let drain = child.stderr.take().map(|mut pipe| {
        std::thread::spawn(move || {
            let mut captured = String::new();
            let _ = pipe.read_to_string(&mut captured);
            captured
        })
    });

    loop {
        if let Err(stop) = ctx.checkpoint() {
            let _ = child.kill();
            let _ = child.wait();
            // The reader thread finishes once the pipe closes.
            return Err(stop);
        }

        match child.try_wait()? {
            Some(status) => {
                let stderr = drain.and_then(|h| h.join().ok()).unwrap_or_default();
                return Ok(ToolOutput { status, stderr });
            }
            None => std::thread::sleep(POLL_INTERVAL),
        }
    }
}

/// Probe a tool by running it and checking for a clean exit.
///
/// Used by availability probes, e.g. `pandoc --version`. Returns the
/// captured stdout on success.
pub fn probe_tool(tool: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(tool)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).to_string())
}

//! Subprocess runner shared by the collectors

use crate::error::{CollectError, Result};
use std::io;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, trace};

/// Run `program args...` in `cwd` and return its stdout.
///
/// The child is killed if the returned future is dropped, so an abandoned
/// fetch never leaves a process behind.
pub async fn run_command(program: &str, args: &[&str], cwd: &Path) -> Result<String> {
    let command = describe(program, args);
    trace!(command = %command, cwd = %cwd.display(), "spawning");

    let output = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| match source.kind() {
            io::ErrorKind::NotFound if cwd.is_dir() => CollectError::ToolMissing {
                program: program.to_string(),
            },
            _ => CollectError::Spawn {
                command: command.clone(),
                source: source.into(),
            },
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        debug!(command = %command, code = ?output.status.code(), "command failed");
        return Err(CollectError::CommandFailed {
            command,
            code: output.status.code(),
            stderr,
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Human-readable command line for errors and logs
pub(crate) fn describe(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

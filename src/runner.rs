use std::io::Write;
use std::time::Duration;

use tracing::warn;

use crate::error::DeployResult;
use crate::output;
use crate::remote::Remote;

/// Timeout for a remote command when the caller has no better
/// estimate.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Run a command on the remote host and print what it produced.
///
/// Writes `>>> {command}`, then the sanitized tail of stdout (see
/// [`output::render`]). When the command exits non-zero its stderr
/// is printed as well.
///
/// The exit status is returned, never turned into an error: a
/// failing command only fails the run if the caller decides so.
/// Errors are reserved for the transport, including running past
/// `timeout`.
pub fn run_command<R, W>(
    remote: &mut R,
    command: &str,
    timeout: Duration,
    out: &mut W,
) -> DeployResult<i32>
where
    R: Remote + ?Sized,
    W: Write + ?Sized,
{
    writeln!(out, "\n>>> {command}")?;

    let result = remote.exec(command, timeout)?;

    if let Some(display) = output::render(&result.stdout) {
        if let Err(e) = writeln!(out, "{display}") {
            warn!(command, error = %e, "could not display command output");
        }
    }

    if !result.success() {
        warn!(
            command,
            exit_status = result.exit_status,
            "remote command exited non-zero"
        );
        if let Some(stderr) = output::render_stderr(&result.stderr) {
            let _ = writeln!(out, "Error: {}", stderr.trim_end());
        }
    }

    Ok(result.exit_status)
}

use std::time::Duration;

use crate::error::DeployResult;

/// Everything a finished remote command left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_status: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_status == 0
    }
}

/// A host that can run shell commands.
///
/// [`SshSession`](crate::ssh::SshSession) is the real
/// implementation; anything else is a test double.
pub trait Remote {
    /// Run `command`, wait for it to exit and capture its output.
    ///
    /// Must fail with
    /// [`DeployError::Timeout`](crate::error::DeployError::Timeout)
    /// if the command is still running after `timeout`. A non-zero
    /// exit status is not an error.
    fn exec(&mut self, command: &str, timeout: Duration) -> DeployResult<CommandOutput>;

    /// Release the connection. Further `exec` calls may fail.
    fn close(&mut self) {}
}

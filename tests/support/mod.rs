//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::time::Duration;

use provisio::{CommandOutput, DeployResult, Remote};

type Responder = Box<dyn FnMut(&str) -> DeployResult<CommandOutput>>;

/// A [`Remote`] that records every command and answers from a
/// closure.
pub struct ScriptedRemote {
    pub calls: Vec<(String, Duration)>,
    pub closes: usize,
    responder: Responder,
}

impl ScriptedRemote {
    pub fn new(responder: impl FnMut(&str) -> DeployResult<CommandOutput> + 'static) -> Self {
        Self {
            calls: Vec::new(),
            closes: 0,
            responder: Box::new(responder),
        }
    }

    /// Every command succeeds with no output.
    pub fn succeeding() -> Self {
        Self::new(|_| Ok(CommandOutput::default()))
    }

    /// Every command exits with `status` and prints `stderr`.
    pub fn failing(status: i32, stderr: &'static str) -> Self {
        Self::new(move |_| Ok(exited(status, "", stderr)))
    }

    pub fn commands(&self) -> Vec<&str> {
        self.calls.iter().map(|(cmd, _)| cmd.as_str()).collect()
    }
}

impl Remote for ScriptedRemote {
    fn exec(&mut self, command: &str, timeout: Duration) -> DeployResult<CommandOutput> {
        self.calls.push((command.to_string(), timeout));
        (self.responder)(command)
    }

    fn close(&mut self) {
        self.closes += 1;
    }
}

pub fn exited(status: i32, stdout: &str, stderr: &str) -> CommandOutput {
    CommandOutput {
        exit_status: status,
        stdout: stdout.as_bytes().to_vec(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

pub fn printed(out: &[u8]) -> String {
    String::from_utf8(out.to_vec()).expect("test output is UTF-8")
}

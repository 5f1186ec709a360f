use std::io::Write;

use tracing::debug;

use crate::error::{DeployError, DeployResult};
use crate::plan::{Plan, Step, Target};
use crate::remote::Remote;
use crate::runner::run_command;

const RULE: &str = "==================================================";

/// Provisioning pipeline: every phase of a [`Plan`], in order,
/// followed by one health check.
///
/// By default a command that exits non-zero is reported and the
/// run moves on to the next one. [`fail_fast`](Self::fail_fast)
/// turns the first such exit into an error instead.
pub struct Pipeline {
    target: Target,
    plan: Plan,
    fail_fast: bool,
}

/// A command that exited non-zero during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedStep {
    pub command: String,
    pub status: i32,
}

/// What a completed run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Commands sent to the host, health check included.
    pub dispatched: usize,
    pub failed: Vec<FailedStep>,
}

impl RunSummary {
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

impl Pipeline {
    #[must_use]
    pub fn new(target: Target) -> Self {
        let plan = Plan::for_target(&target);
        Self {
            target,
            plan,
            fail_fast: false,
        }
    }

    #[must_use]
    pub const fn fail_fast(mut self, enabled: bool) -> Self {
        self.fail_fast = enabled;
        self
    }

    #[must_use]
    pub const fn target(&self) -> &Target {
        &self.target
    }

    #[must_use]
    pub const fn plan(&self) -> &Plan {
        &self.plan
    }

    /// Dispatch every step through the runner, printing progress
    /// to `out`.
    ///
    /// # Errors
    ///
    /// Transport failures and timeouts abort the run immediately.
    /// With fail-fast enabled, so does the first non-zero exit.
    pub fn run<R, W>(&self, remote: &mut R, out: &mut W) -> DeployResult<RunSummary>
    where
        R: Remote + ?Sized,
        W: Write + ?Sized,
    {
        let mut summary = RunSummary::default();
        let total = self.plan.phases.len();

        for (index, phase) in self.plan.phases.iter().enumerate() {
            writeln!(out, "\n[{}/{total}] {}...", index + 1, phase.title)?;
            for step in &phase.steps {
                self.dispatch(remote, step, out, &mut summary)?;
            }
        }

        writeln!(out, "\n[Checking status...]")?;
        self.dispatch(remote, &self.plan.health_check, out, &mut summary)?;

        debug!(
            dispatched = summary.dispatched,
            failed = summary.failed.len(),
            "provisioning sequence finished"
        );
        Ok(summary)
    }

    /// [`run`](Self::run), then close `remote` whether the run
    /// completed or not.
    pub fn run_and_close<R, W>(&self, remote: &mut R, out: &mut W) -> DeployResult<RunSummary>
    where
        R: Remote + ?Sized,
        W: Write + ?Sized,
    {
        let result = self.run(remote, out);
        remote.close();
        result
    }

    fn dispatch<R, W>(
        &self,
        remote: &mut R,
        step: &Step,
        out: &mut W,
        summary: &mut RunSummary,
    ) -> DeployResult<()>
    where
        R: Remote + ?Sized,
        W: Write + ?Sized,
    {
        let status = run_command(remote, &step.command, step.timeout(), out)?;
        summary.dispatched += 1;

        if status != 0 {
            if self.fail_fast {
                return Err(DeployError::StepFailed {
                    command: step.command.clone(),
                    status,
                });
            }
            summary.failed.push(FailedStep {
                command: step.command.clone(),
                status,
            });
        }
        Ok(())
    }

    /// Print the plan without touching any host.
    pub fn write_plan<W: Write + ?Sized>(&self, out: &mut W, json: bool) -> DeployResult<()> {
        if json {
            serde_json::to_writer_pretty(&mut *out, &self.plan)?;
            writeln!(out)?;
            return Ok(());
        }

        writeln!(out, "=== Dry run: no changes will be made ===")?;
        let total = self.plan.phases.len();
        for (index, phase) in self.plan.phases.iter().enumerate() {
            writeln!(out, "\n[{}/{total}] {}", index + 1, phase.title)?;
            for step in &phase.steps {
                write_step(out, step)?;
            }
        }
        writeln!(out, "\n[Checking status...]")?;
        write_step(out, &self.plan.health_check)?;
        Ok(())
    }
}

fn write_step<W: Write + ?Sized>(out: &mut W, step: &Step) -> DeployResult<()> {
    writeln!(out, "  $ {}  (timeout {}s)", step.command, step.timeout_secs)?;
    Ok(())
}

/// Title block printed before connecting.
pub fn write_banner<W: Write + ?Sized>(out: &mut W, target: &Target) -> DeployResult<()> {
    writeln!(out, "{RULE}")?;
    writeln!(out, "{} - Remote Server Setup", target.app_name)?;
    writeln!(out, "{RULE}")?;
    Ok(())
}

/// Closing block printed after a completed run.
///
/// Steps that exited non-zero are listed, but the run still
/// counts as complete.
pub fn write_report<W: Write + ?Sized>(
    out: &mut W,
    host: &str,
    summary: &RunSummary,
) -> DeployResult<()> {
    writeln!(out, "\n{RULE}")?;
    writeln!(out, "SETUP COMPLETE!")?;
    writeln!(out, "{RULE}")?;
    writeln!(out, "\nYour application is running at: http://{host}")?;

    if !summary.all_succeeded() {
        writeln!(
            out,
            "\n{} of {} commands exited non-zero:",
            summary.failed.len(),
            summary.dispatched
        )?;
        for failed in &summary.failed {
            writeln!(out, "  [exit {}] {}", failed.status, failed.command)?;
        }
    }

    writeln!(out, "{RULE}")?;
    Ok(())
}

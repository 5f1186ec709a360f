use std::ffi::OsString;
use std::io::{self, Write};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use clap::error::ErrorKind;

use crate::pipeline::{self, Pipeline};
use crate::plan::Target;
use crate::ssh::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_PORT, SshSession};

const USAGE: &str = "\
Usage: provisio <HOST> <USER> <PASSWORD> <REPO_URL> [OPTIONS]
Example: provisio 203.0.113.10 root mypassword https://github.com/user/repo.git";

#[derive(Debug, Parser)]
#[command(name = "provisio", version)]
#[command(about = "Provision a server over SSH and deploy a Node.js web application")]
pub struct Cli {
    /// Hostname or IP address of the server
    #[arg(allow_hyphen_values = true)]
    pub host: String,

    /// SSH user
    #[arg(allow_hyphen_values = true)]
    pub user: String,

    /// SSH password
    #[arg(allow_hyphen_values = true)]
    pub password: String,

    /// Git URL of the application repository
    pub repo_url: String,

    /// Extra positional arguments, accepted and ignored
    #[arg(hide = true)]
    pub ignored: Vec<String>,

    /// SSH port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Seconds to wait for the SSH connection
    #[arg(long, value_name = "SECONDS", default_value_t = DEFAULT_CONNECT_TIMEOUT.as_secs())]
    pub connect_timeout: u64,

    /// Directory holding the app, projects and data on the server
    #[arg(long)]
    pub base_dir: Option<String>,

    /// PM2 process and Nginx site name
    #[arg(long)]
    pub app_name: Option<String>,

    /// Node.js major version to install
    #[arg(long)]
    pub node_major: Option<u32>,

    /// npm package to install globally
    #[arg(long)]
    pub global_package: Option<String>,

    /// Local port answering the health check
    #[arg(long)]
    pub health_port: Option<u16>,

    /// Path requested by the health check
    #[arg(long)]
    pub health_path: Option<String>,

    /// Stop at the first command that exits non-zero
    #[arg(long)]
    pub fail_fast: bool,

    /// Print the commands without connecting
    #[arg(long)]
    pub dry_run: bool,

    /// With --dry-run, print the plan as JSON
    #[arg(long, requires = "dry_run")]
    pub json: bool,
}

impl Cli {
    /// Deployment target with any overrides from the command
    /// line applied.
    #[must_use]
    pub fn target(&self) -> Target {
        let mut target = Target::new(&self.repo_url);
        if let Some(dir) = &self.base_dir {
            target = target.base_dir(dir);
        }
        if let Some(name) = &self.app_name {
            target = target.app_name(name);
        }
        if let Some(major) = self.node_major {
            target = target.node_major(major);
        }
        if let Some(package) = &self.global_package {
            target = target.global_package(package);
        }
        if let Some(port) = self.health_port {
            target = target.health_port(port);
        }
        if let Some(path) = &self.health_path {
            target = target.health_path(path);
        }
        target
    }
}

/// Parse `args`, provision the host and map the outcome to an
/// exit code.
///
/// Exit code 1 covers bad arguments, connection failures and any
/// error that aborts the sequence. Commands that merely exit
/// non-zero do not change the exit code unless `--fail-fast` is
/// given.
pub fn run<I, T>(args: I) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => return usage_error(&err),
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match execute(&cli, &mut out) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let _ = writeln!(out, "\nError: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn usage_error(err: &clap::Error) -> ExitCode {
    let _ = err.print();
    if matches!(
        err.kind(),
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
    ) {
        return ExitCode::SUCCESS;
    }
    println!("{USAGE}");
    ExitCode::FAILURE
}

fn execute<W: Write>(cli: &Cli, out: &mut W) -> anyhow::Result<()> {
    let pipeline = Pipeline::new(cli.target()).fail_fast(cli.fail_fast);

    if cli.dry_run {
        pipeline.write_plan(out, cli.json)?;
        return Ok(());
    }

    pipeline::write_banner(out, pipeline.target())?;
    writeln!(out, "\nConnecting to {}...", cli.host)?;

    let mut session = SshSession::connect(
        &cli.host,
        cli.port,
        &cli.user,
        &cli.password,
        Duration::from_secs(cli.connect_timeout),
    )?;
    writeln!(out, "Connected successfully!")?;

    let summary = pipeline
        .run_and_close(&mut session, out)
        .context("provisioning aborted")?;

    pipeline::write_report(out, &cli.host, &summary)?;
    Ok(())
}

//! Provision a single server over SSH and deploy a web
//! application onto it.
//!
//! `provisio` logs into a fresh host with a password, installs
//! system packages, Node.js, a build toolchain, Git, PM2 and
//! Nginx, clones an application repository, builds it and starts
//! it behind Nginx. A final health check requests the app on its
//! local port.
//!
//! # Overview
//!
//! - A [`Remote`] runs one shell command and captures its exit
//!   status, stdout and stderr. [`SshSession`] is the real one.
//! - [`run_command`](runner::run_command) sends a command through
//!   a [`Remote`] and prints a sanitized, truncated view of its
//!   output (see [`output`]).
//! - A [`Plan`] is the fixed, ordered list of commands for a
//!   [`Target`]; a [`Pipeline`] runs it.
//!
//! # Failure model
//!
//! A command that exits non-zero is reported and the pipeline
//! moves on; nothing is retried or rolled back. Transport errors
//! and timeouts stop the run. Connection failures happen before
//! any command is sent.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use provisio::{Pipeline, SshSession, Target};
//!
//! fn main() -> anyhow::Result<()> {
//!     let target = Target::new("https://github.com/acme/hub.git")
//!         .app_name("hub")
//!         .health_port(8080);
//!
//!     let mut session = SshSession::connect(
//!         "203.0.113.10",
//!         22,
//!         "root",
//!         "secret",
//!         Duration::from_secs(30),
//!     )?;
//!
//!     let pipeline = Pipeline::new(target);
//!     let summary = pipeline.run(&mut session, &mut std::io::stdout())?;
//!     session.close();
//!
//!     println!("{} commands failed", summary.failed.len());
//!     Ok(())
//! }
//! ```

// Allow noisy pedantic lints that don't add value for a
// deployment tool crate.
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

pub mod cli;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod plan;
pub mod remote;
pub mod runner;
pub mod ssh;

pub use error::{DeployError, DeployResult};
pub use pipeline::{Pipeline, RunSummary};
pub use plan::{Plan, Step, Target};
pub use remote::{CommandOutput, Remote};
pub use runner::run_command;
pub use ssh::SshSession;

use std::io::{self, Read};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use ssh2::{DisconnectCode, ErrorCode, Session};
use tracing::debug;

use crate::error::{DeployError, DeployResult};
use crate::remote::{CommandOutput, Remote};

pub const DEFAULT_PORT: u16 = 22;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

// libssh2 error codes
const SSH_ERROR_TIMEOUT: i32 = -9;
const SSH_ERROR_PASSWORD_EXPIRED: i32 = -15;
const SSH_ERROR_AUTHENTICATION_FAILED: i32 = -18;

/// Password-authenticated SSH session to a single host.
///
/// Host keys are accepted without verification. The connection
/// is released by [`close`](Self::close) or, failing that, when
/// the session is dropped.
pub struct SshSession {
    host: String,
    session: Option<Session>,
}

impl SshSession {
    /// Open a TCP connection, perform the SSH handshake and
    /// authenticate with a password.
    pub fn connect(
        host: &str,
        port: u16,
        user: &str,
        password: &str,
        timeout: Duration,
    ) -> DeployResult<Self> {
        let tcp = open_tcp(host, port, timeout)?;

        let mut session = Session::new()?;
        session.set_tcp_stream(tcp);
        session.set_timeout(clamp_millis(timeout));
        session
            .handshake()
            .map_err(|e| DeployError::ConnectFailed {
                host: host.to_string(),
                reason: e.message().to_string(),
            })?;

        session
            .userauth_password(user, password)
            .map_err(|e| auth_error(e, host, user))?;
        if !session.authenticated() {
            return Err(DeployError::AuthFailed {
                user: user.to_string(),
                host: host.to_string(),
            });
        }

        debug!(host, port, user, "SSH session established");
        Ok(Self {
            host: host.to_string(),
            session: Some(session),
        })
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Disconnect from the host. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) =
                session.disconnect(Some(DisconnectCode::ByApplication), "provisioning done", None)
            {
                debug!(host = %self.host, error = %e, "disconnect failed");
            }
            debug!(host = %self.host, "SSH session closed");
        }
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl Remote for SshSession {
    fn close(&mut self) {
        Self::close(self);
    }

    fn exec(&mut self, command: &str, timeout: Duration) -> DeployResult<CommandOutput> {
        let session = self.session.as_ref().ok_or(DeployError::SessionClosed)?;
        let deadline = Deadline::after(timeout);

        let timed_out = || DeployError::Timeout {
            command: command.to_string(),
            seconds: timeout.as_secs(),
        };
        let from_ssh = |e: ssh2::Error| {
            if matches!(e.code(), ErrorCode::Session(SSH_ERROR_TIMEOUT)) {
                timed_out()
            } else {
                DeployError::Ssh(e)
            }
        };
        let from_io = |e: io::Error| {
            if e.kind() == io::ErrorKind::TimedOut {
                timed_out()
            } else {
                DeployError::Io(e)
            }
        };

        debug!(command, timeout_secs = timeout.as_secs(), "dispatching remote command");

        session.set_timeout(deadline.remaining_millis().ok_or_else(timed_out)?);
        let mut channel = session.channel_session().map_err(from_ssh)?;
        channel.exec(command).map_err(from_ssh)?;

        let stdout = read_until(session, &mut channel, &deadline).map_err(from_io)?;
        let stderr = {
            let mut stream = channel.stderr();
            read_until(session, &mut stream, &deadline).map_err(from_io)?
        };

        session.set_timeout(deadline.remaining_millis().ok_or_else(timed_out)?);
        channel.wait_close().map_err(from_ssh)?;
        let exit_status = channel.exit_status().map_err(from_ssh)?;

        debug!(command, exit_status, "remote command finished");
        Ok(CommandOutput {
            exit_status,
            stdout,
            stderr,
        })
    }
}

/// Only a rejected or expired password is an authentication
/// failure. A timeout is a connection failure, and any other
/// libssh2 error is passed through.
fn auth_error(err: ssh2::Error, host: &str, user: &str) -> DeployError {
    debug!(error = %err, "password authentication failed");
    match err.code() {
        ErrorCode::Session(SSH_ERROR_AUTHENTICATION_FAILED | SSH_ERROR_PASSWORD_EXPIRED) => {
            DeployError::AuthFailed {
                user: user.to_string(),
                host: host.to_string(),
            }
        }
        ErrorCode::Session(SSH_ERROR_TIMEOUT) => DeployError::ConnectFailed {
            host: host.to_string(),
            reason: format!("authentication timed out: {}", err.message()),
        },
        _ => DeployError::Ssh(err),
    }
}

/// Wall-clock limit shared by every blocking call of one command.
struct Deadline(Instant);

impl Deadline {
    fn after(timeout: Duration) -> Self {
        Self(Instant::now() + timeout)
    }

    /// Milliseconds left, or `None` once the deadline has passed.
    /// Never returns zero, which libssh2 reads as "no timeout".
    fn remaining_millis(&self) -> Option<u32> {
        let left = self.0.checked_duration_since(Instant::now())?;
        if left.is_zero() {
            return None;
        }
        Some(clamp_millis(left).max(1))
    }
}

fn clamp_millis(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}

/// Read `reader` to EOF, re-arming the session timeout before
/// every read so the whole transfer respects `deadline`.
fn read_until<R: Read>(
    session: &Session,
    reader: &mut R,
    deadline: &Deadline,
) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let Some(millis) = deadline.remaining_millis() else {
            return Err(io::ErrorKind::TimedOut.into());
        };
        session.set_timeout(millis);
        match reader.read(&mut chunk) {
            Ok(0) => return Ok(buf),
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
}

fn open_tcp(host: &str, port: u16, timeout: Duration) -> DeployResult<TcpStream> {
    let connect_failed = |reason: String| DeployError::ConnectFailed {
        host: host.to_string(),
        reason,
    };

    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|e| connect_failed(e.to_string()))?;

    let mut last_error = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!(%addr, error = %e, "TCP connect failed");
                last_error = Some(e);
            }
        }
    }

    Err(connect_failed(last_error.map_or_else(
        || "no addresses resolved".to_string(),
        |e| e.to_string(),
    )))
}

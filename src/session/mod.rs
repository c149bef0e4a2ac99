//! Device sessions and the connection abstraction.
//!
//! [`DeviceSession`] is the capability set a session offers the batch
//! runner: connect, execute, close. [`Connection`] is the closed set of
//! implementations, selected by the configured [`ConnectionMethod`]; the
//! telnet variant is a reserved stub.

mod prompt;
mod shell;

pub use shell::{SessionState, SshSession};

use std::future::Future;

use log::debug;

use crate::config::{ConnectionMethod, HostConfig};
use crate::error::{Error, ExecError, Result};

/// Capability set of an interactive device session.
///
/// A session is owned exclusively by the task that created it and must be
/// closed on every exit path, including after a failed `connect`.
pub trait DeviceSession: Send {
    /// Establish the session and bring the remote shell to a ready prompt.
    fn connect(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Run one command and return its cleaned output. Only valid once
    /// `connect` has succeeded; the session stays ready afterwards.
    fn execute(&mut self, command: &str) -> impl Future<Output = Result<String>> + Send;

    /// Release the channel and transport. Safe to call repeatedly.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// A device session of any supported connection method.
pub enum Connection {
    /// Interactive shell over SSH.
    Ssh(SshSession),
    /// Reserved; fails on connect.
    Telnet(TelnetSession),
}

impl Connection {
    /// Build the session variant for the configured method.
    pub fn from_config(config: HostConfig) -> Self {
        match config.method {
            ConnectionMethod::Ssh => Self::Ssh(SshSession::new(config)),
            ConnectionMethod::Telnet => Self::Telnet(TelnetSession::new(config)),
        }
    }
}

impl DeviceSession for Connection {
    async fn connect(&mut self) -> Result<()> {
        match self {
            Self::Ssh(session) => session.connect().await,
            Self::Telnet(session) => session.connect().await,
        }
    }

    async fn execute(&mut self, command: &str) -> Result<String> {
        match self {
            Self::Ssh(session) => session.execute(command).await,
            Self::Telnet(session) => session.execute(command).await,
        }
    }

    async fn close(&mut self) {
        match self {
            Self::Ssh(session) => session.close().await,
            Self::Telnet(session) => session.close().await,
        }
    }
}

/// Placeholder session for the telnet method.
///
/// The variant exists so the method stays selectable; connecting fails
/// with [`Error::UnsupportedMethod`].
pub struct TelnetSession {
    config: HostConfig,
}

impl TelnetSession {
    /// Create the stub session.
    pub fn new(config: HostConfig) -> Self {
        Self { config }
    }
}

impl DeviceSession for TelnetSession {
    async fn connect(&mut self) -> Result<()> {
        debug!("telnet session for {} refused", self.config.host);
        Err(Error::UnsupportedMethod {
            method: ConnectionMethod::Telnet.to_string(),
        })
    }

    async fn execute(&mut self, _command: &str) -> Result<String> {
        Err(ExecError::NotConnected.into())
    }

    async fn close(&mut self) {}
}

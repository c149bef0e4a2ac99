//! Error types for netrun.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Main error type for netrun operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Credential resolution errors
    #[error("credential error: {0}")]
    Auth(#[from] AuthError),

    /// Connect-time errors
    #[error("connect error: {0}")]
    Connect(#[from] ConnectError),

    /// Execute-time errors
    #[error("command error: {0}")]
    Exec(#[from] ExecError),

    /// The selected connection method has no working implementation
    #[error("connection method '{method}' is not supported")]
    UnsupportedMethod { method: String },

    /// Propagated opaquely from the per-host configuration collaborator
    #[error("config merge failed: {0}")]
    ConfigMerge(String),

    /// No target hosts were given
    #[error("at least one host is required")]
    NoHosts,

    /// No commands were given
    #[error("at least one command is required")]
    NoCommands,
}

/// Credential resolution errors.
#[derive(Error, Debug)]
pub enum AuthError {
    /// A configured private key could not be parsed. The key may be
    /// encrypted with a different passphrase, or not encrypted at all;
    /// the two cases are not distinguishable here.
    #[error("failed to load private key {path}: {source}")]
    Setup {
        path: PathBuf,
        #[source]
        source: russh::keys::Error,
    },

    /// No password, no configured key, and no usable conventional key
    #[error("no authentication method available (password or key)")]
    NoCredentials,
}

/// Connect-time errors (dial, handshake, channel, shell, initial prompt).
#[derive(Error, Debug)]
pub enum ConnectError {
    /// TCP dial or SSH handshake failure
    #[error("connection to {host}:{port} failed: {source}")]
    Dial {
        host: String,
        port: u16,
        #[source]
        source: russh::Error,
    },

    /// Dial did not complete within the configured timeout
    #[error("connection timed out after {0:?}")]
    Timeout(Duration),

    /// Every offered authentication proof was rejected
    #[error("authentication failed for user '{user}'")]
    Auth { user: String },

    /// Failed to open the command channel
    #[error("failed to open command channel: {0}")]
    Session(#[source] russh::Error),

    /// Failed to request a PTY or start the remote shell
    #[error("failed to start remote shell: {0}")]
    ShellStart(#[source] russh::Error),

    /// The device produced no recognizable prompt in time
    #[error("no prompt received within {0:?}")]
    PromptTimeout(Duration),

    /// The channel closed while waiting for the initial prompt
    #[error("channel closed while waiting for a prompt")]
    Closed,
}

/// Execute-time errors.
#[derive(Error, Debug)]
pub enum ExecError {
    /// The session is not in the ready state - call connect() first
    #[error("not connected")]
    NotConnected,

    /// The command produced no prompt within the per-command timeout
    #[error("command {command:?} produced no prompt within {timeout:?}")]
    CommandTimeout { command: String, timeout: Duration },

    /// The channel closed mid-read
    #[error("channel closed while reading command output")]
    ChannelClosed,
}

/// Result type alias using netrun's Error.
pub type Result<T> = std::result::Result<T, Error>;

//! Per-host configuration.
//!
//! A [`HostConfig`] is the fully resolved set of connection and execution
//! parameters for one device. The batch runner clones one independent copy
//! per host before spawning that host's task; nothing here is shared across
//! tasks.

mod merge;

pub use merge::{HostOverride, OverrideSet, pattern_matches};

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::{Error, Result};

/// Default SSH port.
pub const DEFAULT_PORT: u16 = 22;

/// Default per-command (and dial, and prompt-wait) timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How a device session is established.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionMethod {
    /// Interactive shell over SSH.
    #[default]
    Ssh,

    /// Reserved variant; selecting it fails with `UnsupportedMethod`.
    Telnet,
}

impl FromStr for ConnectionMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ssh" => Ok(Self::Ssh),
            "telnet" => Ok(Self::Telnet),
            _ => Err(Error::UnsupportedMethod {
                method: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ConnectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ssh => f.write_str("ssh"),
            Self::Telnet => f.write_str("telnet"),
        }
    }
}

/// Resolved configuration for one target host.
///
/// Secrets are held as [`SecretString`] so they stay out of `Debug` output
/// and are zeroized on drop.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Target host (hostname or IP address).
    pub host: String,

    /// SSH port (default: 22).
    pub port: u16,

    /// Username for authentication.
    pub username: String,

    /// Password for authentication, if configured.
    pub password: Option<SecretString>,

    /// Secret for the device's privileged mode, if elevation is wanted.
    pub enable_secret: Option<SecretString>,

    /// Connection method (default: ssh).
    pub method: ConnectionMethod,

    /// Timeout applied to the dial, the initial prompt wait, and each
    /// command's output wait.
    pub command_timeout: Duration,

    /// Path to a private key file, if configured.
    pub key_path: Option<PathBuf>,

    /// Passphrase for the private key, if it is encrypted.
    pub key_passphrase: Option<SecretString>,

    /// Commands to execute, in order.
    pub commands: Vec<String>,

    /// Whether the batch runner fans hosts out concurrently.
    pub parallel: bool,
}

impl HostConfig {
    /// Create a configuration for the given host with defaults everywhere else.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            username: String::new(),
            password: None,
            enable_secret: None,
            method: ConnectionMethod::default(),
            command_timeout: DEFAULT_TIMEOUT,
            key_path: None,
            key_passphrase: None,
            commands: vec![],
            parallel: false,
        }
    }

    /// Set the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the username.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Set the password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(SecretString::from(password.into()));
        self
    }

    /// Set the privileged-mode secret.
    pub fn with_enable_secret(mut self, secret: impl Into<String>) -> Self {
        self.enable_secret = Some(SecretString::from(secret.into()));
        self
    }

    /// Set the connection method.
    pub fn with_method(mut self, method: ConnectionMethod) -> Self {
        self.method = method;
        self
    }

    /// Set the per-command timeout.
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Set a private key path.
    pub fn with_key(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_path = Some(path.into());
        self
    }

    /// Set a private key path with a passphrase.
    pub fn with_key_and_passphrase(
        mut self,
        path: impl Into<PathBuf>,
        passphrase: impl Into<String>,
    ) -> Self {
        self.key_path = Some(path.into());
        self.key_passphrase = Some(SecretString::from(passphrase.into()));
        self
    }

    /// Set the command list.
    pub fn with_commands<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands = commands.into_iter().map(Into::into).collect();
        self
    }

    /// Enable or disable parallel fan-out.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Get the socket address for connection.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Per-host configuration resolution, consumed by the batch runner.
///
/// The runner treats the returned value as opaque and fully resolved;
/// failures surface as that host's error and never abort sibling hosts.
/// [`OverrideSet`] is the built-in pattern-match implementation.
pub trait ConfigMerge: Send + Sync {
    /// Produce the resolved configuration for one host from the template.
    fn resolve(&self, host: &str, template: &HostConfig) -> Result<HostConfig>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_from_str() {
        assert_eq!("ssh".parse::<ConnectionMethod>().unwrap(), ConnectionMethod::Ssh);
        assert_eq!("SSH".parse::<ConnectionMethod>().unwrap(), ConnectionMethod::Ssh);
        assert_eq!(
            "Telnet".parse::<ConnectionMethod>().unwrap(),
            ConnectionMethod::Telnet
        );

        let err = "serial".parse::<ConnectionMethod>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedMethod { method } if method == "serial"));
    }

    #[test]
    fn defaults() {
        let config = HostConfig::new("router1");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.command_timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.method, ConnectionMethod::Ssh);
        assert!(!config.parallel);
        assert_eq!(config.socket_addr(), "router1:22");
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = HostConfig::new("router1")
            .with_password("hunter2")
            .with_enable_secret("even-more-secret");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("even-more-secret"));
    }
}

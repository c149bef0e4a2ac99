//! # netrun
//!
//! Async batch command runner for network devices over SSH.
//!
//! netrun opens an interactive shell per device, infers command completion
//! from the reappearing prompt (network CLIs have no structured response
//! framing), optionally enters the device's privileged mode, and fans a
//! command batch out across many hosts into one serializable result tree.
//!
//! ## Features
//!
//! - Async SSH sessions via russh
//! - Prompt-heuristic completion detection for human-oriented CLIs
//! - Best-effort paging disable and privileged-mode elevation
//! - Sequential or parallel fan-out with per-host failure containment
//! - Pattern-matched per-host configuration overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use netrun::{BatchRunner, HostConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), netrun::Error> {
//!     let template = HostConfig::new("")
//!         .with_username("admin")
//!         .with_password("secret")
//!         .with_commands(["show version", "show ip interface brief"])
//!         .with_parallel(true);
//!
//!     let report = BatchRunner::new(template, vec!["192.0.2.1".into(), "192.0.2.2".into()])
//!         .run()
//!         .await?;
//!
//!     println!("{} ok, {} failed", report.successful, report.failed);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod runner;
pub mod session;
pub mod transport;

// Re-export main types for convenience
pub use config::{ConfigMerge, ConnectionMethod, HostConfig, HostOverride, OverrideSet};
pub use error::{AuthError, ConnectError, Error, ExecError, Result};
pub use runner::{BatchRunner, CommandResult, ExecutionResult, HostResult};
pub use session::{Connection, DeviceSession, SessionState, SshSession, TelnetSession};

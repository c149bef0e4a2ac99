//! SSH transport layer wrapping russh.
//!
//! This module handles connection setup: credential resolution, dial with
//! timeout, authentication, and shell channel creation.

pub mod auth;
mod ssh;

pub use auth::{AuthProof, resolve_credentials};
pub use ssh::SshTransport;

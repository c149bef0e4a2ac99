//! Credential resolution.
//!
//! Builds the ordered list of authentication proofs offered during the SSH
//! handshake: a configured private key first, then a configured password,
//! and as a last resort the conventional key files under the user's `.ssh`
//! directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, trace};
use russh::keys::load_secret_key;
use secrecy::{ExposeSecret, SecretString};
use ssh_key::PrivateKey;

use crate::config::HostConfig;
use crate::error::AuthError;

/// Conventional key file names, probed in order when nothing is configured.
const CONVENTIONAL_KEY_FILES: [&str; 4] = ["id_rsa", "id_ed25519", "id_ecdsa", "id_dsa"];

/// A single authentication proof to offer the transport handshake.
#[derive(Clone)]
pub enum AuthProof {
    /// Public-key authentication with a parsed private key.
    PrivateKey(Arc<PrivateKey>),

    /// Password authentication.
    Password(SecretString),
}

impl std::fmt::Debug for AuthProof {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PrivateKey(key) => f
                .debug_tuple("PrivateKey")
                .field(&key.algorithm().to_string())
                .finish(),
            Self::Password(_) => f.debug_tuple("Password").finish(),
        }
    }
}

/// Resolve the ordered proof list for one host, highest priority first.
///
/// A configured key that fails to parse is an error
/// ([`AuthError::Setup`]); an unusable key found by the fallback probe is
/// skipped silently. An empty result is [`AuthError::NoCredentials`] and
/// aborts the connect attempt for this host only.
pub fn resolve_credentials(config: &HostConfig) -> Result<Vec<AuthProof>, AuthError> {
    resolve_with_key_dir(config, default_key_dir().as_deref())
}

/// The user's conventional key directory (`~/.ssh`).
fn default_key_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".ssh"))
}

/// Resolution with an explicit probe directory, so tests control the
/// filesystem the fallback sees.
pub(crate) fn resolve_with_key_dir(
    config: &HostConfig,
    key_dir: Option<&Path>,
) -> Result<Vec<AuthProof>, AuthError> {
    let mut proofs = Vec::new();

    if let Some(path) = &config.key_path {
        let passphrase = config.key_passphrase.as_ref().map(ExposeSecret::expose_secret);
        let key = load_secret_key(path, passphrase).map_err(|source| AuthError::Setup {
            path: path.clone(),
            source,
        })?;
        debug!("using configured private key {}", path.display());
        proofs.push(AuthProof::PrivateKey(Arc::new(key)));
    }

    if let Some(password) = &config.password {
        proofs.push(AuthProof::Password(password.clone()));
    }

    if proofs.is_empty()
        && let Some(dir) = key_dir
        && let Some(key) = probe_conventional_keys(dir)
    {
        proofs.push(AuthProof::PrivateKey(Arc::new(key)));
    }

    if proofs.is_empty() {
        return Err(AuthError::NoCredentials);
    }

    Ok(proofs)
}

/// Return the first conventional key that exists and parses without a
/// passphrase. Unreadable or passphrase-protected keys are skipped.
fn probe_conventional_keys(dir: &Path) -> Option<PrivateKey> {
    for name in CONVENTIONAL_KEY_FILES {
        let path = dir.join(name);
        if !path.exists() {
            continue;
        }
        match load_secret_key(&path, None) {
            Ok(key) => {
                debug!("using conventional private key {}", path.display());
                return Some(key);
            }
            Err(e) => {
                trace!("skipping {}: {e}", path.display());
            }
        }
    }
    None
}

//! SSH transport implementation using russh.

use std::sync::Arc;

use log::debug;
use russh::client::{self, Handle, Msg};
use russh::keys::{PrivateKeyWithHashAlg, PublicKey};
use russh::{Channel, Disconnect};
use secrecy::ExposeSecret;

use super::auth::AuthProof;
use crate::config::HostConfig;
use crate::error::ConnectError;

/// Terminal width requested for the PTY.
const TERMINAL_WIDTH: u32 = 511;

/// Terminal height requested for the PTY.
const TERMINAL_HEIGHT: u32 = 24;

/// SSH transport wrapping a russh client session.
pub struct SshTransport {
    /// The russh session handle.
    handle: Handle<ClientHandler>,
}

impl SshTransport {
    /// Dial the host and authenticate with the given proofs, in order.
    ///
    /// The dial is bounded by the configured timeout. The first accepted
    /// proof wins; if every proof is rejected the connect fails with
    /// [`ConnectError::Auth`].
    pub async fn connect(
        config: &HostConfig,
        proofs: Vec<AuthProof>,
    ) -> Result<Self, ConnectError> {
        let ssh_config = Arc::new(client::Config {
            inactivity_timeout: Some(config.command_timeout),
            ..Default::default()
        });

        let mut handle = tokio::time::timeout(
            config.command_timeout,
            client::connect(
                ssh_config,
                (config.host.as_str(), config.port),
                ClientHandler,
            ),
        )
        .await
        .map_err(|_| ConnectError::Timeout(config.command_timeout))?
        .map_err(|source| ConnectError::Dial {
            host: config.host.clone(),
            port: config.port,
            source,
        })?;

        debug!("{} transport established", config.socket_addr());

        Self::authenticate(&mut handle, config, proofs).await?;

        Ok(Self { handle })
    }

    /// Offer each proof until the server accepts one.
    async fn authenticate(
        handle: &mut Handle<ClientHandler>,
        config: &HostConfig,
        proofs: Vec<AuthProof>,
    ) -> Result<(), ConnectError> {
        let ssh_err = |source| ConnectError::Dial {
            host: config.host.clone(),
            port: config.port,
            source,
        };

        for proof in proofs {
            let accepted = match proof {
                AuthProof::Password(password) => handle
                    .authenticate_password(&config.username, password.expose_secret())
                    .await
                    .map_err(ssh_err)?
                    .success(),
                AuthProof::PrivateKey(key) => {
                    // Pick the strongest RSA hash the server supports.
                    let hash_alg = handle
                        .best_supported_rsa_hash()
                        .await
                        .map_err(ssh_err)?
                        .flatten();

                    handle
                        .authenticate_publickey(
                            &config.username,
                            PrivateKeyWithHashAlg::new(key, hash_alg),
                        )
                        .await
                        .map_err(ssh_err)?
                        .success()
                }
            };

            if accepted {
                debug!("{} authenticated as '{}'", config.socket_addr(), config.username);
                return Ok(());
            }
            debug!("{} rejected a proof for '{}'", config.socket_addr(), config.username);
        }

        Err(ConnectError::Auth {
            user: config.username.clone(),
        })
    }

    /// Open the interactive shell channel on this connection.
    pub async fn open_shell(&self) -> Result<Channel<Msg>, ConnectError> {
        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(ConnectError::Session)?;

        channel
            .request_pty(true, "xterm", TERMINAL_WIDTH, TERMINAL_HEIGHT, 0, 0, &[])
            .await
            .map_err(ConnectError::ShellStart)?;

        channel
            .request_shell(true)
            .await
            .map_err(ConnectError::ShellStart)?;

        Ok(channel)
    }

    /// Disconnect the transport. Failures are logged, not surfaced; the
    /// peer may already be gone.
    pub async fn close(self) {
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
        {
            debug!("disconnect failed: {e}");
        }
    }
}

/// SSH client handler for russh. Host keys are accepted without
/// verification.
struct ClientHandler;

impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

//! SSH shell session: the prompt-driven command state machine.
//!
//! A [`SshSession`] owns one authenticated interactive shell on one device.
//! A background I/O task bridges the russh channel to a pair of byte
//! channels; all waiting is expressed as "read until the buffer ends at a
//! prompt, bounded by a deadline", so there is no polling interval and the
//! state machine can be driven by scripted channels in tests.

use std::time::Duration;

use bytes::BytesMut;
use log::{debug, trace};
use russh::client::Msg;
use russh::{Channel, ChannelMsg};
use secrecy::ExposeSecret;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::DeviceSession;
use super::prompt;
use crate::config::HostConfig;
use crate::error::{ConnectError, ExecError, Result};
use crate::transport::{SshTransport, resolve_credentials};

/// Commands that disable output paging, tried in order at connect time.
/// Failures are ignored; not every device supports either.
const PAGING_COMMANDS: [&str; 2] = ["terminal length 0", "terminal pager 0"];

/// Command that enters the device's privileged mode.
const ELEVATE_COMMAND: &str = "enable";

/// Pause between sending the elevation command and its secret. The secret
/// is sent blind; the device's password prompt is not pattern-matched.
const ELEVATE_PAUSE: Duration = Duration::from_millis(500);

/// Lifecycle of a shell session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Authenticated,
    Elevated,
    Ready,
    Executing,
    Closed,
}

/// Why a prompt wait ended without a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaitError {
    /// The deadline expired first.
    Timeout,
    /// The remote end closed the channel.
    Closed,
}

/// Byte-stream endpoints of the shell, fed by the channel I/O task.
struct ShellIo {
    input: mpsc::Sender<Vec<u8>>,
    output: mpsc::Receiver<Vec<u8>>,
}

impl ShellIo {
    /// Send one line of input, newline appended.
    async fn send_line(&self, line: &str) -> std::result::Result<(), ExecError> {
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
        self.input
            .send(bytes)
            .await
            .map_err(|_| ExecError::ChannelClosed)
    }

    /// Accumulate output into `buffer` until it ends at a prompt or the
    /// deadline expires.
    async fn read_until_prompt(
        &mut self,
        buffer: &mut BytesMut,
        deadline: Instant,
    ) -> std::result::Result<(), WaitError> {
        loop {
            let chunk = match tokio::time::timeout_at(deadline, self.output.recv()).await {
                Err(_) => return Err(WaitError::Timeout),
                Ok(None) => return Err(WaitError::Closed),
                Ok(Some(chunk)) => chunk,
            };
            buffer.extend_from_slice(&chunk);
            trace!("read {} bytes, buffer at {}", chunk.len(), buffer.len());
            if prompt::buffer_ends_with_prompt(buffer) {
                return Ok(());
            }
        }
    }
}

/// Spawn the task that pumps bytes between the russh channel and the
/// session's mpsc endpoints. The task winds down when the session drops
/// its sender or the remote end closes the channel.
fn spawn_io(mut channel: Channel<Msg>, label: String) -> ShellIo {
    let (input_tx, mut input_rx) = mpsc::channel::<Vec<u8>>(32);
    let (output_tx, output_rx) = mpsc::channel::<Vec<u8>>(256);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                data = input_rx.recv() => {
                    match data {
                        Some(bytes) => {
                            if let Err(e) = channel.data(&bytes[..]).await {
                                debug!("{label} failed to write to shell: {e:?}");
                                break;
                            }
                        }
                        None => {
                            let _ = channel.eof().await;
                            break;
                        }
                    }
                }
                msg = channel.wait() => {
                    match msg {
                        Some(ChannelMsg::Data { ref data }) => {
                            if output_tx.send(data.to_vec()).await.is_err() {
                                debug!("{label} output receiver dropped");
                                break;
                            }
                        }
                        Some(ChannelMsg::ExitStatus { exit_status }) => {
                            debug!("{label} shell exited with status {exit_status}");
                        }
                        Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                            debug!("{label} shell closed");
                            break;
                        }
                        Some(_) => {}
                    }
                }
            }
        }
        debug!("{label} I/O task ended");
    });

    ShellIo {
        input: input_tx,
        output: output_rx,
    }
}

/// Send one command and collect its cleaned output.
async fn run_command(
    io: &mut ShellIo,
    command: &str,
    timeout: Duration,
) -> std::result::Result<String, ExecError> {
    io.send_line(command).await?;

    let mut buffer = BytesMut::new();
    let deadline = Instant::now() + timeout;
    match io.read_until_prompt(&mut buffer, deadline).await {
        Ok(()) => {}
        Err(WaitError::Timeout) => {
            return Err(ExecError::CommandTimeout {
                command: command.to_string(),
                timeout,
            });
        }
        Err(WaitError::Closed) => return Err(ExecError::ChannelClosed),
    }

    let raw = String::from_utf8_lossy(&buffer);
    Ok(prompt::clean_output(&raw, command))
}

/// Bring a freshly started shell to a usable prompt: consume the login
/// banner, disable paging, and optionally elevate privilege.
async fn initialize_shell(
    io: &mut ShellIo,
    config: &HostConfig,
) -> std::result::Result<(), ConnectError> {
    let timeout = config.command_timeout;
    let map_wait = |e| match e {
        WaitError::Timeout => ConnectError::PromptTimeout(timeout),
        WaitError::Closed => ConnectError::Closed,
    };

    // The banner is read up to the first prompt and discarded.
    let mut banner = BytesMut::new();
    io.read_until_prompt(&mut banner, Instant::now() + timeout)
        .await
        .map_err(map_wait)?;
    trace!("discarded {} bytes of banner", banner.len());

    for command in PAGING_COMMANDS {
        if let Err(e) = run_command(io, command, timeout).await {
            debug!("paging command {command:?} failed: {e}");
        }
    }

    if let Some(secret) = &config.enable_secret {
        io.send_line(ELEVATE_COMMAND)
            .await
            .map_err(|_| ConnectError::Closed)?;
        tokio::time::sleep(ELEVATE_PAUSE).await;
        io.send_line(secret.expose_secret())
            .await
            .map_err(|_| ConnectError::Closed)?;

        // Whatever prompt comes back is accepted; elevation success is
        // not verified.
        let mut buffer = BytesMut::new();
        io.read_until_prompt(&mut buffer, Instant::now() + timeout)
            .await
            .map_err(map_wait)?;
    }

    Ok(())
}

/// An interactive SSH shell session with one device.
pub struct SshSession {
    config: HostConfig,
    transport: Option<SshTransport>,
    io: Option<ShellIo>,
    state: SessionState,
}

impl SshSession {
    /// Create a disconnected session for the given configuration.
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            transport: None,
            io: None,
            state: SessionState::Disconnected,
        }
    }

    /// The session's current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }
}

impl DeviceSession for SshSession {
    async fn connect(&mut self) -> Result<()> {
        self.state = SessionState::Connecting;
        debug!("{} connecting", self.config.socket_addr());

        let proofs = resolve_credentials(&self.config)?;
        let transport = SshTransport::connect(&self.config, proofs).await?;
        let channel = transport.open_shell().await?;
        self.transport = Some(transport);
        self.state = SessionState::Authenticated;

        let mut io = spawn_io(channel, self.config.socket_addr());
        let initialized = initialize_shell(&mut io, &self.config).await;
        // Keep the endpoints either way so close() releases them.
        self.io = Some(io);
        initialized?;

        if self.config.enable_secret.is_some() {
            self.state = SessionState::Elevated;
        }
        self.state = SessionState::Ready;
        debug!("{} ready", self.config.socket_addr());
        Ok(())
    }

    async fn execute(&mut self, command: &str) -> Result<String> {
        if self.state != SessionState::Ready {
            return Err(ExecError::NotConnected.into());
        }
        let io = self.io.as_mut().ok_or(ExecError::NotConnected)?;

        self.state = SessionState::Executing;
        let result = run_command(io, command, self.config.command_timeout).await;
        match result {
            Ok(output) => {
                self.state = SessionState::Ready;
                Ok(output)
            }
            Err(ExecError::ChannelClosed) => {
                self.state = SessionState::Closed;
                Err(ExecError::ChannelClosed.into())
            }
            Err(e) => {
                // A timed-out command leaves the session nominally ready;
                // later commands may find the shell out of sync.
                self.state = SessionState::Ready;
                Err(e.into())
            }
        }
    }

    async fn close(&mut self) {
        self.io = None;
        if let Some(transport) = self.transport.take() {
            transport.close().await;
            debug!("{} closed", self.config.socket_addr());
        }
        self.state = SessionState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a `ShellIo` wired to in-test device endpoints instead of a
    /// russh channel.
    fn scripted_io() -> (ShellIo, mpsc::Receiver<Vec<u8>>, mpsc::Sender<Vec<u8>>) {
        let (input_tx, input_rx) = mpsc::channel::<Vec<u8>>(32);
        let (output_tx, output_rx) = mpsc::channel::<Vec<u8>>(256);
        (
            ShellIo {
                input: input_tx,
                output: output_rx,
            },
            input_rx,
            output_tx,
        )
    }

    async fn drain_lines(rx: &mut mpsc::Receiver<Vec<u8>>) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(bytes) = rx.try_recv() {
            lines.push(String::from_utf8(bytes).unwrap());
        }
        lines
    }

    #[tokio::test(start_paused = true)]
    async fn read_until_prompt_accumulates_chunks() {
        let (mut io, _device_in, device_out) = scripted_io();
        device_out.send(b"Cisco IOS".to_vec()).await.unwrap();
        device_out.send(b" Software\n".to_vec()).await.unwrap();
        device_out.send(b"switch1#".to_vec()).await.unwrap();

        let mut buffer = BytesMut::new();
        let deadline = Instant::now() + Duration::from_secs(5);
        io.read_until_prompt(&mut buffer, deadline).await.unwrap();
        assert_eq!(&buffer[..], b"Cisco IOS Software\nswitch1#");
    }

    #[tokio::test(start_paused = true)]
    async fn read_until_prompt_times_out() {
        let (mut io, _device_in, device_out) = scripted_io();
        device_out.send(b"still going".to_vec()).await.unwrap();

        let mut buffer = BytesMut::new();
        let deadline = Instant::now() + Duration::from_secs(5);
        let err = io.read_until_prompt(&mut buffer, deadline).await.unwrap_err();
        assert_eq!(err, WaitError::Timeout);
        // The sender stays alive for the whole wait.
        drop(device_out);
    }

    #[tokio::test(start_paused = true)]
    async fn read_until_prompt_reports_closed_channel() {
        let (mut io, _device_in, device_out) = scripted_io();
        drop(device_out);

        let mut buffer = BytesMut::new();
        let deadline = Instant::now() + Duration::from_secs(5);
        let err = io.read_until_prompt(&mut buffer, deadline).await.unwrap_err();
        assert_eq!(err, WaitError::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn run_command_cleans_echo_and_prompt() {
        let (mut io, mut device_in, device_out) = scripted_io();
        device_out
            .send(b"show version\nCisco IOS Software\nswitch1#".to_vec())
            .await
            .unwrap();

        let output = run_command(&mut io, "show version", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(output, "Cisco IOS Software");
        assert_eq!(drain_lines(&mut device_in).await, vec!["show version\n"]);
    }

    #[tokio::test(start_paused = true)]
    async fn run_command_times_out_without_prompt() {
        let (mut io, _device_in, device_out) = scripted_io();
        device_out.send(b"partial output".to_vec()).await.unwrap();

        let err = run_command(&mut io, "show tech", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::CommandTimeout { ref command, .. } if command == "show tech"));
        drop(device_out);
    }

    #[tokio::test(start_paused = true)]
    async fn initialize_discards_banner_and_survives_rejected_paging() {
        let (mut io, mut device_in, device_out) = scripted_io();
        // Banner, then one response per paging command; the second is a
        // device rejection, which must not fail initialization.
        device_out
            .send(b"Welcome to switch1\nswitch1#".to_vec())
            .await
            .unwrap();
        device_out
            .send(b"terminal length 0\nswitch1#".to_vec())
            .await
            .unwrap();
        device_out
            .send(b"terminal pager 0\n% Invalid input detected\nswitch1#".to_vec())
            .await
            .unwrap();

        let config = HostConfig::new("switch1").with_command_timeout(Duration::from_secs(5));
        tokio_test::assert_ok!(initialize_shell(&mut io, &config).await);

        assert_eq!(
            drain_lines(&mut device_in).await,
            vec!["terminal length 0\n", "terminal pager 0\n"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn initialize_sends_elevation_blind_and_accepts_any_prompt() {
        let (mut io, mut device_in, device_out) = scripted_io();
        device_out.send(b"switch1>".to_vec()).await.unwrap();
        device_out
            .send(b"terminal length 0\nswitch1>".to_vec())
            .await
            .unwrap();
        device_out
            .send(b"terminal pager 0\nswitch1>".to_vec())
            .await
            .unwrap();
        // The device rejects the secret; the post-elevation prompt is an
        // unprivileged one, and initialization still succeeds.
        device_out
            .send(b"Password: \nBad secrets\nswitch1>".to_vec())
            .await
            .unwrap();

        let config = HostConfig::new("switch1")
            .with_enable_secret("wrong-secret")
            .with_command_timeout(Duration::from_secs(5));
        tokio_test::assert_ok!(initialize_shell(&mut io, &config).await);

        assert_eq!(
            drain_lines(&mut device_in).await,
            vec![
                "terminal length 0\n",
                "terminal pager 0\n",
                "enable\n",
                "wrong-secret\n"
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn initialize_times_out_without_banner_prompt() {
        let (mut io, _device_in, device_out) = scripted_io();
        device_out.send(b"Welcome, no prompt yet".to_vec()).await.unwrap();

        let config = HostConfig::new("switch1").with_command_timeout(Duration::from_secs(5));
        let err = initialize_shell(&mut io, &config).await.unwrap_err();
        assert!(matches!(err, ConnectError::PromptTimeout(_)));
        drop(device_out);
    }

    #[tokio::test]
    async fn execute_requires_ready_state() {
        let mut session = SshSession::new(HostConfig::new("switch1"));
        assert_eq!(session.state(), SessionState::Disconnected);

        let err = session.execute("show version").await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Exec(ExecError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let mut session = SshSession::new(HostConfig::new("switch1"));
        session.close().await;
        assert_eq!(session.state(), SessionState::Closed);
        session.close().await;
        assert_eq!(session.state(), SessionState::Closed);

        // A closed session refuses commands rather than panicking.
        let err = session.execute("show version").await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Exec(ExecError::NotConnected)
        ));
    }
}

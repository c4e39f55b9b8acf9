//! Managed SSH connection.
//!
//! A [`Connection`] owns one transport and at most one live handle, and
//! walks the lifecycle Disconnected → Connected → Ready. `execute` runs a
//! command over a fresh channel and drains its streams with a fixed
//! protocol: control channel closed first, stdio read to end, then stderr,
//! then the streams closed in that order. Stream failures never escape
//! `execute`; they are folded into the returned output so one bad command
//! cannot take down a bulk operation.

use serde::{Deserialize, Serialize};

use crate::config::{AuthMethod, ConnectionConfig};
use crate::error::{Error, Result};
use crate::log::CommandLog;
use crate::transport::{AuthOutcome, StreamKind, Transport};

/// Command sent to the remote shell on graceful teardown.
const EXIT_COMMAND: &str = "echo \"EXITING\" && exit;";

/// Lifecycle state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No live handle.
    Disconnected,
    /// Handle open, not yet authenticated.
    Connected,
    /// Authenticated and ready to execute commands.
    Ready,
}

/// Captured output of one executed command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecOutput {
    /// Standard output, or the failure message for a recovered error.
    pub stdio: String,
    /// Standard error.
    pub stderr: String,
}

impl ExecOutput {
    /// Fold a failure into an output value, message in the stdio slot.
    fn recovered(error: &Error) -> Self {
        Self {
            stdio: error.to_string(),
            stderr: String::new(),
        }
    }
}

/// A managed SSH connection over a generic transport.
pub struct Connection<T: Transport> {
    config: ConnectionConfig,
    transport: T,
    handle: Option<T::Handle>,
    state: ConnectionState,
    log: CommandLog,
}

impl<T: Transport> std::fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .field("state", &self.state)
            .field("logged_commands", &self.log.len())
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Connection<T> {
    /// Create a disconnected connection from a configuration and transport.
    pub fn new(config: ConnectionConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            handle: None,
            state: ConnectionState::Disconnected,
            log: CommandLog::new(),
        }
    }

    /// Open the handle, verify the host fingerprint when one is expected,
    /// and authenticate. On success the connection is [`ConnectionState::Ready`].
    ///
    /// Any previous handle is torn down first, whatever state it was in.
    pub async fn connect(&mut self) -> Result<()> {
        if self.config.host.is_empty() {
            return Err(Error::invalid_argument("host must not be empty"));
        }

        self.teardown().await;

        tracing::debug!(
            host = %self.config.host,
            port = self.config.port,
            "opening connection"
        );

        let handle = match self.transport.open(&self.config).await {
            Ok(handle) => handle,
            Err(source) => {
                return Err(Error::connection(
                    &self.config.host,
                    format!("error connecting to server: {source}"),
                ));
            }
        };
        self.handle = Some(handle);
        self.state = ConnectionState::Connected;

        if let Some(expected) = self.config.fingerprint.clone() {
            self.verify_fingerprint(&expected).await?;
        }

        self.authenticate().await?;
        self.state = ConnectionState::Ready;

        tracing::debug!(host = %self.config.host, "connection ready");
        Ok(())
    }

    /// Compare the live host fingerprint byte-for-byte against `expected`.
    ///
    /// The handle is torn down before the error is returned; a host that
    /// fails verification never stays connected.
    async fn verify_fingerprint(&mut self, expected: &str) -> Result<()> {
        let Some(handle) = self.handle.as_mut() else {
            return Err(Error::closed(&self.config.host));
        };

        let live = match self.transport.fingerprint(handle).await {
            Ok(live) => live,
            Err(source) => {
                self.teardown().await;
                return Err(Error::connection(
                    &self.config.host,
                    format!("could not read host fingerprint: {source}"),
                ));
            }
        };

        if live.as_bytes() != expected.as_bytes() {
            tracing::warn!(
                host = %self.config.host,
                expected,
                live,
                "host fingerprint mismatch"
            );
            self.teardown().await;
            return Err(Error::authentication(
                &self.config.host,
                format!(
                    "The authenticity of host '{}' can't be established.",
                    self.config.host
                ),
            ));
        }
        Ok(())
    }

    /// Authenticate using the method derived from the configuration.
    async fn authenticate(&mut self) -> Result<()> {
        let method = self.config.auth_method();
        let username = self.config.username.clone();

        let Some(handle) = self.handle.as_mut() else {
            return Err(Error::closed(&self.config.host));
        };

        let attempt = match &method {
            AuthMethod::None => self.transport.auth_none(handle, &username).await,
            AuthMethod::Password(password) => {
                self.transport
                    .auth_password(handle, &username, password)
                    .await
            }
            AuthMethod::KeyPair {
                private_key_path,
                passphrase,
                ..
            } => {
                self.transport
                    .auth_key_pair(handle, &username, private_key_path, passphrase.as_deref())
                    .await
            }
        };

        let outcome = match attempt {
            Ok(outcome) => outcome,
            Err(source) => {
                tracing::warn!(host = %self.config.host, error = %source, "authentication failed");
                self.teardown().await;
                return Err(Error::authentication(
                    &self.config.host,
                    "Host key verification failed.",
                ));
            }
        };

        match outcome {
            AuthOutcome::Accepted => Ok(()),
            AuthOutcome::Rejected { alternatives } => {
                self.teardown().await;
                let reason = if alternatives.is_empty() {
                    "Host key verification failed.".to_string()
                } else {
                    let methods = alternatives
                        .iter()
                        .map(|m| format!("'{m}'"))
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!("Host key verification method not allowed. Methods allowed: {methods}")
                };
                Err(Error::authentication(&self.config.host, reason))
            }
        }
    }

    /// Execute a command and capture its output.
    ///
    /// Requires a ready connection. Stream failures after the channel was
    /// opened are recovered into the returned [`ExecOutput`] with the
    /// failure message in the stdio slot; they never surface as `Err`.
    /// While logging is enabled the input is recorded before execution and
    /// the output attached at the same index afterwards.
    pub async fn execute(&mut self, command: &str) -> Result<ExecOutput> {
        if self.state != ConnectionState::Ready || self.handle.is_none() {
            return Err(Error::connection(&self.config.host, "not connected"));
        }

        let logging = self.config.log.enabled;
        let exec_timeout = self.config.exec_timeout;
        let log_index = logging.then(|| self.log.push_input(command));
        let wire = if logging {
            format!("{}{command}", self.config.log.command_prefix)
        } else {
            command.to_string()
        };

        tracing::debug!(host = %self.config.host, command, "executing command");

        let run = async {
            match self.run_command(&wire).await {
                Ok(output) => output,
                Err(error) => {
                    tracing::warn!(
                        host = %self.config.host,
                        error = %error,
                        "command failed, recovering output"
                    );
                    ExecOutput::recovered(&error)
                }
            }
        };

        let output = match exec_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, run).await {
                Ok(output) => output,
                Err(_) => ExecOutput::recovered(&Error::connection(
                    &self.config.host,
                    format!("command timed out after {timeout:?}"),
                )),
            },
            None => run.await,
        };

        if let Some(index) = log_index {
            self.log.set_output(index, output.clone());
        }
        Ok(output)
    }

    /// Run one wire command through the stream-drain protocol.
    async fn run_command(&mut self, wire: &str) -> Result<ExecOutput> {
        let host = self.config.host.clone();
        let buffer_size = self.config.buffer_size;

        let Some(handle) = self.handle.as_mut() else {
            return Err(Error::closed(&host));
        };

        let mut channel = self.transport.exec(handle, wire).await?;
        let mut stdio_stream = self
            .transport
            .fetch_stream(&mut channel, StreamKind::Stdio)
            .await?;
        let mut stderr_stream = self
            .transport
            .fetch_stream(&mut channel, StreamKind::Stderr)
            .await?;

        // Control channel goes first; stream handles stay readable after.
        if self.transport.close_channel(channel).await.is_err() {
            self.config.hooks.disconnect("control channel close failed");
            return Err(Error::closed(&host));
        }

        let mut stdio = String::new();
        let mut stderr = String::new();

        loop {
            match self.transport.read_chunk(&mut stdio_stream, buffer_size).await {
                Ok(Some(chunk)) => stdio.push_str(&String::from_utf8_lossy(&chunk)),
                Ok(None) => break,
                Err(_) => return Err(Error::interrupted(&host, stdio, stderr)),
            }
        }
        loop {
            match self
                .transport
                .read_chunk(&mut stderr_stream, buffer_size)
                .await
            {
                Ok(Some(chunk)) => stderr.push_str(&String::from_utf8_lossy(&chunk)),
                Ok(None) => break,
                Err(_) => return Err(Error::interrupted(&host, stdio, stderr)),
            }
        }

        // Closed independently: a failed stdio close must not leak stderr.
        let stdio_closed = self.transport.close_stream(stdio_stream).await;
        let stderr_closed = self.transport.close_stream(stderr_stream).await;
        if stdio_closed.is_err() || stderr_closed.is_err() {
            return Err(Error::interrupted(&host, stdio, stderr));
        }

        Ok(ExecOutput { stdio, stderr })
    }

    /// Gracefully close the session. Idempotent.
    ///
    /// A ready session is asked to exit its remote shell first; the handle
    /// is released either way.
    pub async fn disconnect(&mut self) {
        if self.state == ConnectionState::Ready && self.handle.is_some() {
            let _ = self.execute(EXIT_COMMAND).await;
        }
        self.teardown().await;
    }

    /// Disconnect and clear the command log. Idempotent.
    pub async fn destroy(&mut self) {
        self.disconnect().await;
        self.log.clear();
    }

    /// Release the handle without the remote exit handshake.
    async fn teardown(&mut self) {
        if let Some(handle) = self.handle.take() {
            tracing::debug!(host = %self.config.host, "closing handle");
            if let Err(error) = self.transport.close_handle(handle).await {
                tracing::debug!(host = %self.config.host, error = %error, "handle close failed");
            }
        }
        self.state = ConnectionState::Disconnected;
    }

    /// Whether a live handle exists.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// The command log.
    #[must_use]
    pub const fn log(&self) -> &CommandLog {
        &self.log
    }

    /// The connection configuration.
    #[must_use]
    pub const fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// The underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Set the stream read chunk size for subsequent commands.
    pub const fn set_buffer_size(&mut self, buffer_size: usize) {
        self.config.buffer_size = buffer_size;
    }

    /// Enable or disable command logging for subsequent commands.
    pub const fn set_log_enabled(&mut self, enabled: bool) {
        self.config.log.enabled = enabled;
    }

    /// Set the wire command prefix used while logging is enabled.
    pub fn set_command_prefix(&mut self, prefix: impl Into<String>) {
        self.config.log.command_prefix = prefix.into();
    }

    /// Set the advisory log-type tag.
    pub fn set_log_type(&mut self, log_type: impl Into<String>) {
        self.config.log.log_type = log_type.into();
    }

    /// Replace the expected host fingerprint checked on the next connect.
    pub fn set_fingerprint(&mut self, fingerprint: Option<String>) {
        self.config.fingerprint = fingerprint;
    }
}

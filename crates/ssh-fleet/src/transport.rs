//! Transport abstraction.
//!
//! A [`Transport`] supplies the wire-level capabilities a managed connection
//! consumes: opening a handle to a remote host, querying its fingerprint,
//! authenticating, executing a command on a fresh channel, and reading the
//! channel's stdio/stderr streams in chunks. Connections are generic over
//! their transport, which keeps the lifecycle and drain logic testable
//! against the in-memory [`crate::mock::MockTransport`].

use bytes::Bytes;

use crate::config::ConnectionConfig;
use crate::error::Result;

#[cfg(feature = "russh")]
pub mod russh;

/// Outcome of an authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The server accepted the credentials.
    Accepted,
    /// The server rejected the attempt, optionally naming the methods it
    /// would still accept.
    Rejected {
        /// Methods the server advertised as still available.
        alternatives: Vec<String>,
    },
}

impl AuthOutcome {
    /// Create a rejection carrying the server's advertised alternatives.
    pub fn rejected<I, S>(alternatives: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Rejected {
            alternatives: alternatives.into_iter().map(Into::into).collect(),
        }
    }

    /// Check whether the attempt succeeded.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// The two output streams a command channel carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// Standard output of the remote command.
    Stdio,
    /// Standard error of the remote command.
    Stderr,
}

/// Wire-level capability set consumed by [`crate::connection::Connection`].
///
/// `read_chunk` returns `Ok(None)` at end of stream. Stream handles must
/// stay readable after the control channel has been closed; the drain
/// protocol closes the channel before it reads either stream.
pub trait Transport: Send {
    /// An open, not-necessarily-authenticated link to a remote host.
    type Handle: Send;
    /// A command channel produced by [`Transport::exec`].
    type Channel: Send;
    /// A readable handle onto one of a channel's output streams.
    type Stream: Send;

    /// Open a link to the host named in the configuration.
    fn open(
        &mut self,
        config: &ConnectionConfig,
    ) -> impl std::future::Future<Output = Result<Self::Handle>> + Send;

    /// Fetch the remote host's key fingerprint.
    fn fingerprint(
        &mut self,
        handle: &mut Self::Handle,
    ) -> impl std::future::Future<Output = Result<String>> + Send;

    /// Attempt none-authentication.
    fn auth_none(
        &mut self,
        handle: &mut Self::Handle,
        username: &str,
    ) -> impl std::future::Future<Output = Result<AuthOutcome>> + Send;

    /// Attempt password authentication.
    fn auth_password(
        &mut self,
        handle: &mut Self::Handle,
        username: &str,
        password: &str,
    ) -> impl std::future::Future<Output = Result<AuthOutcome>> + Send;

    /// Attempt public-key authentication from on-disk key files.
    fn auth_key_pair(
        &mut self,
        handle: &mut Self::Handle,
        username: &str,
        private_key_path: &str,
        passphrase: Option<&str>,
    ) -> impl std::future::Future<Output = Result<AuthOutcome>> + Send;

    /// Execute a command, returning its channel.
    fn exec(
        &mut self,
        handle: &mut Self::Handle,
        command: &str,
    ) -> impl std::future::Future<Output = Result<Self::Channel>> + Send;

    /// Fetch a readable handle onto one of the channel's streams.
    fn fetch_stream(
        &mut self,
        channel: &mut Self::Channel,
        kind: StreamKind,
    ) -> impl std::future::Future<Output = Result<Self::Stream>> + Send;

    /// Close the control channel. Streams fetched from it remain readable.
    fn close_channel(
        &mut self,
        channel: Self::Channel,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Read up to `max_len` bytes; `Ok(None)` signals end of stream.
    fn read_chunk(
        &mut self,
        stream: &mut Self::Stream,
        max_len: usize,
    ) -> impl std::future::Future<Output = Result<Option<Bytes>>> + Send;

    /// Close a stream handle.
    fn close_stream(
        &mut self,
        stream: Self::Stream,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Close the link to the remote host.
    fn close_handle(
        &mut self,
        handle: Self::Handle,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

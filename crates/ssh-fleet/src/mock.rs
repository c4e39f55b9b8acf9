//! Scripted in-memory transport for tests.
//!
//! `MockTransport` plays back queued authentication outcomes and per-command
//! exec scripts, and journals every wire-level call in order. Tests assert
//! against the journal to verify protocol ordering (channel closed before
//! streams are read, stdio drained before stderr) without a live server.
//! The journal is shareable: hand the same [`MockJournal`] to a transport
//! and keep a clone, and the recorded calls stay observable even after the
//! owning connection has been consumed.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::transport::{AuthOutcome, StreamKind, Transport};

const fn kind_name(kind: StreamKind) -> &'static str {
    match kind {
        StreamKind::Stdio => "stdio",
        StreamKind::Stderr => "stderr",
    }
}

/// Shared record of a transport's wire-level calls and sent commands.
#[derive(Debug, Clone, Default)]
pub struct MockJournal {
    calls: Arc<Mutex<Vec<String>>>,
    wire: Arc<Mutex<Vec<String>>>,
}

impl MockJournal {
    /// Create an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, entry: String) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry);
    }

    fn record_wire(&self, command: String) {
        self.wire
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command);
    }

    /// All wire-level calls, in order.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The exact command strings sent over the wire, in order.
    #[must_use]
    pub fn wire_commands(&self) -> Vec<String> {
        self.wire
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of `close_handle` calls observed.
    #[must_use]
    pub fn handle_closes(&self) -> usize {
        self.entries().iter().filter(|e| *e == "close_handle").count()
    }
}

/// Script for one `exec` call.
#[derive(Debug, Clone, Default)]
pub struct MockExec {
    stdio: Vec<u8>,
    stderr: Vec<u8>,
    open_error: Option<String>,
    close_channel_error: Option<String>,
    read_error_after: Option<(StreamKind, usize)>,
    close_stream_error: Option<StreamKind>,
}

impl MockExec {
    /// Script a successful command with the given stdio payload.
    pub fn new(stdio: impl Into<Vec<u8>>) -> Self {
        Self {
            stdio: stdio.into(),
            ..Self::default()
        }
    }

    /// Add a stderr payload.
    #[must_use]
    pub fn stderr(mut self, stderr: impl Into<Vec<u8>>) -> Self {
        self.stderr = stderr.into();
        self
    }

    /// Fail the channel open with the given message.
    #[must_use]
    pub fn fail_open(mut self, message: impl Into<String>) -> Self {
        self.open_error = Some(message.into());
        self
    }

    /// Fail the control-channel close with the given message.
    #[must_use]
    pub fn fail_close_channel(mut self, message: impl Into<String>) -> Self {
        self.close_channel_error = Some(message.into());
        self
    }

    /// Fail reads on `kind` after `chunks` successful chunk reads.
    #[must_use]
    pub const fn fail_read_after(mut self, kind: StreamKind, chunks: usize) -> Self {
        self.read_error_after = Some((kind, chunks));
        self
    }

    /// Fail the close of the `kind` stream.
    #[must_use]
    pub const fn fail_close_stream(mut self, kind: StreamKind) -> Self {
        self.close_stream_error = Some(kind);
        self
    }
}

#[derive(Debug)]
struct ChannelState {
    script: MockExec,
    stdio_offset: usize,
    stderr_offset: usize,
    stdio_reads: usize,
    stderr_reads: usize,
}

/// Handle produced by a mock `open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockHandle {
    id: usize,
}

/// Channel produced by a mock `exec`; indexes into the transport's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockChannel {
    id: usize,
}

/// Stream handle over one side of a mock channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockStream {
    channel_id: usize,
    kind: StreamKind,
}

/// Scripted transport; see the module docs.
#[derive(Debug, Default)]
pub struct MockTransport {
    journal: MockJournal,
    open_errors: VecDeque<String>,
    fingerprint: String,
    auth_outcomes: VecDeque<AuthOutcome>,
    execs: VecDeque<MockExec>,
    channels: HashMap<usize, ChannelState>,
    next_id: usize,
}

impl MockTransport {
    /// Create a transport that accepts everything and returns empty output.
    #[must_use]
    pub fn new() -> Self {
        Self {
            fingerprint: "mock-fingerprint".to_string(),
            ..Self::default()
        }
    }

    /// Share an externally held journal, so calls stay observable after
    /// the connection owning this transport is gone.
    #[must_use]
    pub fn with_journal(mut self, journal: MockJournal) -> Self {
        self.journal = journal;
        self
    }

    /// Fail the next `open` call with the given message.
    #[must_use]
    pub fn fail_next_open(mut self, message: impl Into<String>) -> Self {
        self.open_errors.push_back(message.into());
        self
    }

    /// Set the fingerprint reported for the remote host.
    #[must_use]
    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = fingerprint.into();
        self
    }

    /// Queue an authentication outcome. When the queue is empty every
    /// attempt is accepted.
    #[must_use]
    pub fn with_auth_outcome(mut self, outcome: AuthOutcome) -> Self {
        self.auth_outcomes.push_back(outcome);
        self
    }

    /// Queue an exec script. When the queue is empty commands succeed with
    /// empty output.
    #[must_use]
    pub fn with_exec(mut self, script: MockExec) -> Self {
        self.execs.push_back(script);
        self
    }

    /// The journal of wire-level calls, in order.
    #[must_use]
    pub fn journal(&self) -> Vec<String> {
        self.journal.entries()
    }

    /// The exact command strings sent over the wire, in order.
    #[must_use]
    pub fn wire_commands(&self) -> Vec<String> {
        self.journal.wire_commands()
    }

    /// Number of `close_handle` calls observed.
    #[must_use]
    pub fn handle_closes(&self) -> usize {
        self.journal.handle_closes()
    }

    fn record(&self, entry: impl Into<String>) {
        self.journal.record(entry.into());
    }

    fn next_auth(&mut self) -> AuthOutcome {
        self.auth_outcomes
            .pop_front()
            .unwrap_or(AuthOutcome::Accepted)
    }
}

impl Transport for MockTransport {
    type Handle = MockHandle;
    type Channel = MockChannel;
    type Stream = MockStream;

    async fn open(&mut self, config: &ConnectionConfig) -> Result<MockHandle> {
        self.record(format!("open {}:{}", config.host, config.port));
        if let Some(message) = self.open_errors.pop_front() {
            return Err(Error::transport(message));
        }
        self.next_id += 1;
        Ok(MockHandle { id: self.next_id })
    }

    async fn fingerprint(&mut self, _handle: &mut MockHandle) -> Result<String> {
        self.record("fingerprint");
        Ok(self.fingerprint.clone())
    }

    async fn auth_none(&mut self, _handle: &mut MockHandle, username: &str) -> Result<AuthOutcome> {
        self.record(format!("auth_none {username}"));
        Ok(self.next_auth())
    }

    async fn auth_password(
        &mut self,
        _handle: &mut MockHandle,
        username: &str,
        _password: &str,
    ) -> Result<AuthOutcome> {
        self.record(format!("auth_password {username}"));
        Ok(self.next_auth())
    }

    async fn auth_key_pair(
        &mut self,
        _handle: &mut MockHandle,
        username: &str,
        private_key_path: &str,
        _passphrase: Option<&str>,
    ) -> Result<AuthOutcome> {
        self.record(format!("auth_key_pair {username} {private_key_path}"));
        Ok(self.next_auth())
    }

    async fn exec(&mut self, _handle: &mut MockHandle, command: &str) -> Result<MockChannel> {
        self.record(format!("exec {command}"));
        self.journal.record_wire(command.to_string());

        let mut script = self.execs.pop_front().unwrap_or_default();
        if let Some(message) = script.open_error.take() {
            return Err(Error::transport(message));
        }

        self.next_id += 1;
        let id = self.next_id;
        self.channels.insert(
            id,
            ChannelState {
                script,
                stdio_offset: 0,
                stderr_offset: 0,
                stdio_reads: 0,
                stderr_reads: 0,
            },
        );
        Ok(MockChannel { id })
    }

    async fn fetch_stream(
        &mut self,
        channel: &mut MockChannel,
        kind: StreamKind,
    ) -> Result<MockStream> {
        self.record(format!("fetch_stream {}", kind_name(kind)));
        Ok(MockStream {
            channel_id: channel.id,
            kind,
        })
    }

    async fn close_channel(&mut self, channel: MockChannel) -> Result<()> {
        self.record("close_channel");
        let error = self
            .channels
            .get(&channel.id)
            .and_then(|state| state.script.close_channel_error.clone());
        match error {
            Some(message) => Err(Error::transport(message)),
            None => Ok(()),
        }
    }

    async fn read_chunk(&mut self, stream: &mut MockStream, max_len: usize) -> Result<Option<Bytes>> {
        self.record(format!("read {}", kind_name(stream.kind)));
        let state = self
            .channels
            .get_mut(&stream.channel_id)
            .ok_or_else(|| Error::transport("read on unknown channel"))?;

        let (payload, offset, reads) = match stream.kind {
            StreamKind::Stdio => (
                &state.script.stdio,
                &mut state.stdio_offset,
                &mut state.stdio_reads,
            ),
            StreamKind::Stderr => (
                &state.script.stderr,
                &mut state.stderr_offset,
                &mut state.stderr_reads,
            ),
        };

        if let Some((fail_kind, after)) = state.script.read_error_after {
            if fail_kind == stream.kind && *reads >= after {
                return Err(Error::transport("read failed"));
            }
        }

        if *offset >= payload.len() {
            return Ok(None);
        }

        let end = usize::min(*offset + max_len, payload.len());
        let chunk = Bytes::copy_from_slice(&payload[*offset..end]);
        *offset = end;
        *reads += 1;
        Ok(Some(chunk))
    }

    async fn close_stream(&mut self, stream: MockStream) -> Result<()> {
        self.record(format!("close_stream {}", kind_name(stream.kind)));
        let fails = self
            .channels
            .get(&stream.channel_id)
            .is_some_and(|state| state.script.close_stream_error == Some(stream.kind));
        if fails {
            return Err(Error::transport("stream close failed"));
        }
        Ok(())
    }

    async fn close_handle(&mut self, _handle: MockHandle) -> Result<()> {
        self.record("close_handle");
        Ok(())
    }
}

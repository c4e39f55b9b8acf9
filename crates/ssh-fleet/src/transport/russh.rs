//! russh-backed transport.
//!
//! Implements [`Transport`] over the `russh` client: one TCP+SSH handshake
//! per handle, one exec channel per command. russh multiplexes a channel's
//! stdout and stderr onto a single message stream; the demultiplexer here
//! buffers each side so the two stream handles can be drained independently,
//! and stays readable after the control channel has sent its EOF.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use bytes::{Bytes, BytesMut};
use russh::client;
use russh::keys::{HashAlg, PrivateKeyWithHashAlg, PublicKey};
use russh::client::AuthResult;
use russh::{MethodKind, MethodSet};
use tokio::sync::Mutex;

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::events::EventHooks;
use crate::transport::{AuthOutcome, StreamKind, Transport};

/// Known authentication method kinds and their wire names, used to render
/// a server's remaining-methods set into a stable list.
const METHOD_NAMES: &[(MethodKind, &str)] = &[
    (MethodKind::None, "none"),
    (MethodKind::Password, "password"),
    (MethodKind::PublicKey, "publickey"),
    (MethodKind::HostBased, "hostbased"),
    (MethodKind::KeyboardInteractive, "keyboard-interactive"),
];

fn method_names(set: &MethodSet) -> Vec<String> {
    METHOD_NAMES
        .iter()
        .filter(|(kind, _)| set.contains(kind))
        .map(|(_, name)| (*name).to_string())
        .collect()
}

fn outcome(result: AuthResult) -> AuthOutcome {
    match result {
        AuthResult::Failure {
            remaining_methods, ..
        } => AuthOutcome::rejected(method_names(&remaining_methods)),
        _ => AuthOutcome::Accepted,
    }
}

/// russh client handler; records the server key fingerprint for the
/// post-connect comparison instead of rejecting in-handshake.
struct FleetHandler {
    host: String,
    fingerprint: Arc<StdMutex<Option<String>>>,
    hooks: EventHooks,
}

impl client::Handler for FleetHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let fingerprint = server_public_key.fingerprint(HashAlg::Sha256).to_string();
        tracing::debug!(host = %self.host, %fingerprint, "server key received");
        self.hooks.debug("server host key received");
        if let Ok(mut slot) = self.fingerprint.lock() {
            *slot = Some(fingerprint);
        }
        // Acceptance here is provisional; the caller compares the recorded
        // fingerprint against its expected value before authenticating.
        Ok(true)
    }
}

/// Demultiplexed state of one exec channel.
struct Demux {
    channel: Option<russh::Channel<client::Msg>>,
    stdio: BytesMut,
    stderr: BytesMut,
    eof: bool,
    stdio_closed: bool,
    stderr_closed: bool,
    hooks: EventHooks,
}

impl Demux {
    fn buffer_mut(&mut self, kind: StreamKind) -> &mut BytesMut {
        match kind {
            StreamKind::Stdio => &mut self.stdio,
            StreamKind::Stderr => &mut self.stderr,
        }
    }

    /// Pull the next channel message into the side buffers.
    async fn pump(&mut self) {
        let Some(channel) = self.channel.as_mut() else {
            self.eof = true;
            return;
        };
        match channel.wait().await {
            Some(russh::ChannelMsg::Data { data }) => {
                self.stdio.extend_from_slice(data.as_ref());
            }
            Some(russh::ChannelMsg::ExtendedData { data, ext }) => {
                // ext 1 is stderr
                if ext == 1 {
                    self.stderr.extend_from_slice(data.as_ref());
                }
            }
            Some(russh::ChannelMsg::Eof | russh::ChannelMsg::Close) | None => {
                self.eof = true;
            }
            Some(_) => {
                self.hooks.ignore("unhandled channel message");
            }
        }
    }
}

/// Handle over one authenticated-or-not SSH link.
pub struct RusshHandle {
    handle: client::Handle<FleetHandler>,
    fingerprint: Arc<StdMutex<Option<String>>>,
    hooks: EventHooks,
}

/// Control side of one exec channel.
pub struct RusshChannel {
    shared: Arc<Mutex<Demux>>,
}

/// Readable side of one exec channel stream.
pub struct RusshStream {
    shared: Arc<Mutex<Demux>>,
    kind: StreamKind,
}

/// [`Transport`] implementation backed by the `russh` client.
#[derive(Debug, Default, Clone, Copy)]
pub struct RusshTransport;

impl RusshTransport {
    /// Create a transport with russh's default client configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Transport for RusshTransport {
    type Handle = RusshHandle;
    type Channel = RusshChannel;
    type Stream = RusshStream;

    async fn open(&mut self, config: &ConnectionConfig) -> Result<RusshHandle> {
        let ssh_config = Arc::new(client::Config::default());
        let fingerprint = Arc::new(StdMutex::new(None));
        let handler = FleetHandler {
            host: config.host.clone(),
            fingerprint: Arc::clone(&fingerprint),
            hooks: config.hooks.clone(),
        };

        if !config.options.methods().is_empty() {
            // russh negotiates algorithms itself; overrides are advisory.
            tracing::debug!(
                host = %config.host,
                methods = ?config.options.methods(),
                "method overrides noted"
            );
        }

        let addr = (config.host.as_str(), config.port);
        let handle = tokio::time::timeout(
            config.connect_timeout,
            client::connect(ssh_config, addr, handler),
        )
        .await
        .map_err(|_| {
            Error::transport(format!(
                "connection timed out after {:?}",
                config.connect_timeout
            ))
        })?
        .map_err(|e| Error::transport(e.to_string()))?;

        Ok(RusshHandle {
            handle,
            fingerprint,
            hooks: config.hooks.clone(),
        })
    }

    async fn fingerprint(&mut self, handle: &mut RusshHandle) -> Result<String> {
        handle
            .fingerprint
            .lock()
            .ok()
            .and_then(|slot| slot.clone())
            .ok_or_else(|| Error::transport("no server key seen on this connection"))
    }

    async fn auth_none(&mut self, handle: &mut RusshHandle, username: &str) -> Result<AuthOutcome> {
        let result = handle
            .handle
            .authenticate_none(username)
            .await
            .map_err(|e| Error::transport(e.to_string()))?;
        Ok(outcome(result))
    }

    async fn auth_password(
        &mut self,
        handle: &mut RusshHandle,
        username: &str,
        password: &str,
    ) -> Result<AuthOutcome> {
        let result = handle
            .handle
            .authenticate_password(username, password)
            .await
            .map_err(|e| Error::transport(e.to_string()))?;
        Ok(outcome(result))
    }

    async fn auth_key_pair(
        &mut self,
        handle: &mut RusshHandle,
        username: &str,
        private_key_path: &str,
        passphrase: Option<&str>,
    ) -> Result<AuthOutcome> {
        let key_data = tokio::fs::read(private_key_path)
            .await
            .map_err(|e| Error::transport(format!("failed to read key {private_key_path}: {e}")))?;
        let key_str = String::from_utf8(key_data).map_err(|e| {
            Error::transport(format!("key file {private_key_path} is not valid UTF-8: {e}"))
        })?;
        let key = russh::keys::decode_secret_key(&key_str, passphrase)
            .map_err(|e| Error::transport(format!("failed to decode key {private_key_path}: {e}")))?;

        // best_supported_rsa_hash returns Result<Option<Option<HashAlg>>, _>
        let rsa_hash = handle
            .handle
            .best_supported_rsa_hash()
            .await
            .ok()
            .flatten()
            .flatten();
        let key_with_hash = PrivateKeyWithHashAlg::new(Arc::new(key), rsa_hash);

        let result = handle
            .handle
            .authenticate_publickey(username, key_with_hash)
            .await
            .map_err(|e| Error::transport(e.to_string()))?;
        Ok(outcome(result))
    }

    async fn exec(&mut self, handle: &mut RusshHandle, command: &str) -> Result<RusshChannel> {
        let mut channel = handle
            .handle
            .channel_open_session()
            .await
            .map_err(|e| Error::transport(format!("channel open failed: {e}")))?;
        channel
            .exec(false, command)
            .await
            .map_err(|e| Error::transport(format!("exec request failed: {e}")))?;

        Ok(RusshChannel {
            shared: Arc::new(Mutex::new(Demux {
                channel: Some(channel),
                stdio: BytesMut::new(),
                stderr: BytesMut::new(),
                eof: false,
                stdio_closed: false,
                stderr_closed: false,
                hooks: handle.hooks.clone(),
            })),
        })
    }

    async fn fetch_stream(
        &mut self,
        channel: &mut RusshChannel,
        kind: StreamKind,
    ) -> Result<RusshStream> {
        Ok(RusshStream {
            shared: Arc::clone(&channel.shared),
            kind,
        })
    }

    async fn close_channel(&mut self, channel: RusshChannel) -> Result<()> {
        let mut demux = channel.shared.lock().await;
        if let Some(ch) = demux.channel.as_mut() {
            ch.eof()
                .await
                .map_err(|e| Error::transport(format!("channel close failed: {e}")))?;
        }
        Ok(())
    }

    async fn read_chunk(&mut self, stream: &mut RusshStream, max_len: usize) -> Result<Option<Bytes>> {
        let mut demux = stream.shared.lock().await;
        loop {
            let buffer = demux.buffer_mut(stream.kind);
            if !buffer.is_empty() {
                let take = usize::min(max_len, buffer.len());
                return Ok(Some(buffer.split_to(take).freeze()));
            }
            if demux.eof {
                return Ok(None);
            }
            demux.pump().await;
        }
    }

    async fn close_stream(&mut self, stream: RusshStream) -> Result<()> {
        let mut demux = stream.shared.lock().await;
        match stream.kind {
            StreamKind::Stdio => demux.stdio_closed = true,
            StreamKind::Stderr => demux.stderr_closed = true,
        }
        if demux.stdio_closed && demux.stderr_closed {
            demux.channel.take();
        }
        Ok(())
    }

    async fn close_handle(&mut self, handle: RusshHandle) -> Result<()> {
        handle
            .handle
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
            .map_err(|e| Error::transport(format!("disconnect failed: {e}")))
    }
}

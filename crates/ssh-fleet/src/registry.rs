//! Named session registry.
//!
//! Holds uniquely named connections in insertion order and broadcasts
//! operations across them. Unnamed sessions are assigned the current
//! registry size as their name, matching the positional naming callers of
//! the bulk API expect. The registry owns its connections; exclusive access
//! flows through `&mut self`, so bulk operations are naturally serialized.

use indexmap::IndexMap;
use serde::Serialize;

use crate::config::ConnectionConfig;
use crate::connection::{Connection, ExecOutput};
use crate::error::{Error, Result};
use crate::transport::Transport;

/// Raw credential material for one session. Only exposed through
/// [`SessionRegistry::list_with_credentials`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionCredentials {
    /// Configured password; empty when none-authentication is in use.
    pub password: String,
    /// Public key path; empty when key auth is not configured.
    pub public_key_path: String,
    /// Private key path; empty when key auth is not configured.
    pub private_key_path: String,
}

/// Read-only snapshot of one registered session.
///
/// Credentials are redacted unless the snapshot came from
/// [`SessionRegistry::list_with_credentials`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    /// Remote host.
    pub host: String,
    /// Remote port.
    pub port: u16,
    /// Username the session authenticates as.
    pub username: String,
    /// Whether the session currently holds a live handle.
    pub connected: bool,
    /// Raw credentials, present only in the opt-in listing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<SessionCredentials>,
}

impl SessionInfo {
    fn from_config(config: &ConnectionConfig, connected: bool, with_credentials: bool) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            username: config.username.clone(),
            connected,
            credentials: with_credentials.then(|| SessionCredentials {
                password: config.password.clone(),
                public_key_path: config.public_key_path.clone(),
                private_key_path: config.private_key_path.clone(),
            }),
        }
    }
}

/// Insertion-ordered registry of named sessions.
pub struct SessionRegistry<T: Transport> {
    sessions: IndexMap<String, Connection<T>>,
}

impl<T: Transport> Default for SessionRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> std::fmt::Debug for SessionRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("names", &self.names())
            .finish_non_exhaustive()
    }
}

impl<T: Transport> SessionRegistry<T> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: IndexMap::new(),
        }
    }

    /// Build, connect, and register a session; returns its name.
    ///
    /// Without a name the session is named after the current registry size.
    /// A name collision leaves the existing entry untouched, destroys the
    /// just-connected session so its handle does not leak, and fails with
    /// [`Error::Overwrite`].
    pub async fn create(
        &mut self,
        name: Option<&str>,
        config: ConnectionConfig,
        transport: T,
    ) -> Result<String> {
        let mut connection = Connection::new(config, transport);
        connection.connect().await?;
        self.add(name, connection).await
    }

    /// Register an already-built session under `name`; returns its name.
    ///
    /// Collision handling matches [`SessionRegistry::create`].
    pub async fn add(&mut self, name: Option<&str>, mut connection: Connection<T>) -> Result<String> {
        let name = name.map_or_else(|| self.sessions.len().to_string(), ToString::to_string);
        if self.sessions.contains_key(&name) {
            tracing::warn!(name, "session name collision, destroying new session");
            connection.destroy().await;
            return Err(Error::overwrite(name));
        }
        tracing::debug!(name, host = %connection.config().host, "session registered");
        self.sessions.insert(name.clone(), connection);
        Ok(name)
    }

    /// Look up a session by name.
    pub fn get(&self, name: &str) -> Result<&Connection<T>> {
        self.sessions
            .get(name)
            .ok_or_else(|| Error::unknown_session(name))
    }

    /// Look up a session by name for mutation.
    pub fn get_mut(&mut self, name: &str) -> Result<&mut Connection<T>> {
        self.sessions
            .get_mut(name)
            .ok_or_else(|| Error::unknown_session(name))
    }

    /// Execute a command on every session, sequentially in insertion order.
    ///
    /// One session's failure never affects another's: stream failures are
    /// recovered inside `execute`, and a session that is not connected
    /// contributes its error message as the stdio slot of its result.
    pub async fn execute_all(&mut self, command: &str) -> IndexMap<String, ExecOutput> {
        let mut results = IndexMap::with_capacity(self.sessions.len());
        for (name, connection) in &mut self.sessions {
            let output = match connection.execute(command).await {
                Ok(output) => output,
                Err(error) => ExecOutput {
                    stdio: error.to_string(),
                    stderr: String::new(),
                },
            };
            results.insert(name.clone(), output);
        }
        results
    }

    /// Snapshot every session with credentials redacted.
    #[must_use]
    pub fn list(&self) -> IndexMap<String, SessionInfo> {
        self.snapshot(false)
    }

    /// Snapshot every session including raw credential material.
    #[must_use]
    pub fn list_with_credentials(&self) -> IndexMap<String, SessionInfo> {
        self.snapshot(true)
    }

    fn snapshot(&self, with_credentials: bool) -> IndexMap<String, SessionInfo> {
        self.sessions
            .iter()
            .map(|(name, connection)| {
                (
                    name.clone(),
                    SessionInfo::from_config(
                        connection.config(),
                        connection.is_connected(),
                        with_credentials,
                    ),
                )
            })
            .collect()
    }

    /// Disconnect one session; its entry stays registered.
    pub async fn disconnect(&mut self, name: &str) -> Result<()> {
        self.get_mut(name)?.disconnect().await;
        Ok(())
    }

    /// Disconnect every session; all entries stay registered.
    pub async fn disconnect_all(&mut self) {
        for connection in self.sessions.values_mut() {
            connection.disconnect().await;
        }
    }

    /// Destroy one session and remove its entry.
    pub async fn destroy(&mut self, name: &str) -> Result<()> {
        let mut connection = self
            .sessions
            .shift_remove(name)
            .ok_or_else(|| Error::unknown_session(name))?;
        connection.destroy().await;
        Ok(())
    }

    /// Destroy every session, leaving the registry empty.
    pub async fn destroy_all(&mut self) {
        for (_, mut connection) in self.sessions.drain(..) {
            connection.destroy().await;
        }
    }

    /// Destroy every session. Explicit teardown for the end of a program;
    /// dropping the registry only closes handles non-gracefully.
    pub async fn shutdown(&mut self) {
        tracing::debug!(sessions = self.sessions.len(), "registry shutdown");
        self.destroy_all().await;
    }

    /// Registered names in insertion order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.sessions.keys().map(String::as_str).collect()
    }

    /// Number of registered sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

//! Connection configuration.
//!
//! [`ConnectionConfig`] is a typed builder covering everything a session
//! needs: endpoint, credentials, optional expected host fingerprint, stream
//! buffer sizing, command-log behavior, and transport options. Credential
//! dispatch is derived, not stored: [`ConnectionConfig::auth_method`] picks
//! the authentication method from the configured fields.

use std::time::Duration;

use crate::events::EventHooks;

/// Default SSH port.
pub const DEFAULT_PORT: u16 = 22;

/// Default stream read chunk size in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default wire prefix prepended to commands while logging is enabled.
///
/// An echoed marker makes logged invocations identifiable on the remote
/// side without altering the command's own output.
pub const DEFAULT_COMMAND_PREFIX: &str = "echo \"[ssh-fleet]\";";

/// Default advisory tag for the command log.
pub const DEFAULT_LOG_TYPE: &str = "volatile";

/// Authentication method derived from a [`ConnectionConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMethod {
    /// No credentials; ask the server for none-authentication.
    None,
    /// Password authentication.
    Password(String),
    /// Public-key authentication from on-disk key files.
    KeyPair {
        /// Path to the public key file.
        public_key_path: String,
        /// Path to the private key file.
        private_key_path: String,
        /// Passphrase for the private key, if it is encrypted.
        passphrase: Option<String>,
    },
}

/// Command-log behavior.
#[derive(Debug, Clone)]
pub struct LogSettings {
    /// Whether executed commands and their output are recorded.
    pub enabled: bool,
    /// Advisory tag describing where the log is meant to live.
    pub log_type: String,
    /// Prefix prepended to the wire command while logging is enabled.
    pub command_prefix: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            log_type: DEFAULT_LOG_TYPE.to_string(),
            command_prefix: DEFAULT_COMMAND_PREFIX.to_string(),
        }
    }
}

/// Transport-level options passed through to the wire layer.
#[derive(Debug, Clone, Default)]
pub struct TransportOptions {
    preferred_methods: Vec<String>,
}

impl TransportOptions {
    /// Create empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the preferred method/algorithm overrides.
    ///
    /// Empty entries are stripped; they carry no information and would
    /// otherwise leak into negotiation lists.
    #[must_use]
    pub fn preferred_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preferred_methods = methods
            .into_iter()
            .map(Into::into)
            .filter(|m| !m.is_empty())
            .collect();
        self
    }

    /// The configured method overrides, empty entries already stripped.
    #[must_use]
    pub fn methods(&self) -> &[String] {
        &self.preferred_methods
    }
}

/// Configuration for a managed SSH connection.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Host to connect to. Must be non-empty.
    pub host: String,
    /// Port (default 22).
    pub port: u16,
    /// Username to authenticate as.
    pub username: String,
    /// Password; empty selects none-authentication.
    pub password: String,
    /// Public key file path; empty when key auth is not configured.
    pub public_key_path: String,
    /// Private key file path; empty when key auth is not configured.
    pub private_key_path: String,
    /// Passphrase for an encrypted private key.
    pub private_key_passphrase: Option<String>,
    /// Expected host fingerprint, compared byte-for-byte when set.
    pub fingerprint: Option<String>,
    /// Stream read chunk size.
    pub buffer_size: usize,
    /// Connect timeout.
    pub connect_timeout: Duration,
    /// Overall timeout for one command execution; `None` means unbounded.
    pub exec_timeout: Option<Duration>,
    /// Command-log behavior.
    pub log: LogSettings,
    /// Transport options forwarded to the wire layer.
    pub options: TransportOptions,
    /// Out-of-band event hooks.
    pub hooks: EventHooks,
}

impl ConnectionConfig {
    /// Create a configuration for the given host with defaults everywhere
    /// else: port 22, empty credentials, logging enabled.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            username: String::new(),
            password: String::new(),
            public_key_path: String::new(),
            private_key_path: String::new(),
            private_key_passphrase: None,
            fingerprint: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            exec_timeout: None,
            log: LogSettings::default(),
            options: TransportOptions::default(),
            hooks: EventHooks::default(),
        }
    }

    /// Set the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the username.
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Set the password. An empty password selects none-authentication.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    /// Configure key-file authentication. When both paths are non-empty the
    /// keypair takes precedence over any configured password.
    #[must_use]
    pub fn key_pair(
        mut self,
        public_key_path: impl Into<String>,
        private_key_path: impl Into<String>,
        passphrase: Option<String>,
    ) -> Self {
        self.public_key_path = public_key_path.into();
        self.private_key_path = private_key_path.into();
        self.private_key_passphrase = passphrase;
        self
    }

    /// Set the expected host fingerprint.
    #[must_use]
    pub fn fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    /// Set the stream read chunk size.
    #[must_use]
    pub const fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set an overall timeout for a single command execution.
    #[must_use]
    pub const fn exec_timeout(mut self, timeout: Duration) -> Self {
        self.exec_timeout = Some(timeout);
        self
    }

    /// Replace the command-log settings.
    #[must_use]
    pub fn log_settings(mut self, log: LogSettings) -> Self {
        self.log = log;
        self
    }

    /// Enable or disable command logging.
    #[must_use]
    pub const fn log_enabled(mut self, enabled: bool) -> Self {
        self.log.enabled = enabled;
        self
    }

    /// Set the wire command prefix used while logging is enabled.
    #[must_use]
    pub fn command_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.log.command_prefix = prefix.into();
        self
    }

    /// Replace the transport options.
    #[must_use]
    pub fn transport_options(mut self, options: TransportOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the event hooks.
    #[must_use]
    pub fn event_hooks(mut self, hooks: EventHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Derive the authentication method from the configured credentials.
    ///
    /// A keypair wins whenever both key paths are non-empty; otherwise an
    /// empty password selects none-authentication.
    #[must_use]
    pub fn auth_method(&self) -> AuthMethod {
        if !self.public_key_path.is_empty() && !self.private_key_path.is_empty() {
            AuthMethod::KeyPair {
                public_key_path: self.public_key_path.clone(),
                private_key_path: self.private_key_path.clone(),
                passphrase: self.private_key_passphrase.clone(),
            }
        } else if self.password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::Password(self.password.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults() {
        let config = ConnectionConfig::new("example.com");
        assert_eq!(config.host, "example.com");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.buffer_size, DEFAULT_BUFFER_SIZE);
        assert!(config.log.enabled);
        assert_eq!(config.log.log_type, DEFAULT_LOG_TYPE);
        assert_eq!(config.log.command_prefix, DEFAULT_COMMAND_PREFIX);
        assert!(config.fingerprint.is_none());
        assert!(config.exec_timeout.is_none());
    }

    #[test]
    fn empty_password_selects_none_auth() {
        let config = ConnectionConfig::new("example.com").username("deploy");
        assert_eq!(config.auth_method(), AuthMethod::None);
    }

    #[test]
    fn password_auth_when_set() {
        let config = ConnectionConfig::new("example.com")
            .username("deploy")
            .password("hunter2");
        assert_eq!(
            config.auth_method(),
            AuthMethod::Password("hunter2".to_string())
        );
    }

    #[test]
    fn key_pair_takes_precedence_over_password() {
        let config = ConnectionConfig::new("example.com")
            .password("hunter2")
            .key_pair("/keys/id.pub", "/keys/id", None);
        assert!(matches!(config.auth_method(), AuthMethod::KeyPair { .. }));
    }

    #[test]
    fn half_configured_key_pair_falls_back_to_password() {
        let config = ConnectionConfig::new("example.com")
            .password("hunter2")
            .key_pair("", "/keys/id", None);
        assert_eq!(
            config.auth_method(),
            AuthMethod::Password("hunter2".to_string())
        );
    }

    #[test]
    fn transport_options_strip_empty_methods() {
        let options = TransportOptions::new().preferred_methods(["password", "", "publickey"]);
        assert_eq!(options.methods(), ["password", "publickey"]);
    }
}

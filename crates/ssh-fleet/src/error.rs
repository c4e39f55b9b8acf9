//! Error types for ssh-fleet.
//!
//! Errors are designed to be informative: connection errors name the host
//! they relate to, and stream failures that interrupted a command carry the
//! partial output captured before the failure so callers can still inspect
//! what the remote side produced.

use thiserror::Error;

/// Render the connection-closed notice used across connection errors.
fn format_closed_notice(host: &str) -> String {
    format!("Connection to {host} closed.")
}

/// Format a stream failure that interrupted a running command.
///
/// Partial stdio/stderr captured before the failure is embedded so the
/// caller still sees everything the remote side produced.
fn format_interrupted(host: &str, stdio: &str, stderr: &str) -> String {
    format!(
        "{}\nstdio: {stdio}\nstderr: {stderr}",
        format_closed_notice(host)
    )
}

/// The main error type for ssh-fleet operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A configuration value failed validation.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid value.
        message: String,
    },

    /// Connecting to or talking to a remote host failed.
    #[error("connection error for {host}: {reason}")]
    Connection {
        /// The host the connection belongs to.
        host: String,
        /// The reason for the failure.
        reason: String,
    },

    /// A command was interrupted mid-stream; partial output is preserved.
    #[error("{}", format_interrupted(host, stdio, stderr))]
    Interrupted {
        /// The host the connection belongs to.
        host: String,
        /// Stdio output captured before the failure.
        stdio: String,
        /// Stderr output captured before the failure.
        stderr: String,
    },

    /// Authentication against the remote host failed.
    #[error("authentication failed for {host}: {reason}")]
    Authentication {
        /// The host that rejected authentication.
        host: String,
        /// The reason for the failure.
        reason: String,
    },

    /// A session name is already taken in the registry.
    #[error("a session named '{name}' already exists")]
    Overwrite {
        /// The colliding session name.
        name: String,
    },

    /// A session name was not found in the registry.
    #[error("no session named '{name}' exists")]
    UnknownSession {
        /// The missing session name.
        name: String,
    },

    /// A wire-level transport failure outside the categories above.
    #[error("transport error: {reason}")]
    Transport {
        /// The reason for the failure.
        reason: String,
    },
}

/// Result type alias for ssh-fleet operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a connection error.
    pub fn connection(host: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Connection {
            host: host.into(),
            reason: reason.into(),
        }
    }

    /// Create a connection-closed error with no captured output.
    pub fn closed(host: impl Into<String>) -> Self {
        let host = host.into();
        let reason = format_closed_notice(&host);
        Self::Connection { host, reason }
    }

    /// Create an interrupted-command error carrying partial output.
    pub fn interrupted(
        host: impl Into<String>,
        stdio: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::Interrupted {
            host: host.into(),
            stdio: stdio.into(),
            stderr: stderr.into(),
        }
    }

    /// Create an authentication error.
    pub fn authentication(host: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Authentication {
            host: host.into(),
            reason: reason.into(),
        }
    }

    /// Create an overwrite error for a colliding session name.
    pub fn overwrite(name: impl Into<String>) -> Self {
        Self::Overwrite { name: name.into() }
    }

    /// Create an unknown-session error.
    pub fn unknown_session(name: impl Into<String>) -> Self {
        Self::UnknownSession { name: name.into() }
    }

    /// Create a transport error.
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Check if this is an authentication error.
    #[must_use]
    pub const fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Check if this is a connection error (including interrupted commands).
    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Interrupted { .. })
    }

    /// Get the partial output if this error carries it.
    #[must_use]
    pub fn partial_output(&self) -> Option<(&str, &str)> {
        match self {
            Self::Interrupted { stdio, stderr, .. } => Some((stdio, stderr)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_error_names_host() {
        let err = Error::connection("db01", "error connecting to server");
        let msg = err.to_string();
        assert!(msg.contains("db01"));
        assert!(msg.contains("error connecting to server"));
    }

    #[test]
    fn closed_error_carries_notice() {
        let err = Error::closed("db01");
        assert!(err.to_string().contains("Connection to db01 closed."));
    }

    #[test]
    fn interrupted_embeds_partial_output() {
        let err = Error::interrupted("web01", "partial out", "partial err");
        let msg = err.to_string();
        assert!(msg.contains("Connection to web01 closed."));
        assert!(msg.contains("partial out"));
        assert!(msg.contains("partial err"));
        assert_eq!(err.partial_output(), Some(("partial out", "partial err")));
    }

    #[test]
    fn overwrite_and_unknown_session_display() {
        assert!(
            Error::overwrite("prod")
                .to_string()
                .contains("'prod' already exists")
        );
        assert!(
            Error::unknown_session("prod")
                .to_string()
                .contains("no session named 'prod'")
        );
    }

    #[test]
    fn predicates() {
        assert!(Error::authentication("h", "r").is_authentication());
        assert!(Error::connection("h", "r").is_connection());
        assert!(Error::interrupted("h", "", "").is_connection());
        assert!(!Error::transport("r").is_connection());
        assert!(Error::connection("h", "r").partial_output().is_none());
    }
}

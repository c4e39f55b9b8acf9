//! Convenience re-exports for common usage.
//!
//! ```ignore
//! use ssh_fleet::prelude::*;
//! ```

pub use crate::config::{AuthMethod, ConnectionConfig, LogSettings, TransportOptions};
pub use crate::connection::{Connection, ConnectionState, ExecOutput};
pub use crate::error::{Error, Result};
pub use crate::events::EventHooks;
pub use crate::registry::{SessionInfo, SessionRegistry};
pub use crate::transport::{AuthOutcome, StreamKind, Transport};

#[cfg(feature = "russh")]
pub use crate::transport::russh::RusshTransport;

//! ssh-fleet: managed SSH sessions with a named registry.
//!
//! This crate manages authenticated remote-shell sessions: it walks each
//! connection through a small lifecycle state machine, executes commands
//! with separated stdio/stderr capture and an in-memory command log, and
//! keeps uniquely named sessions in an insertion-ordered registry for bulk
//! operations across a fleet of hosts.
//!
//! # Features
//!
//! - **Async-first design** with Tokio runtime
//! - **Transport-generic connections** so lifecycle and drain logic are
//!   testable against the in-memory [`mock::MockTransport`]
//! - **russh-backed transport** for real connections (feature: `russh`,
//!   enabled by default)
//! - **Named session registry** with sequential bulk execution in
//!   insertion order
//!
//! # Example
//!
//! ```ignore
//! use ssh_fleet::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let config = ConnectionConfig::new("web01.internal")
//!         .username("deploy")
//!         .password("secret");
//!
//!     let mut fleet = SessionRegistry::new();
//!     fleet.create(Some("web01"), config, RusshTransport::new()).await?;
//!
//!     let results = fleet.execute_all("uptime").await;
//!     for (name, output) in &results {
//!         println!("{name}: {}", output.stdio);
//!     }
//!
//!     fleet.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod log;
pub mod prelude;
pub mod registry;
pub mod transport;

/// Scripted in-memory transport for tests.
pub mod mock;

pub use config::{AuthMethod, ConnectionConfig, LogSettings, TransportOptions};
pub use connection::{Connection, ConnectionState, ExecOutput};
pub use error::{Error, Result};
pub use events::EventHooks;
pub use log::{CommandLog, LogEntry};
pub use mock::{MockExec, MockJournal, MockTransport};
pub use registry::{SessionCredentials, SessionInfo, SessionRegistry};
pub use transport::{AuthOutcome, StreamKind, Transport};

#[cfg(feature = "russh")]
pub use transport::russh::RusshTransport;

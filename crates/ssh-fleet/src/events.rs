//! Transport event hooks.
//!
//! The underlying transport can report out-of-band events while a session is
//! open: the server dropping the connection, debug messages, and packets the
//! transport decided to ignore. Defaults log through `tracing`; callers that
//! need to treat a disconnect as fatal inject their own handler.

use std::fmt;
use std::sync::Arc;

/// Callback invoked with a short event description.
pub type EventFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Hooks for out-of-band transport events.
#[derive(Clone)]
pub struct EventHooks {
    on_disconnect: EventFn,
    on_debug: EventFn,
    on_ignore: EventFn,
}

impl EventHooks {
    /// Create hooks with the default logging behavior.
    #[must_use]
    pub fn new() -> Self {
        Self {
            on_disconnect: Arc::new(|message| {
                tracing::warn!(message, "server closed the connection");
            }),
            on_debug: Arc::new(|message| {
                tracing::debug!(message, "server debug message");
            }),
            on_ignore: Arc::new(|message| {
                tracing::trace!(message, "ignored transport packet");
            }),
        }
    }

    /// Replace the disconnect handler.
    #[must_use]
    pub fn on_disconnect(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_disconnect = Arc::new(hook);
        self
    }

    /// Replace the debug-message handler.
    #[must_use]
    pub fn on_debug(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_debug = Arc::new(hook);
        self
    }

    /// Replace the ignored-packet handler.
    #[must_use]
    pub fn on_ignore(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_ignore = Arc::new(hook);
        self
    }

    /// Report a server-side disconnect.
    pub fn disconnect(&self, message: &str) {
        (self.on_disconnect)(message);
    }

    /// Report a server debug message.
    pub fn debug(&self, message: &str) {
        (self.on_debug)(message);
    }

    /// Report an ignored packet.
    pub fn ignore(&self, message: &str) {
        (self.on_ignore)(message);
    }
}

impl Default for EventHooks {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHooks").finish_non_exhaustive()
    }
}

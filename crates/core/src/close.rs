//! Close events
//!
//! Long-lived resources (connector processes, database connections) are not
//! released by whoever created them. They subscribe to a [`CloseEvents`]
//! channel and are closed together when the owner publishes the close event,
//! typically once at process shutdown.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::Result;

/// A resource released on the close event
pub trait Closeable: Send + Sync {
    /// Human-readable name for logging
    fn name(&self) -> &str;

    /// Release held resources
    fn close(&self) -> Result<()>;
}

/// Close-event channel
#[derive(Default)]
pub struct CloseEvents {
    subscribers: Mutex<Vec<Arc<dyn Closeable>>>,
}

impl CloseEvents {
    /// Create an empty channel
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource to be closed on [`publish`](Self::publish)
    pub fn subscribe(&self, resource: Arc<dyn Closeable>) {
        self.subscribers.lock().push(resource);
    }

    /// Number of pending subscribers
    pub fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// True if nothing is subscribed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close every subscriber, most recent first
    ///
    /// Failures are logged and do not stop the remaining closes. Returns the
    /// number of resources that closed cleanly. Subscribers are drained, so
    /// a second publish is a no-op.
    pub fn publish(&self) -> usize {
        let subscribers = std::mem::take(&mut *self.subscribers.lock());
        let mut closed = 0;
        for resource in subscribers.iter().rev() {
            match resource.close() {
                Ok(()) => {
                    debug!(target: "schemata::close", resource = resource.name(), "Closed");
                    closed += 1;
                }
                Err(e) => {
                    warn!(target: "schemata::close", resource = resource.name(), error = %e, "Close failed")
                }
            }
        }
        closed
    }
}

impl std::fmt::Debug for CloseEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloseEvents")
            .field("subscribers", &self.len())
            .finish()
    }
}

//! Process-wide shutdown coordination.
//!
//! A [`ControlState`] is cloned into the supervisor, both I/O tasks and the
//! signal handler. Requesting shutdown is idempotent and permanent: once set
//! the flag is never cleared, so a client built on it is single-shot.

use std::sync::Arc;

use tokio::sync::watch;

/// Shared "shutdown requested" flag with a blocking wait
#[derive(Debug, Clone)]
pub struct ControlState {
    shutdown: Arc<watch::Sender<bool>>,
}

impl Default for ControlState {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlState {
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            shutdown: Arc::new(shutdown),
        }
    }

    /// Ask every activity sharing this state to stop.
    ///
    /// Returns `true` only for the call that actually set the flag.
    pub fn request_shutdown(&self) -> bool {
        self.shutdown.send_if_modified(|requested| {
            if *requested {
                false
            } else {
                *requested = true;
                true
            }
        })
    }

    pub fn is_shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Wait until shutdown has been requested. Returns immediately if it already was.
    pub async fn wait(&self) {
        let mut changes = self.shutdown.subscribe();
        // The sender lives as long as `self`, so this cannot fail
        let _ = changes.wait_for(|requested| *requested).await;
    }

    /// Route SIGINT and SIGTERM to this state.
    ///
    /// The handler only logs and sets the flag; teardown is left to whoever is
    /// waiting on [`wait`](Self::wait). Only one handler can be installed per
    /// process.
    pub fn install_signal_handlers(&self) -> Result<(), ctrlc::Error> {
        let control = self.clone();
        ctrlc::set_handler(move || {
            if control.request_shutdown() {
                tracing::warn!("Interrupted, shutting down the connection");
            }
        })
    }
}

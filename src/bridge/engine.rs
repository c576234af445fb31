//! Bridge engine: shared-state construction and task wiring.

use std::sync::Arc;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::listener;
use super::reader;
use super::state::SharedState;
use crate::config::AppConfig;
use crate::error::Result;

/// The bridge engine. Owns the shared state and runs one task per logical
/// activity: tag stream client, status reporter, forwarder, accept loop.
pub struct Engine {
    config: Arc<AppConfig>,
    state: Arc<SharedState>,
}

impl Engine {
    /// Create an engine from an already-validated configuration.
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
            state: Arc::new(SharedState::new()),
        }
    }

    /// Run until process shutdown. Returns early only if the control
    /// listener cannot bind.
    pub async fn run(self) -> Result<()> {
        let listener = listener::bind(&self.config).await?;

        tokio::spawn(reader::run(self.config.clone(), self.state.clone()));
        tokio::spawn(status_reporter(self.config.clone(), self.state.clone()));
        tokio::spawn(forwarder(self.config.clone(), self.state.clone()));

        listener::accept_loop(listener, self.config, self.state).await;
        Ok(())
    }
}

/// Log the operational state every status interval.
pub(crate) async fn status_reporter(config: Arc<AppConfig>, state: Arc<SharedState>) {
    let interval = config.timing.status_interval();
    loop {
        sleep(interval).await;
        if state.is_live() {
            info!("System status: live");
        } else {
            info!("System status: idle");
        }
    }
}

/// Push the latest tag payload to the control session on every forward tick
/// while the bridge is live. The slot is read without consuming, so a stale
/// payload is re-sent until a newer frame overwrites it. A write failure is
/// logged and left for the session's read loop to act on.
pub(crate) async fn forwarder(config: Arc<AppConfig>, state: Arc<SharedState>) {
    let tick = config.timing.forward_interval();
    loop {
        sleep(tick).await;
        if !state.is_live() || !state.has_session() {
            continue;
        }
        let Some(frame) = state.latest_frame() else {
            debug!("No tag payload to send");
            continue;
        };
        match state.send_to_session(frame.as_bytes()).await {
            Ok(true) => debug!("Sent tag payload: {frame}"),
            Ok(false) => {}
            Err(e) => warn!("Payload send failed: {e}"),
        }
    }
}

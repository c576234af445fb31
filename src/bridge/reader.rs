//! Reconnecting client for the RFID tag stream.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::state::SharedState;
use crate::config::AppConfig;

/// Read chunk size for tag frames.
const READ_BUF_SIZE: usize = 1024;

/// Double the reconnect delay, capped at `max`.
pub(crate) fn next_backoff(current: Duration, max: Duration) -> Duration {
    (current * 2).min(max)
}

/// Keep a best-effort connection to the tag stream open and publish every
/// received frame. Consecutive connect failures back off exponentially; a
/// successful connect or a clean remote close resets the delay to the
/// initial value. Never returns and never propagates an error.
pub(crate) async fn run(config: Arc<AppConfig>, state: Arc<SharedState>) {
    let addr = format!("{}:{}", config.source.host, config.source.port);
    let initial = config.timing.backoff_initial();
    let max = config.timing.backoff_max();
    let mut backoff = initial;

    loop {
        debug!("Connecting to tag stream at {addr}");
        match TcpStream::connect(&addr).await {
            Ok(stream) => {
                info!("Connected to tag stream at {addr}");
                backoff = initial;
                read_frames(stream, &state).await;
            }
            Err(e) => {
                warn!("Tag stream connect failed: {e}, retrying in {backoff:?}");
                sleep(backoff).await;
                backoff = next_backoff(backoff, max);
                continue;
            }
        }
        // Stream ended; a disconnect is a fresh failure, so the next
        // attempt waits the initial delay rather than deepening the series.
        sleep(backoff).await;
    }
}

/// Read tag frames until the stream closes or errors. Each non-empty frame
/// is trimmed and published to the latest-payload slot; while the bridge is
/// live it is also pushed to the control session immediately instead of
/// waiting for the next forwarder tick.
async fn read_frames(mut stream: TcpStream, state: &SharedState) {
    let mut buf = [0u8; READ_BUF_SIZE];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) => {
                info!("Tag stream closed by remote");
                return;
            }
            Ok(n) => {
                let frame = String::from_utf8_lossy(&buf[..n]).trim().to_string();
                if frame.is_empty() {
                    continue;
                }
                debug!("Received tag frame: {frame}");
                state.publish(frame.clone());

                if state.is_live() {
                    match state.send_to_session(frame.as_bytes()).await {
                        Ok(true) => debug!("Relayed tag frame to control session"),
                        Ok(false) => {}
                        Err(e) => warn!("Tag frame relay failed: {e}"),
                    }
                }
            }
            Err(e) => {
                warn!("Tag stream read failed: {e}");
                return;
            }
        }
    }
}

//! Accept loop for timing-system control connections.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use super::session;
use super::state::SharedState;
use crate::config::AppConfig;
use crate::error::Result;

/// Bind the control port. A bind failure is the one startup-fatal error of
/// the engine.
pub(crate) async fn bind(config: &AppConfig) -> Result<TcpListener> {
    let addr = format!("{}:{}", config.control.listen_ip, config.control.listen_port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening for RR12 on {addr}");
    Ok(listener)
}

/// Accept control connections forever. Each accept installs the new
/// connection as the single current session, replacing the previous one,
/// and spawns a handler for its command loop. Accept failures are logged
/// and the loop continues.
pub(crate) async fn accept_loop(listener: TcpListener, config: Arc<AppConfig>, state: Arc<SharedState>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                info!("RR12 connected from {peer}");
                let (read_half, write_half) = stream.into_split();
                let writer = Arc::new(tokio::sync::Mutex::new(write_half));
                state.attach_session(writer.clone());
                tokio::spawn(session::serve(read_half, writer, config.clone(), state.clone()));
            }
            Err(e) => {
                warn!("Accept failed: {e}");
            }
        }
    }
}

//! Control session handler for one accepted timing-system connection.

use std::sync::Arc;

use chrono::Local;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedReadHalf;
use tracing::{debug, info, warn};

use super::codec::{Command, Response, parse_command};
use super::state::{SessionWriter, SharedState};
use crate::config::AppConfig;

/// Read chunk size for command lines.
const READ_BUF_SIZE: usize = 1024;

/// Map a parsed command to its reply, applying the GO_LIVE state effect.
/// Commands without a mandated reply return `None`.
pub(crate) fn dispatch(command: &Command, config: &AppConfig, state: &SharedState) -> Option<Response> {
    match command {
        Command::SetProtocol(Some(version)) => {
            if *version >= config.protocol.version {
                Some(Response::ProtocolAccepted(config.protocol.version))
            } else {
                Some(Response::UnsupportedProtocolVersion)
            }
        }
        Command::SetProtocol(None) => Some(Response::InvalidProtocolFormat),
        Command::GetConfigBoxName => Some(Response::BoxName(config.protocol.device_id.clone())),
        Command::GoLive => {
            state.go_live();
            info!("System is live");
            None
        }
        Command::GetStatus => Some(Response::Status(Local::now())),
        Command::Unrecognized(raw) => {
            warn!("Unrecognized command: {raw}");
            None
        }
    }
}

/// Serve one control session: sequential command/response loop until the
/// transport dies. Replies go through this session's own writer handle, so
/// a superseded session keeps answering its commands until its read side
/// closes.
pub(crate) async fn serve(
    mut reader: OwnedReadHalf,
    writer: SessionWriter,
    config: Arc<AppConfig>,
    state: Arc<SharedState>,
) {
    let mut buf = [0u8; READ_BUF_SIZE];
    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                info!("Control session closed by peer");
                break;
            }
            Ok(n) => n,
            Err(e) => {
                warn!("Control session read failed: {e}");
                break;
            }
        };

        // Garbled bytes decode lossily; a bad line never ends the session,
        // only a transport-level read failure does.
        let line = String::from_utf8_lossy(&buf[..n]).trim().to_string();
        if line.is_empty() {
            continue;
        }
        debug!("Received from RR12: {line}");

        let command = parse_command(&line);
        if let Some(response) = dispatch(&command, &config, &state) {
            let bytes = response.to_bytes();
            let mut w = writer.lock().await;
            match w.write_all(&bytes).await {
                Ok(()) => debug!("Replied: {}", String::from_utf8_lossy(&bytes).trim_end()),
                Err(e) => warn!("Control session write failed: {e}"),
            }
        }
    }
    state.detach_session(&writer);
}

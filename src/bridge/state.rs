//! Shared bridge state: operational flag, latest payload, current session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;

/// Write half of the current control session, shared between the session
/// handler (command replies) and the forwarding paths (payload pushes).
pub(crate) type SessionWriter = Arc<tokio::sync::Mutex<OwnedWriteHalf>>;

/// State shared by every bridge task. One instance per engine, handed out
/// by `Arc` at construction.
pub(crate) struct SharedState {
    live: AtomicBool,
    latest: Mutex<Option<String>>,
    session: Mutex<Option<SessionWriter>>,
}

impl SharedState {
    pub(crate) fn new() -> Self {
        Self {
            live: AtomicBool::new(false),
            latest: Mutex::new(None),
            session: Mutex::new(None),
        }
    }

    /// Gate for payload forwarding. Starts idle; GO_LIVE flips it once and
    /// nothing flips it back.
    pub(crate) fn is_live(&self) -> bool {
        self.live.load(Ordering::Relaxed)
    }

    pub(crate) fn go_live(&self) {
        self.live.store(true, Ordering::Relaxed);
    }

    /// Overwrite the latest-payload slot. Last write wins; superseded
    /// payloads are dropped, never queued.
    pub(crate) fn publish(&self, frame: String) {
        let mut slot = self.latest.lock().expect("payload slot poisoned");
        *slot = Some(frame);
    }

    /// Clone out the latest payload. The slot is never consumed, so the
    /// same payload may be re-sent on consecutive forwarder ticks.
    pub(crate) fn latest_frame(&self) -> Option<String> {
        self.latest.lock().expect("payload slot poisoned").clone()
    }

    /// Install the writer of a newly accepted session, replacing any
    /// previous one.
    pub(crate) fn attach_session(&self, writer: SessionWriter) {
        let mut slot = self.session.lock().expect("session slot poisoned");
        *slot = Some(writer);
    }

    /// Clear the session slot only if it still holds `writer`. A handler
    /// calls this when its transport dies; a newer session must not be
    /// clobbered.
    pub(crate) fn detach_session(&self, writer: &SessionWriter) {
        let mut slot = self.session.lock().expect("session slot poisoned");
        if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, writer)) {
            *slot = None;
        }
    }

    pub(crate) fn has_session(&self) -> bool {
        self.session.lock().expect("session slot poisoned").is_some()
    }

    fn current_session(&self) -> Option<SessionWriter> {
        self.session.lock().expect("session slot poisoned").clone()
    }

    /// Write `bytes` to the current session, if one is attached. Returns
    /// `Ok(false)` when no session exists; write failures surface as `Err`
    /// for the caller to log. The slot lock is released before the write,
    /// only the writer's own lock is held across it.
    pub(crate) async fn send_to_session(&self, bytes: &[u8]) -> std::io::Result<bool> {
        let Some(writer) = self.current_session() else {
            return Ok(false);
        };
        let mut writer = writer.lock().await;
        writer.write_all(bytes).await?;
        Ok(true)
    }
}

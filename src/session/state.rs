//! In-memory per-session state.
//!
//! Never persisted. Exclusively owned by the orchestrator behind the
//! registry's per-session mutex; snapshots may be taken, but references
//! are not held across suspension points.

use crate::session::messages::{ServerMessage, SocketSender};
use crate::session::streaming::StreamingTranscriber;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::debug;

pub struct SessionState {
    pub session_id: String,

    /// Outbound handle to the currently attached socket, if any.
    /// Swapped on reconnect; everything else in this struct survives.
    pub socket: Option<SocketSender>,

    /// Cumulative PCM in exact receive order. Grows ~32 KiB/s at 16kHz
    /// mono 16-bit (~115 MiB/hour); this buffer is the session's memory
    /// bound. Snapshotted once at finalization.
    pub pcm: Vec<u8>,

    pub frames_received: u64,
    pub last_audio_at: tokio::time::Instant,

    /// Throttle for `recording-status` emissions.
    pub last_status_at: Option<tokio::time::Instant>,

    /// Lazily constructed on the first validated audio frame.
    pub streaming: Option<StreamingTranscriber>,

    /// Consumer task draining the streaming transcriber's events.
    pub streaming_events_task: Option<JoinHandle<()>>,

    pub suggestion_last_run: Option<tokio::time::Instant>,
    pub initial_suggestions_done: bool,
    /// Window-final transcripts inside the rolling suggestion window.
    pub recent_finals: Vec<(DateTime<Utc>, String)>,

    pub watchdog: Option<JoinHandle<()>>,

    /// Emitted the key-missing refusal once already.
    pub provider_refusal_sent: bool,

    /// Set by the first stop; audio arriving afterwards is dropped and a
    /// second stop returns the optimistic snapshot without a second
    /// finalization run.
    pub stopped: bool,
}

impl SessionState {
    pub fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            socket: None,
            pcm: Vec::new(),
            frames_received: 0,
            last_audio_at: tokio::time::Instant::now(),
            last_status_at: None,
            streaming: None,
            streaming_events_task: None,
            suggestion_last_run: None,
            initial_suggestions_done: false,
            recent_finals: Vec::new(),
            watchdog: None,
            provider_refusal_sent: false,
            stopped: false,
        }
    }

    /// Best-effort send to the attached socket; a closed or missing
    /// socket is not an error.
    pub fn emit(&self, message: ServerMessage) {
        if let Some(socket) = &self.socket {
            if socket.send(message).is_err() {
                debug!("Socket for session {} is gone", self.session_id);
            }
        }
    }

    /// Drop window-finals that fell out of the rolling window and count
    /// the words remaining.
    pub fn recent_final_words(&mut self, window_secs: u64, now: DateTime<Utc>) -> usize {
        let cutoff = now - chrono::Duration::seconds(window_secs as i64);
        self.recent_finals.retain(|(at, _)| *at >= cutoff);
        self.recent_finals
            .iter()
            .map(|(_, text)| text.split_whitespace().count())
            .sum()
    }

    pub fn abort_watchdog(&mut self) {
        if let Some(handle) = self.watchdog.take() {
            handle.abort();
        }
    }
}

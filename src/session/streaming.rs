//! Rolling streaming transcriber.
//!
//! Produces partial transcripts for live display by flushing a rolling
//! window of PCM to the provider. True word-level streaming is not
//! available from the target provider; discrete windows bound latency to
//! a few seconds while keeping provider calls bounded.

use crate::audio::{pcm_duration_secs, wrap_pcm_as_wav};
use crate::providers::{SpeechToText, TranscribeOptions};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Windows whose WAV form exceeds this are dropped. Impossible under
/// normal flush timing; guards against a stalled provider backing up
/// the window.
const WINDOW_WAV_CAP_BYTES: usize = 25 * 1024 * 1024;

/// How often the flush gate is evaluated.
const TICK_PERIOD: std::time::Duration = std::time::Duration::from_secs(1);

#[derive(Debug, Clone)]
pub enum StreamingEvent {
    /// A completed window's transcription. Final with respect to its
    /// window; the end-of-session pass remains authoritative.
    Partial {
        text: String,
        language: Option<String>,
        timestamp: DateTime<Utc>,
    },
    /// A provider failure for one window. The transcriber keeps running
    /// and the next window tries again.
    Error { message: String },
}

pub struct StreamingTranscriber {
    inner: Arc<Inner>,
    tick_task: Mutex<Option<JoinHandle<()>>>,
}

struct Inner {
    /// Drained on each flush.
    window: Mutex<Vec<u8>>,
    /// Mirrors every byte ever sent; survives `close`.
    complete: Mutex<Vec<u8>>,
    last_flush: Mutex<tokio::time::Instant>,
    closed: AtomicBool,
    events: mpsc::UnboundedSender<StreamingEvent>,
    stt: Arc<dyn SpeechToText>,
    opts: TranscribeOptions,
    sample_rate: u32,
    flush_after: std::time::Duration,
    min_window_bytes: usize,
}

impl StreamingTranscriber {
    pub fn new(
        sample_rate: u32,
        language: Option<String>,
        tenant_id: &str,
        model: &str,
        flush_interval_secs: u64,
        min_window_secs: f64,
        stt: Arc<dyn SpeechToText>,
        events: mpsc::UnboundedSender<StreamingEvent>,
    ) -> Self {
        let inner = Arc::new(Inner {
            window: Mutex::new(Vec::new()),
            complete: Mutex::new(Vec::new()),
            last_flush: Mutex::new(tokio::time::Instant::now()),
            closed: AtomicBool::new(false),
            events,
            stt,
            opts: TranscribeOptions {
                tenant_id: tenant_id.to_string(),
                model: model.to_string(),
                language,
                diarize: false,
            },
            sample_rate,
            flush_after: std::time::Duration::from_secs(flush_interval_secs),
            min_window_bytes: (min_window_secs * sample_rate as f64 * 2.0) as usize,
        });

        let tick_inner = Arc::clone(&inner);
        let tick_task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(TICK_PERIOD);
            ticker.tick().await; // first tick completes immediately
            loop {
                ticker.tick().await;
                if tick_inner.closed.load(Ordering::SeqCst) {
                    break;
                }
                tick_inner.maybe_flush(false).await;
            }
        });

        Self {
            inner,
            tick_task: Mutex::new(Some(tick_task)),
        }
    }

    /// Non-blocking append. A no-op after `close`.
    pub fn send(&self, pcm: &[u8]) {
        if self.inner.closed.load(Ordering::SeqCst) {
            return;
        }
        self.inner
            .window
            .lock()
            .expect("window lock")
            .extend_from_slice(pcm);
        self.inner
            .complete
            .lock()
            .expect("complete lock")
            .extend_from_slice(pcm);
    }

    /// Every byte sent so far, in order. Valid before and after `close`.
    pub fn get_complete(&self) -> Vec<u8> {
        self.inner.complete.lock().expect("complete lock").clone()
    }

    /// Terminal: cancels the tick and flushes the remaining window if it
    /// holds enough audio. Subsequent `send` calls are no-ops.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(task) = self.tick_task.lock().expect("tick lock").take() {
            task.abort();
        }
        self.inner.maybe_flush(true).await;
    }
}

impl Inner {
    /// Flush gate: at least `flush_after` since the last flush and at
    /// least `min_window_bytes` of audio accumulated. `force` skips the
    /// time gate only.
    async fn maybe_flush(self: &Arc<Self>, force: bool) {
        let window = {
            let mut last_flush = self.last_flush.lock().expect("last_flush lock");
            let now = tokio::time::Instant::now();
            if !force && now.duration_since(*last_flush) < self.flush_after {
                return;
            }
            let mut window = self.window.lock().expect("window lock");
            if window.len() < self.min_window_bytes {
                return;
            }
            *last_flush = now;
            std::mem::take(&mut *window)
        };

        self.flush_window(window).await;
    }

    async fn flush_window(&self, pcm: Vec<u8>) {
        let duration = pcm_duration_secs(pcm.len(), self.sample_rate);
        let wav = wrap_pcm_as_wav(&pcm, self.sample_rate);
        if wav.len() > WINDOW_WAV_CAP_BYTES {
            warn!(
                "Dropping oversize streaming window: {} bytes of WAV",
                wav.len()
            );
            return;
        }

        debug!("Flushing streaming window: {:.1}s of audio", duration);

        // Best-effort: one retry on retryable failures, then surface.
        let mut result = self.stt.transcribe_wav(wav.clone(), &self.opts).await;
        if matches!(&result, Err(e) if e.is_retryable()) {
            result = self.stt.transcribe_wav(wav, &self.opts).await;
        }

        match result {
            Ok(transcript) => {
                let text = transcript.text.trim().to_string();
                if !text.is_empty() {
                    let _ = self.events.send(StreamingEvent::Partial {
                        text,
                        language: transcript.language,
                        timestamp: Utc::now(),
                    });
                }
            }
            Err(e) => {
                let _ = self.events.send(StreamingEvent::Error {
                    message: e.to_string(),
                });
            }
        }
    }
}

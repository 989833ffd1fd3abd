//! Remote speech-to-text provider client.
//!
//! Submits WAV audio as a multipart upload and parses the provider's
//! verbose-JSON response (text, language, duration, per-segment
//! timestamps, optional diarization labels). The provider enforces a
//! 25 MiB request cap; callers are responsible for chunking under it.

use crate::providers::keys::Keyring;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Messages the provider uses for failures that clear up on retry.
const TRANSIENT_MESSAGE_MARKERS: [&str; 4] = [
    "something went wrong",
    "temporary",
    "timeout",
    "reading your request",
];

#[derive(Error, Debug)]
pub enum SttError {
    #[error("no provider key configured for tenant {tenant_id}")]
    KeyMissing { tenant_id: String },

    #[error("transcription request failed ({status:?}): {message}")]
    Http { status: Option<u16>, message: String },

    #[error("failed to parse transcription response: {0}")]
    Parse(String),
}

impl SttError {
    /// Whether a retry has a chance of succeeding: server errors, rate
    /// limits, network failures, and the provider's known-transient 4xx
    /// messages.
    pub fn is_retryable(&self) -> bool {
        match self {
            SttError::Http { status, message } => match status {
                None => true,
                Some(429) => true,
                Some(s) if *s >= 500 => true,
                Some(s) if *s >= 400 => {
                    let lower = message.to_lowercase();
                    TRANSIENT_MESSAGE_MARKERS.iter().any(|m| lower.contains(m))
                }
                _ => false,
            },
            SttError::KeyMissing { .. } | SttError::Parse(_) => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TranscribeOptions {
    pub tenant_id: String,
    pub model: String,
    pub language: Option<String>,
    /// Request segment-level speaker labels and the auto chunking hint.
    pub diarize: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ProviderSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub speaker_id: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct ProviderTranscript {
    pub text: String,
    pub language: Option<String>,
    pub duration: f64,
    pub segments: Vec<ProviderSegment>,
}

#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Whether a provider key is available for the tenant. Checked before
    /// a session enters Recording.
    fn is_ready(&self, tenant_id: &str) -> bool;

    async fn transcribe_wav(
        &self,
        wav: Vec<u8>,
        opts: &TranscribeOptions,
    ) -> Result<ProviderTranscript, SttError>;
}

// ============================================================================
// HTTP implementation
// ============================================================================

#[derive(Debug, Deserialize)]
struct VerboseTranscription {
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    duration: f64,
    #[serde(default)]
    segments: Vec<VerboseSegment>,
}

#[derive(Debug, Deserialize)]
struct VerboseSegment {
    #[serde(default)]
    start: f64,
    #[serde(default)]
    end: f64,
    text: String,
    #[serde(default)]
    speaker: Option<serde_json::Value>,
}

impl VerboseSegment {
    /// Diarization labels arrive either as integers or as strings like
    /// `"speaker_2"`; both collapse to the opaque integer id.
    fn speaker_id(&self) -> Option<i32> {
        match &self.speaker {
            Some(serde_json::Value::Number(n)) => n.as_i64().map(|v| v as i32),
            Some(serde_json::Value::String(s)) => s
                .rsplit(['_', ' '])
                .next()
                .and_then(|tail| tail.parse::<i32>().ok()),
            _ => None,
        }
    }
}

pub struct HttpSpeechToText {
    client: reqwest::Client,
    base_url: String,
    keyring: Arc<dyn Keyring>,
}

impl HttpSpeechToText {
    pub fn new(base_url: &str, keyring: Arc<dyn Keyring>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            keyring,
        }
    }
}

#[async_trait]
impl SpeechToText for HttpSpeechToText {
    fn is_ready(&self, tenant_id: &str) -> bool {
        self.keyring.api_key(tenant_id).is_some()
    }

    async fn transcribe_wav(
        &self,
        wav: Vec<u8>,
        opts: &TranscribeOptions,
    ) -> Result<ProviderTranscript, SttError> {
        let api_key = self
            .keyring
            .api_key(&opts.tenant_id)
            .ok_or_else(|| SttError::KeyMissing {
                tenant_id: opts.tenant_id.clone(),
            })?;

        let wav_len = wav.len();
        let file = reqwest::multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| SttError::Parse(e.to_string()))?;

        let mut form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("model", opts.model.clone())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "segment");

        if let Some(language) = &opts.language {
            form = form.text("language", language.clone());
        }
        if opts.diarize {
            form = form.text("chunking_strategy", "auto");
        }

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| SttError::Http {
                status: None,
                message: format!("request failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(SttError::Http {
                status: Some(status.as_u16()),
                message: body,
            });
        }

        let parsed: VerboseTranscription = response
            .json()
            .await
            .map_err(|e| SttError::Parse(e.to_string()))?;

        debug!(
            "Transcribed {} bytes of WAV: {:.1}s, {} segments",
            wav_len,
            parsed.duration,
            parsed.segments.len()
        );

        Ok(ProviderTranscript {
            text: parsed.text,
            language: parsed.language,
            duration: parsed.duration,
            segments: parsed
                .segments
                .iter()
                .map(|s| ProviderSegment {
                    start: s.start,
                    end: s.end,
                    text: s.text.trim().to_string(),
                    speaker_id: s.speaker_id(),
                })
                .collect(),
        })
    }
}

// ============================================================================
// Mock implementation (tests, offline runs)
// ============================================================================

/// Scriptable in-process provider. Returns a transcript whose duration is
/// derived from the submitted WAV size, so stitching math is exercised
/// without a network.
pub struct MockSpeechToText {
    ready: bool,
    text: String,
    language: Option<String>,
    terminal_failure: Option<(u16, String)>,
    failures_before_success: u32,
    remaining_failures: std::sync::atomic::AtomicU32,
    calls: std::sync::Mutex<Vec<usize>>,
}

impl Default for MockSpeechToText {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSpeechToText {
    pub fn new() -> Self {
        Self {
            ready: true,
            text: "mock transcription".to_string(),
            language: Some("english".to_string()),
            terminal_failure: None,
            failures_before_success: 0,
            remaining_failures: std::sync::atomic::AtomicU32::new(0),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string());
        self
    }

    pub fn not_ready(mut self) -> Self {
        self.ready = false;
        self
    }

    /// Every call fails with the given status.
    pub fn failing_with_status(mut self, status: u16, message: &str) -> Self {
        self.terminal_failure = Some((status, message.to_string()));
        self
    }

    /// Each call sequence returns `n` retryable 500s before succeeding,
    /// then arms again for the next sequence.
    pub fn with_failures_before_success(self, n: u32) -> Self {
        self.remaining_failures
            .store(n, std::sync::atomic::Ordering::SeqCst);
        Self {
            failures_before_success: n,
            ..self
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("calls lock").len()
    }

    /// WAV byte sizes of every submitted request, in call order.
    pub fn call_sizes(&self) -> Vec<usize> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl SpeechToText for MockSpeechToText {
    fn is_ready(&self, _tenant_id: &str) -> bool {
        self.ready
    }

    async fn transcribe_wav(
        &self,
        wav: Vec<u8>,
        _opts: &TranscribeOptions,
    ) -> Result<ProviderTranscript, SttError> {
        self.calls.lock().expect("calls lock").push(wav.len());

        if let Some((status, message)) = &self.terminal_failure {
            return Err(SttError::Http {
                status: Some(*status),
                message: message.clone(),
            });
        }

        use std::sync::atomic::Ordering;
        let remaining = self.remaining_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.remaining_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(SttError::Http {
                status: Some(500),
                message: "internal server error".to_string(),
            });
        }
        self.remaining_failures
            .store(self.failures_before_success, Ordering::SeqCst);

        let pcm_len = wav.len().saturating_sub(crate::audio::WAV_HEADER_BYTES);
        let duration = crate::audio::pcm_duration_secs(pcm_len, 16000);
        Ok(ProviderTranscript {
            text: self.text.clone(),
            language: self.language.clone(),
            duration,
            segments: vec![ProviderSegment {
                start: 0.0,
                end: duration,
                text: self.text.clone(),
                speaker_id: Some(0),
            }],
        })
    }
}

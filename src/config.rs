use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub session: SessionTuning,
    #[serde(default)]
    pub providers: ProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// Sample rate the device is required to send (no server-side resampling)
    pub sample_rate: u32,
    pub channels: u16,
    /// Inbound frames larger than this are dropped
    pub max_frame_bytes: usize,
}

/// Tunables for the per-session state machine.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionTuning {
    /// Seconds between streaming window flushes
    pub flush_interval_secs: u64,
    /// Minimum audio a window must hold before it is flushed, in seconds
    pub min_window_secs: f64,
    /// Silence threshold before the watchdog auto-stops, in seconds
    pub inactivity_timeout_secs: u64,
    /// How often the watchdog scans for silence, in seconds
    pub watchdog_period_secs: u64,
    /// Minimum seconds between rolling suggestion runs
    pub suggestion_interval_secs: u64,
    /// Final-transcript words required in the rolling window before a suggestion run
    pub suggestion_min_words: usize,
    /// Width of the rolling final-transcript window, in seconds
    pub suggestion_window_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// API key for the transcription and generation providers.
    /// Overridable per tenant through the keyring.
    pub api_key: Option<String>,
    pub base_url: String,
    /// Model used for streaming window transcription
    pub stt_model: String,
    /// Diarization-capable model used for the full-audio pass
    pub diarization_model: String,
    /// Chat model used for question generation and summaries
    pub chat_model: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "pitchroom".to_string(),
            http: HttpConfig {
                bind: "127.0.0.1".to_string(),
                port: 3000,
            },
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000, // STT providers expect 16kHz
            channels: 1,        // Mono
            max_frame_bytes: 1024 * 1024,
        }
    }
}

impl Default for SessionTuning {
    fn default() -> Self {
        Self {
            flush_interval_secs: 5,
            min_window_secs: 1.0,
            inactivity_timeout_secs: 240, // 4 minutes
            watchdog_period_secs: 30,
            suggestion_interval_secs: 60,
            suggestion_min_words: 50,
            suggestion_window_secs: 180, // 3 minutes
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            stt_model: "whisper-1".to_string(),
            diarization_model: "whisper-1".to_string(),
            chat_model: "gpt-4o".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a file, layered with `PITCHROOM_*` environment
    /// variables (e.g. `PITCHROOM_PROVIDERS__API_KEY`).
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("PITCHROOM").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

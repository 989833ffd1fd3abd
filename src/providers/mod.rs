//! Remote provider clients: speech-to-text and text generation.
//!
//! Clients are shared, thread-safe singletons. Per-tenant API keys are
//! resolved through the [`Keyring`] seam on each call.

pub mod keys;
pub mod llm;
pub mod stt;

pub use keys::{ConfigKeyring, Keyring};
pub use llm::{ChatCompletionsClient, LlmError, MockTextGenerator, TextGenerator};
pub use stt::{
    HttpSpeechToText, MockSpeechToText, ProviderSegment, ProviderTranscript, SpeechToText,
    SttError, TranscribeOptions,
};

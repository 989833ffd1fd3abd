//! Live session orchestration.
//!
//! The per-session state machine and its sub-tasks:
//! - attach/detach and the registry of live sessions
//! - streaming window transcription for live partials
//! - the rolling suggestion generator and its de-duplication
//! - the inactivity watchdog
//! - stop and the end-of-session finalization pipeline

pub mod context;
pub mod full_audio;
pub mod messages;
pub mod orchestrator;
pub mod registry;
pub mod state;
pub mod streaming;
pub mod suggest;
pub mod summary;
pub mod watchdog;

pub use full_audio::{CompleteTranscript, FullAudioOptions, FullAudioTranscriber};
pub use messages::{ClientMessage, QuestionView, ServerMessage, SocketSender};
pub use orchestrator::{Orchestrator, StopReason, StopSnapshot};
pub use registry::{SessionRegistry, SharedSessionState};
pub use state::SessionState;
pub use streaming::{StreamingEvent, StreamingTranscriber};
pub use suggest::{GeneratedSuggestions, SuggestionEngine};

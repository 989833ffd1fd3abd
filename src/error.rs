//! Error types for pitchroom.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PitchroomError {
    // Session lifecycle errors
    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("Session {session_id} is not active (status: {status})")]
    SessionInactive { session_id: String, status: String },

    #[error("Invalid session request: {message}")]
    InvalidSession { message: String },

    #[error("Failed to join session: {message}")]
    Join { message: String },

    // Provider errors
    #[error("No transcription provider key configured")]
    ProviderKeyMissing,

    #[error("Transcription failed: {message}")]
    Transcription { message: String },

    #[error("Generation failed: {message}")]
    Generation { message: String },

    // Audio errors
    #[error("Audio too short to transcribe: {duration_secs:.3}s")]
    AudioTooShort { duration_secs: f64 },

    #[error("Audio frame rejected: {message}")]
    AudioFrame { message: String },

    // Persistence errors
    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Question not found: {question_id}")]
    QuestionNotFound { question_id: String },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl PitchroomError {
    /// Stable wire code emitted on the attach channel's `error` message.
    pub fn code(&self) -> &'static str {
        match self {
            PitchroomError::SessionNotFound { .. } => "SESSION_NOT_FOUND",
            PitchroomError::SessionInactive { .. } => "SESSION_INACTIVE",
            PitchroomError::InvalidSession { .. } => "INVALID_SESSION",
            PitchroomError::Join { .. } => "JOIN_ERROR",
            PitchroomError::ProviderKeyMissing => "PROVIDER_KEY_MISSING",
            PitchroomError::Transcription { .. } | PitchroomError::AudioTooShort { .. } => {
                "TRANSCRIPTION_ERROR"
            }
            _ => "INVALID_SESSION",
        }
    }
}

pub type Result<T> = std::result::Result<T, PitchroomError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_not_found_display() {
        let error = PitchroomError::SessionNotFound {
            session_id: "sess-1".to_string(),
        };
        assert_eq!(error.to_string(), "Session not found: sess-1");
        assert_eq!(error.code(), "SESSION_NOT_FOUND");
    }

    #[test]
    fn test_session_inactive_display() {
        let error = PitchroomError::SessionInactive {
            session_id: "sess-2".to_string(),
            status: "Ended".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Session sess-2 is not active (status: Ended)"
        );
        assert_eq!(error.code(), "SESSION_INACTIVE");
    }

    #[test]
    fn test_provider_key_missing_code() {
        assert_eq!(
            PitchroomError::ProviderKeyMissing.code(),
            "PROVIDER_KEY_MISSING"
        );
    }

    #[test]
    fn test_audio_too_short_maps_to_transcription_error() {
        let error = PitchroomError::AudioTooShort { duration_secs: 0.1 };
        assert_eq!(error.code(), "TRANSCRIPTION_ERROR");
    }

    #[test]
    fn test_storage_error_falls_back_to_invalid_session() {
        let error = PitchroomError::Storage {
            message: "write failed".to_string(),
        };
        assert_eq!(error.code(), "INVALID_SESSION");
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<PitchroomError>();
        assert_sync::<PitchroomError>();
    }
}

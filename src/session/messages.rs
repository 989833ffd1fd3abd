//! Wire messages for the bidirectional attach channel.
//!
//! Client messages arrive as JSON text frames; server messages are fanned
//! out through the session's socket handle. Delivery of live updates is
//! best-effort; clients order transcription messages by timestamp.

use crate::audio::AudioData;
use crate::model::SuggestedQuestion;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Outbound sender handle stored in the session state. Replaced wholesale
/// on reconnect; the previous forward task drains and exits.
pub type SocketSender = mpsc::UnboundedSender<ServerMessage>;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    JoinSession { session_id: String },
    #[serde(rename_all = "camelCase")]
    AudioChunk {
        session_id: String,
        audio_data: AudioData,
    },
    Ping,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    SessionStatus { status: String, message: String },
    #[serde(rename_all = "camelCase")]
    RecordingStatus {
        #[serde(rename = "audioSizeMB")]
        audio_size_mb: f64,
        audio_chunks: u64,
        estimated_duration_seconds: f64,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    Transcription {
        text: String,
        is_final: bool,
        timestamp: DateTime<Utc>,
        #[serde(skip_serializing_if = "Option::is_none")]
        speaker: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        speaker_id: Option<i32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        language_code: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Suggestion {
        questions: Vec<QuestionView>,
        context: String,
        topics: Vec<String>,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    SuggestedQuestionsUpdated { questions: Vec<QuestionView> },
    #[serde(rename_all = "camelCase")]
    SessionAutoStopped {
        reason: String,
        ended_at: DateTime<Utc>,
        total_duration: f64,
    },
    #[serde(rename_all = "camelCase")]
    Error { message: String, code: String },
    #[serde(rename_all = "camelCase")]
    Pong { timestamp: DateTime<Utc> },
}

/// The question shape sent to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: String,
    pub text: String,
    pub answered: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answered_at: Option<DateTime<Utc>>,
}

impl From<&SuggestedQuestion> for QuestionView {
    fn from(q: &SuggestedQuestion) -> Self {
        Self {
            id: q.id.clone(),
            text: q.text.clone(),
            answered: q.answered,
            created_at: q.created_at,
            answered_at: q.answered_at,
        }
    }
}

//! Persisted entities.
//!
//! These are the document-store records the orchestrator reads and writes.
//! Knowledge-base entities (deck, thesis, messages, documents) are opaque to
//! the core: only the fields the context assembler consumes are modeled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One meeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub deck_id: String,
    pub tenant_id: String,
    pub owner_id: String,
    pub title: String,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    pub transcript_count: usize,
    pub suggestion_count: usize,
    pub detected_languages: Vec<String>,
    pub summary: Option<SessionSummary>,
    pub summary_state: SummaryState,
    pub suggested_questions: Vec<SuggestedQuestion>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Active,
    Ended,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SummaryState {
    Pending,
    Generating,
    Completed,
    Failed,
}

impl Session {
    pub fn new(deck_id: &str, tenant_id: &str, owner_id: &str, title: &str) -> Self {
        Self {
            id: format!("session-{}", uuid::Uuid::new_v4()),
            deck_id: deck_id.to_string(),
            tenant_id: tenant_id.to_string(),
            owner_id: owner_id.to_string(),
            title: title.to_string(),
            status: SessionStatus::Active,
            started_at: Utc::now(),
            ended_at: None,
            duration_seconds: None,
            transcript_count: 0,
            suggestion_count: 0,
            detected_languages: Vec::new(),
            summary: None,
            summary_state: SummaryState::Pending,
            suggested_questions: Vec::new(),
        }
    }

    /// Questions shown to the client: non-deleted, newest first.
    pub fn visible_questions(&self) -> Vec<&SuggestedQuestion> {
        let mut visible: Vec<&SuggestedQuestion> = self
            .suggested_questions
            .iter()
            .filter(|q| !q.deleted)
            .collect();
        visible.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        visible
    }
}

/// A "next question" suggestion embedded in the session document.
///
/// `answered` and `deleted` are write-once true.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestedQuestion {
    pub id: String,
    pub text: String,
    pub answered: bool,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub answered_at: Option<DateTime<Utc>>,
}

impl SuggestedQuestion {
    pub fn new(text: &str) -> Self {
        Self {
            id: format!("q-{}", uuid::Uuid::new_v4()),
            text: text.to_string(),
            answered: false,
            deleted: false,
            created_at: Utc::now(),
            answered_at: None,
        }
    }
}

/// One utterance fragment, partial or final.
///
/// Final records are immutable once written; ordering within a session is
/// by `timestamp` ascending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub session_id: String,
    pub deck_id: String,
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub speaker: Option<String>,
    pub speaker_id: Option<i32>,
    pub is_final: bool,
    pub confidence: Option<f32>,
    pub language_code: Option<String>,
}

/// The rendered + structured summary persisted on the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Fixed-layout plain-text rendering
    pub content: String,
    /// The typed JSON the generator returned, absent for fallback summaries
    pub structured: Option<MeetingSummary>,
}

/// The fixed JSON shape requested from the summarizer. Unknown fields the
/// generator adds are preserved in `extras`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeetingSummary {
    #[serde(default)]
    pub executive_summary: String,
    #[serde(default)]
    pub key_topics: Vec<String>,
    #[serde(default)]
    pub important_points: Vec<String>,
    #[serde(default)]
    pub questions_asked: Vec<String>,
    #[serde(default)]
    pub concerns_or_red_flags: Vec<String>,
    #[serde(default)]
    pub next_steps: Vec<String>,
    #[serde(default)]
    pub overall_assessment: String,
    #[serde(flatten)]
    pub extras: BTreeMap<String, Value>,
}

/// Content that may arrive from the store either as structured JSON or as
/// plain text (deck analyses, thesis profiles).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MixedContent {
    Structured(Value),
    RawText(String),
}

/// The pitch deck a meeting is about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deck {
    pub id: String,
    pub tenant_id: String,
    pub title: String,
    pub status: String,
    pub analysis_version: Option<u32>,
    pub analysis: Option<MixedContent>,
}

/// The firm's structured investment preferences profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thesis {
    pub id: String,
    pub tenant_id: String,
    pub firm_name: Option<String>,
    pub profile: Option<MixedContent>,
}

/// A prior Q&A turn attached to the deck.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageTurn {
    pub id: String,
    pub deck_id: String,
    pub user_query: String,
    pub ai_response: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupportingDocument {
    pub id: String,
    pub deck_id: String,
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataRoomDocument {
    pub id: String,
    pub deck_id: String,
    pub title: String,
    pub category: Option<String>,
    pub ai_summary: Option<String>,
}

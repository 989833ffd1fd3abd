// Shared fixtures for the integration tests: an orchestrator wired to
// in-memory repositories and mock providers, with a seeded deck.
#![allow(dead_code)]

use pitchroom::config::{AudioConfig, ProviderConfig, SessionTuning};
use pitchroom::model::{Deck, MixedContent, Session, SummaryState};
use pitchroom::providers::{MockSpeechToText, MockTextGenerator, SpeechToText, TextGenerator};
use pitchroom::session::{Orchestrator, ServerMessage};
use pitchroom::store::{
    MemoryDeckRepository, MemoryMessageRepository, MemorySessionRepository,
    MemoryThesisRepository, MemoryTranscriptRepository, Repositories,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub const DECK_ID: &str = "deck-1";
pub const TENANT_ID: &str = "tenant-1";

/// Half a second of silent PCM at 16kHz mono 16-bit.
pub fn half_second_frame() -> Vec<u8> {
    vec![0u8; 16000]
}

pub async fn seeded_repos() -> Repositories {
    let decks = Arc::new(MemoryDeckRepository::default());
    decks
        .put_deck(Deck {
            id: DECK_ID.to_string(),
            tenant_id: TENANT_ID.to_string(),
            title: "Acme Robotics".to_string(),
            status: "analyzed".to_string(),
            analysis_version: Some(1),
            analysis: Some(MixedContent::Structured(
                serde_json::json!({"fit": "high", "stage": "seed"}),
            )),
        })
        .await;

    Repositories {
        sessions: Arc::new(MemorySessionRepository::default()),
        transcripts: Arc::new(MemoryTranscriptRepository::default()),
        decks,
        theses: Arc::new(MemoryThesisRepository::default()),
        messages: Arc::new(MemoryMessageRepository::default()),
    }
}

pub async fn orchestrator_with(
    stt: Arc<MockSpeechToText>,
    generator: Arc<MockTextGenerator>,
    tuning: SessionTuning,
) -> Arc<Orchestrator> {
    let repos = seeded_repos().await;
    Orchestrator::new(
        repos,
        stt as Arc<dyn SpeechToText>,
        generator as Arc<dyn TextGenerator>,
        AudioConfig::default(),
        tuning,
        ProviderConfig::default(),
    )
}

pub async fn default_orchestrator() -> Arc<Orchestrator> {
    orchestrator_with(
        Arc::new(MockSpeechToText::new()),
        Arc::new(MockTextGenerator::new()),
        SessionTuning::default(),
    )
    .await
}

/// A fresh attach channel; the receiver collects everything the session
/// emits to this connection.
pub fn attach_channel() -> (
    mpsc::UnboundedSender<ServerMessage>,
    mpsc::UnboundedReceiver<ServerMessage>,
) {
    mpsc::unbounded_channel()
}

/// Poll until the session's summary reaches a terminal state.
pub async fn wait_for_finalization(orchestrator: &Arc<Orchestrator>, session_id: &str) -> Session {
    for _ in 0..500 {
        let session = orchestrator
            .get_session(session_id)
            .await
            .expect("session exists");
        if matches!(
            session.summary_state,
            SummaryState::Completed | SummaryState::Failed
        ) && orchestrator.registry().get(session_id).await.is_none()
        {
            return session;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("finalization did not complete for {}", session_id);
}

/// Poll until the session carries at least `count` suggested questions.
pub async fn wait_for_questions(
    orchestrator: &Arc<Orchestrator>,
    session_id: &str,
    count: usize,
) -> Session {
    for _ in 0..500 {
        let session = orchestrator
            .get_session(session_id)
            .await
            .expect("session exists");
        if session.suggested_questions.len() >= count {
            return session;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "session {} never reached {} suggested questions",
        session_id, count
    );
}

/// Drain everything currently queued on the attach channel.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
    let mut messages = Vec::new();
    while let Ok(message) = rx.try_recv() {
        messages.push(message);
    }
    messages
}

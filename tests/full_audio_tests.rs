// Full-audio pass behavior through the orchestrator: chunked submission
// for oversize sessions and retry storms on a flaky provider.

mod common;

use common::*;
use pitchroom::audio::AudioData;
use pitchroom::model::{SessionStatus, SummaryState};
use pitchroom::providers::{MockSpeechToText, MockTextGenerator};
use pitchroom::session::{ServerMessage, StopReason};
use std::sync::Arc;

const PROVIDER_CAP: usize = 25 * 1024 * 1024;

#[tokio::test]
async fn test_oversize_session_splits_into_chunks() {
    let stt = Arc::new(MockSpeechToText::new().with_text("long meeting"));
    let orchestrator = orchestrator_with(
        Arc::clone(&stt),
        Arc::new(MockTextGenerator::new()),
        Default::default(),
    )
    .await;

    let (session, _) = orchestrator
        .start_session(DECK_ID, None, None)
        .await
        .unwrap();
    let (tx, _rx) = attach_channel();
    orchestrator.attach(&session.id, tx).await.unwrap();

    // 64 x 1 MiB frames = 64 MiB of PCM (~35 minutes).
    let frame = vec![0u8; 1024 * 1024];
    for _ in 0..64 {
        orchestrator
            .handle_audio(&session.id, AudioData::Bytes(frame.clone()))
            .await
            .unwrap();
    }

    orchestrator
        .stop(&session.id, StopReason::Explicit)
        .await
        .unwrap();
    let finalized = wait_for_finalization(&orchestrator, &session.id).await;
    assert_eq!(finalized.summary_state, SummaryState::Completed);

    // The streaming window (64 MiB) was over the cap and dropped, so
    // every provider call came from the chunked full pass.
    let sizes = stt.call_sizes();
    assert!(sizes.len() >= 4, "expected >= 4 chunks, got {}", sizes.len());
    for size in &sizes {
        assert!(*size <= PROVIDER_CAP, "chunk WAV of {} bytes over cap", size);
    }

    // One final transcript per chunk, ordered and non-decreasing (P7).
    let transcripts = orchestrator.get_transcript(&session.id).await.unwrap();
    let finals: Vec<_> = transcripts.iter().filter(|t| t.is_final).collect();
    assert_eq!(finals.len(), sizes.len());
    assert!(finals
        .windows(2)
        .all(|w| w[0].timestamp <= w[1].timestamp));
}

#[tokio::test(start_paused = true)]
async fn test_provider_5xx_storm_recovers_with_backoff() {
    // Every chunk: two 500s, then success.
    let stt = Arc::new(
        MockSpeechToText::new()
            .with_text("recovered transcript")
            .with_failures_before_success(2),
    );
    let orchestrator = orchestrator_with(
        Arc::clone(&stt),
        Arc::new(MockTextGenerator::new()),
        Default::default(),
    )
    .await;

    let (session, _) = orchestrator
        .start_session(DECK_ID, None, None)
        .await
        .unwrap();
    let (tx, mut rx) = attach_channel();
    orchestrator.attach(&session.id, tx).await.unwrap();

    // One half-second frame keeps the streaming window below its flush
    // minimum, so only the full pass talks to the provider.
    orchestrator
        .handle_audio(&session.id, AudioData::Bytes(half_second_frame()))
        .await
        .unwrap();

    orchestrator
        .stop(&session.id, StopReason::Explicit)
        .await
        .unwrap();
    let finalized = wait_for_finalization(&orchestrator, &session.id).await;

    assert_eq!(finalized.status, SessionStatus::Ended);
    assert_eq!(finalized.summary_state, SummaryState::Completed);
    assert!(finalized.summary.is_some());

    // Two failed attempts, backoff, then the success.
    assert_eq!(stt.call_count(), 3);

    // No user-visible failure.
    for message in drain(&mut rx) {
        assert!(!matches!(message, ServerMessage::Error { .. }));
    }
}

#[tokio::test]
async fn test_terminal_provider_failure_fails_summary() {
    let stt = Arc::new(MockSpeechToText::new().failing_with_status(401, "invalid api key"));
    let orchestrator = orchestrator_with(
        stt,
        Arc::new(MockTextGenerator::new()),
        Default::default(),
    )
    .await;

    let (session, _) = orchestrator
        .start_session(DECK_ID, None, None)
        .await
        .unwrap();
    let (tx, _rx) = attach_channel();
    orchestrator.attach(&session.id, tx).await.unwrap();
    orchestrator
        .handle_audio(&session.id, AudioData::Bytes(half_second_frame()))
        .await
        .unwrap();

    orchestrator
        .stop(&session.id, StopReason::Explicit)
        .await
        .unwrap();
    let finalized = wait_for_finalization(&orchestrator, &session.id).await;

    assert_eq!(finalized.summary_state, SummaryState::Failed);
    assert!(orchestrator.registry().get(&session.id).await.is_none());
}
